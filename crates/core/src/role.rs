//! Benutzerrollen und das Moderations-Praedikat
//!
//! Der Identitaetsdienst der Plattform liefert Rollen als freie Strings.
//! Hier werden sie in ein typsicheres Enum ueberfuehrt, und die Frage
//! "darf dieser Akteur moderieren?" wird an genau einer Stelle beantwortet
//! statt verstreut pro Operation.

use serde::{Deserialize, Serialize};

/// Rolle eines Benutzers, zum Beitrittszeitpunkt kopiert (nicht live)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Guest,
    Member,
    Moderator,
    Admin,
    Owner,
}

impl Role {
    /// Parst einen Rollen-String aus dem Identitaetsdienst
    ///
    /// Unbekannte Werte fallen auf `Guest` zurueck – der Dienst bleibt
    /// verfuegbar, auch wenn das Verzeichnis neue Rollen einfuehrt.
    pub fn aus_str(wert: &str) -> Self {
        match wert.to_ascii_lowercase().as_str() {
            "member" => Self::Member,
            "moderator" => Self::Moderator,
            "admin" => Self::Admin,
            "owner" => Self::Owner,
            _ => Self::Guest,
        }
    }

    /// Gibt `true` zurueck wenn die Rolle moderierende Rechte traegt
    ///
    /// Moderierende Rollen duerfen Sprecher verwalten und gesperrte
    /// Raeume betreten.
    pub fn ist_moderierend(&self) -> bool {
        matches!(self, Self::Moderator | Self::Admin | Self::Owner)
    }
}

impl Default for Role {
    fn default() -> Self {
        Self::Guest
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Guest => "guest",
            Self::Member => "member",
            Self::Moderator => "moderator",
            Self::Admin => "admin",
            Self::Owner => "owner",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rollen_parsing() {
        assert_eq!(Role::aus_str("admin"), Role::Admin);
        assert_eq!(Role::aus_str("OWNER"), Role::Owner);
        assert_eq!(Role::aus_str("member"), Role::Member);
        assert_eq!(Role::aus_str("irgendwas"), Role::Guest);
        assert_eq!(Role::aus_str(""), Role::Guest);
    }

    #[test]
    fn moderierende_rollen() {
        assert!(Role::Moderator.ist_moderierend());
        assert!(Role::Admin.ist_moderierend());
        assert!(Role::Owner.ist_moderierend());
        assert!(!Role::Member.ist_moderierend());
        assert!(!Role::Guest.ist_moderierend());
    }

    #[test]
    fn rolle_serde_lowercase() {
        let json = serde_json::to_string(&Role::Moderator).unwrap();
        assert_eq!(json, "\"moderator\"");
        let zurueck: Role = serde_json::from_str("\"owner\"").unwrap();
        assert_eq!(zurueck, Role::Owner);
    }
}
