//! Gemeinsame Identifikationstypen fuer Parley
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! verschiedenen ID-Arten zur Compilezeit auszuschliessen.
//!
//! - `RoomId`: extern vergebene, stabile Raum-Kennung (String)
//! - `UserId`: numerische Benutzer-ID aus dem Identitaetsdienst
//! - `ConnectionId`: pro Transport-Verbindung vergebene UUID

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Extern vergebene, stabile Raum-ID
///
/// Raeume werden nicht von diesem Dienst erzeugt – die ID kommt aus dem
/// Raum-Verzeichnis der Plattform und wird unveraendert uebernommen.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomId(pub String);

impl RoomId {
    /// Erstellt eine RoomId aus einem beliebigen String-Wert
    pub fn neu(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Gibt die ID als &str zurueck
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "room:{}", self.0)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Eindeutige Benutzer-ID
///
/// Numerisch, weil der Identitaetsdienst der Plattform numerische IDs
/// vergibt. Die Aufloesung Benutzername <-> ID ist nicht Aufgabe dieses
/// Dienstes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl UserId {
    /// Gibt die innere numerische ID zurueck
    pub fn inner(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "user:{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Eindeutige Verbindungs-ID (eine pro physischer Transport-Verbindung)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Erstellt eine neue zufaellige ConnectionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_eindeutig() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b, "Zwei neue ConnectionIds muessen verschieden sein");
    }

    #[test]
    fn room_id_display() {
        let id = RoomId::neu("lobby");
        assert_eq!(id.to_string(), "room:lobby");
        assert_eq!(id.as_str(), "lobby");
    }

    #[test]
    fn user_id_display() {
        let id = UserId(42);
        assert_eq!(id.to_string(), "user:42");
    }

    #[test]
    fn ids_sind_serde_kompatibel() {
        let uid = UserId(7);
        let json = serde_json::to_string(&uid).unwrap();
        let uid2: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(uid, uid2);

        let rid = RoomId::neu("raum-1");
        let json = serde_json::to_string(&rid).unwrap();
        let rid2: RoomId = serde_json::from_str(&json).unwrap();
        assert_eq!(rid, rid2);
    }
}
