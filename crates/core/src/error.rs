//! Fehlertypen fuer Parley
//!
//! Zentraler Fehler-Enum fuer Infrastruktur-Belange (Verzeichnis-Lookups,
//! Konfiguration). Die Voice-Koordination hat ihren eigenen, feiner
//! aufgeloesten Fehlertyp im voice-Crate.

use thiserror::Error;

/// Globaler Result-Alias fuer Parley
pub type Result<T> = std::result::Result<T, ParleyError>;

/// Infrastruktur-Fehler im Parley-System
#[derive(Debug, Error)]
pub enum ParleyError {
    /// Raum- oder Identitaetsverzeichnis nicht erreichbar
    #[error("Verzeichnisfehler: {0}")]
    Verzeichnis(String),

    /// Konfigurationsfehler beim Start
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    /// Interner Fehler
    #[error("Interner Fehler: {0}")]
    Intern(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl ParleyError {
    /// Erstellt einen Verzeichnisfehler aus einer beliebigen Nachricht
    pub fn verzeichnis(msg: impl Into<String>) -> Self {
        Self::Verzeichnis(msg.into())
    }

    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        let e = ParleyError::verzeichnis("Timeout beim Raum-Lookup");
        assert_eq!(e.to_string(), "Verzeichnisfehler: Timeout beim Raum-Lookup");
    }
}
