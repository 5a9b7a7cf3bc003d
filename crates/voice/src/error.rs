//! Fehlertypen der Voice-Koordination
//!
//! Jede abgelehnte Operation wird einem Client als `error`-Event gemeldet;
//! kein Fehler in diesem Crate ist fatal fuer den Prozess. Die Varianten
//! decken die Fehlerklassen Validierung, Zustandskonflikt, Berechtigung,
//! Kapazitaet und Nicht-gefunden ab.

use parley_core::{RoomId, UserId};
use thiserror::Error;

/// Fehlertyp der Voice-Koordination
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoiceError {
    // --- Validierung ---
    /// Benutzer ist dem Identitaetsdienst nicht bekannt
    #[error("Benutzer nicht gefunden: {0}")]
    BenutzerUnbekannt(UserId),

    // --- Zustandskonflikte ---
    /// Operation erfordert eine aktive Session in einem Raum
    #[error("Nicht in einem Voice-Raum")]
    NichtImRaum,

    /// Join auf einer Verbindung die bereits eine Session haelt
    #[error("Verbindung haelt bereits eine aktive Session")]
    BereitsVerbunden,

    /// Signaling- oder Verwaltungsnachricht fuer einen fremden Raum
    #[error("Nachricht gehoert nicht zur aktuellen Session (Raum {0})")]
    SessionRaumKonflikt(RoomId),

    /// Benutzer ist bereits Sprecher
    #[error("Bereits in der Sprecherliste")]
    BereitsSprecher,

    /// Benutzer wartet bereits in der Mikro-Warteschlange
    #[error("Anfrage steht bereits in der Warteschlange")]
    BereitsInWarteschlange,

    /// Operation ist nur in Broadcast-Raeumen sinnvoll
    #[error("Kein Broadcast-Raum")]
    KeinBroadcastRaum,

    /// Ziel-Benutzer steht nicht in der Warteschlange
    #[error("Benutzer {0} steht nicht in der Warteschlange")]
    NichtInWarteschlange(UserId),

    // --- Berechtigung ---
    /// Akteur ist weder Host noch traegt er eine moderierende Rolle
    #[error("Keine Berechtigung zur Sprecherverwaltung")]
    NichtBerechtigt,

    // --- Kapazitaet ---
    /// Raum hat die maximale Teilnehmerzahl erreicht
    #[error("Raum {0} ist voll")]
    RaumVoll(RoomId),

    /// Raum ist gesperrt und der Akteur traegt keine moderierende Rolle
    #[error("Raum {0} ist gesperrt")]
    RaumGesperrt(RoomId),

    /// Sprecherliste hat die Kapazitaetsgrenze erreicht
    #[error("Sprecherlimit erreicht ({0} Plaetze)")]
    SprecherlimitErreicht(usize),

    // --- Nicht gefunden (typisch: Race mit einem parallelen Leave) ---
    /// Ziel-Benutzer hat aktuell keine erreichbare Session im Raum
    #[error("Benutzer {0} ist nicht erreichbar")]
    ZielNichtErreichbar(UserId),

    /// Raum existiert nicht (mehr)
    #[error("Raum {0} nicht gefunden")]
    RaumNichtGefunden(RoomId),
}

impl VoiceError {
    /// Gibt `true` zurueck wenn der Fehler moderationsrelevant ist und
    /// entsprechend geloggt werden soll
    pub fn ist_berechtigungsfehler(&self) -> bool {
        matches!(self, Self::NichtBerechtigt)
    }
}

/// Result-Typ der Voice-Koordination
pub type VoiceResult<T> = Result<T, VoiceError>;
