//! parley-protocol – Netzwerkprotokoll der Voice-Koordination
//!
//! Definiert alle Nachrichtentypen die zwischen Clients und dem
//! Koordinationsdienst ausgetauscht werden: eingehende Kommandos,
//! ausgehende Events, WebRTC-Signaling-Umschlaege und die bereinigten
//! Lesemodelle der Query-Oberflaeche.
//!
//! ## Design
//! - Tagged Enums fuer typsichere Nachrichtentypen
//! - Feldnamen auf dem Draht in camelCase, Typ-Tags in kebab-case
//!   (kompatibel zum Browser-Client der Plattform)
//! - JSON-Serialisierung via serde (Signaling ist nicht zeitkritisch –
//!   Audio-Medien laufen nie ueber diesen Dienst)

pub mod voice;

// Bequeme Re-Exporte
pub use voice::{
    ParticipantSummary, RoomSummary, ServiceStats, SignalKind, SignalingMessage, SpeakerAction,
    VoiceCommand, VoiceEvent,
};
