//! # Parley Voice – Raum-Koordination
//!
//! Koordiniert die Voice-Raeume der Plattform: wer ist in welchem Raum,
//! wer spricht in Broadcast-Raeumen, und wie finden WebRTC-Signaling-
//! Nachrichten ihren Weg zwischen den Teilnehmern. Der Medientransport
//! selbst laeuft peer-to-peer – dieses Crate bewegt keine Audiodaten.
//!
//! ## Architektur
//!
//! ```text
//! Transport (WebSocket)
//!        |
//!        v
//! VoiceCoordinator ---- Fassade, Kommando-Dispatch
//!   |-- RoomRegistry       autoritativer Raumzustand (lazy, fluechtig)
//!   |-- SessionManager     Verbindung/Benutzer/Raum-Bindung
//!   |-- speaker_queue      Sprecherverwaltung fuer Broadcast-Raeume
//!   |-- SignalingRelay     WebRTC-Umschlaege weiterleiten
//!   |-- EventBroadcaster   Send-Queues, raumweites Fan-out
//!   `-- reaper             Timeout-Bereinigung
//! ```
//!
//! Raum-Verzeichnis, Identitaetsdienst und Uhr sind injizierte Traits
//! (siehe [`directory`]); Tests arbeiten mit deterministischen Fakes.

pub mod broadcast;
pub mod coordinator;
pub mod directory;
pub mod error;
pub mod reaper;
pub mod relay;
pub mod room;
pub mod session;
pub mod speaker_queue;

pub use broadcast::EventBroadcaster;
pub use coordinator::{VoiceConfig, VoiceCoordinator};
pub use directory::{
    Clock, IdentityDirectory, RoomDirectory, RoomMetadata, SystemClock, UserProfile,
};
pub use error::{VoiceError, VoiceResult};
pub use relay::SignalingRelay;
pub use room::{RoomRegistry, VoiceParticipant, VoiceRoom};
pub use room::{MAX_SPRECHER_STANDARD, MAX_TEILNEHMER_STANDARD};
pub use session::{SessionManager, VoiceSession};
