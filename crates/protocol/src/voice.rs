//! Voice-Koordinationsprotokoll
//!
//! Eingehende Kommandos (`VoiceCommand`), ausgehende Events (`VoiceEvent`)
//! und der Signaling-Umschlag (`SignalingMessage`). Der Dienst leitet
//! Signaling-Payloads nur weiter und interpretiert sie nie – `data` bleibt
//! ein opakes JSON-Value.

use chrono::{DateTime, Utc};
use parley_core::{Role, RoomId, UserId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Audio-Profil (informativ, wird von diesem Dienst nicht durchgesetzt)
// ---------------------------------------------------------------------------

/// Audio-Profil eines Raums
///
/// Rein informativ fuer die Clients – Kodierung und Medientransport laufen
/// peer-to-peer bzw. ueber eine externe SFU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioProfile {
    /// Codec-Kennung (z.B. "opus")
    pub codec: String,
    /// Ziel-Bitrate in kbit/s
    pub bitrate_kbps: u16,
    /// Abtastrate in Hz
    pub sample_rate: u32,
    /// Kanalanzahl (1 = mono, 2 = stereo)
    pub channels: u8,
}

impl Default for AudioProfile {
    fn default() -> Self {
        Self {
            codec: "opus".into(),
            bitrate_kbps: 128,
            sample_rate: 48_000,
            channels: 2,
        }
    }
}

/// Verbindungsqualitaet eines Teilnehmers (vom Client gemeldet)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionQuality {
    Poor,
    Good,
    Excellent,
}

impl Default for ConnectionQuality {
    fn default() -> Self {
        Self::Good
    }
}

// ---------------------------------------------------------------------------
// Signaling
// ---------------------------------------------------------------------------

/// Art einer Signaling-Nachricht
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
    Join,
    Leave,
    Mute,
    Unmute,
    Speaking,
    NotSpeaking,
}

/// WebRTC-Signaling-Umschlag
///
/// Wird nie gespeichert, nur weitergeleitet. `sender_id` wird serverseitig
/// aus der Session gesetzt, nie vom Client uebernommen.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalingMessage {
    /// Art der Nachricht (offer/answer/ice-candidate/...)
    pub kind: SignalKind,
    /// Raum auf den sich die Nachricht bezieht
    pub room_id: RoomId,
    /// Absender (serverseitig gesetzt)
    #[serde(default)]
    pub sender_id: Option<UserId>,
    /// Optionaler Unicast-Empfaenger; None = Broadcast an den Raum
    #[serde(default)]
    pub target_user_id: Option<UserId>,
    /// Opaker Payload (SDP, ICE-Kandidat, ...) – wird nicht interpretiert
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    /// Zeitstempel des Absenders
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Eingehende Kommandos
// ---------------------------------------------------------------------------

/// Aktion der Sprecherverwaltung in Broadcast-Raeumen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeakerAction {
    Approve,
    Deny,
    Remove,
}

/// Alle Kommandos die ein Client an die Voice-Koordination senden kann
///
/// Der implizite `disconnect` kommt nicht als Kommando, sondern wird vom
/// Transport-Layer gemeldet wenn die Verbindung abreisst.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum VoiceCommand {
    /// Einem Voice-Raum beitreten
    #[serde(rename_all = "camelCase")]
    JoinRoom { room_id: RoomId, user_id: UserId },

    /// Den aktuellen Raum verlassen (idempotent)
    LeaveRoom,

    /// WebRTC-Signaling weiterleiten
    Signal(SignalingMessage),

    /// Eigenen Mute-Status setzen
    ToggleMute { muted: bool },

    /// Eigenen Sprech-Status melden
    Speaking {
        speaking: bool,
        #[serde(default)]
        volume: Option<u8>,
    },

    /// Mikrofon in einem Broadcast-Raum anfordern
    #[serde(rename_all = "camelCase")]
    RequestMic { room_id: RoomId },

    /// Sprecherliste verwalten (nur Host/Moderation)
    #[serde(rename_all = "camelCase")]
    ManageSpeaker {
        room_id: RoomId,
        target_user_id: UserId,
        action: SpeakerAction,
    },
}

// ---------------------------------------------------------------------------
// Ausgehende Events
// ---------------------------------------------------------------------------

/// Alle Events die der Dienst an Clients sendet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum VoiceEvent {
    /// Antwort auf erfolgreichen Beitritt (nur an den Beitretenden)
    RoomJoined {
        room: RoomSummary,
        participant: ParticipantSummary,
    },

    /// Ein Teilnehmer ist dem Raum beigetreten (an alle anderen)
    #[serde(rename_all = "camelCase")]
    UserJoined {
        room_id: RoomId,
        participant: ParticipantSummary,
    },

    /// Ein Teilnehmer hat den Raum verlassen (freiwillig oder via Timeout –
    /// fuer Beobachter nicht unterscheidbar)
    #[serde(rename_all = "camelCase")]
    UserLeft { room_id: RoomId, user_id: UserId },

    /// Weitergeleitetes WebRTC-Signaling
    Signal(SignalingMessage),

    /// Mute-Status eines Teilnehmers hat sich geaendert
    #[serde(rename_all = "camelCase")]
    UserMuteChanged {
        room_id: RoomId,
        user_id: UserId,
        muted: bool,
    },

    /// Sprech-Status eines Teilnehmers hat sich geaendert
    #[serde(rename_all = "camelCase")]
    UserSpeakingChanged {
        room_id: RoomId,
        user_id: UserId,
        speaking: bool,
        volume: u8,
    },

    /// Mikrofonanfrage eingegangen (nur an Host und Moderation)
    #[serde(rename_all = "camelCase")]
    MicRequested {
        room_id: RoomId,
        user_id: UserId,
        queue_position: usize,
    },

    /// Bestaetigung an den Anfragenden (traegt die Warteschlangen-Position)
    #[serde(rename_all = "camelCase")]
    MicRequestSent {
        room_id: RoomId,
        queue_position: usize,
    },

    /// Mikrofonanfrage genehmigt (an den Betroffenen)
    #[serde(rename_all = "camelCase")]
    MicApproved { room_id: RoomId },

    /// Mikrofonanfrage abgelehnt (an den Betroffenen)
    #[serde(rename_all = "camelCase")]
    MicDenied { room_id: RoomId },

    /// Teilnehmer wurde in die Sprecherliste aufgenommen (an den Raum)
    #[serde(rename_all = "camelCase")]
    SpeakerAdded { room_id: RoomId, user_id: UserId },

    /// Teilnehmer wurde aus der Sprecherliste entfernt (an den Raum)
    #[serde(rename_all = "camelCase")]
    SpeakerRemoved { room_id: RoomId, user_id: UserId },

    /// Die Session dieser Verbindung wurde durch einen neuen Login
    /// desselben Benutzers ersetzt
    #[serde(rename_all = "camelCase")]
    SessionReplaced { room_id: RoomId },

    /// Abgelehnte Operation (Validierung, Zustand, Berechtigung, Kapazitaet)
    Error { message: String },
}

// ---------------------------------------------------------------------------
// Bereinigte Lesemodelle (Query-Oberflaeche)
// ---------------------------------------------------------------------------

/// Oeffentliche Sicht auf einen Teilnehmer (ohne Verbindungs-Interna)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSummary {
    pub user_id: UserId,
    pub display_name: String,
    pub role: Role,
    pub muted: bool,
    pub deafened: bool,
    pub speaking: bool,
    /// Lautstaerke 0–100
    pub volume: u8,
    pub connection_quality: ConnectionQuality,
    pub joined_at: DateTime<Utc>,
}

/// Oeffentliche Sicht auf einen aktiven Voice-Raum
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub id: RoomId,
    pub name: String,
    pub description: Option<String>,
    pub max_participants: usize,
    pub locked: bool,
    pub broadcast: bool,
    pub host_id: Option<UserId>,
    /// Aktuelle Sprecherliste (nur in Broadcast-Raeumen gefuellt)
    pub speakers: Vec<UserId>,
    pub audio: AudioProfile,
    pub participants: Vec<ParticipantSummary>,
    pub participant_count: usize,
}

/// Verbindungsstatus eines Benutzers (Query-Oberflaeche)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatus {
    pub user_id: UserId,
    pub connected: bool,
    pub room_id: Option<RoomId>,
}

/// Aggregierte Dienststatistik
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStats {
    pub active_rooms: usize,
    pub rooms_created_total: u64,
    pub active_sessions: usize,
    pub relayed_messages: u64,
    pub uptime_seconds: u64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_tags_kebab_case() {
        let cmd = VoiceCommand::JoinRoom {
            room_id: RoomId::neu("lobby"),
            user_id: UserId(5),
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"type\":\"join-room\""), "{json}");
        assert!(json.contains("\"roomId\":\"lobby\""), "{json}");
        assert!(json.contains("\"userId\":5"), "{json}");
    }

    #[test]
    fn command_roundtrip() {
        let cmd = VoiceCommand::ManageSpeaker {
            room_id: RoomId::neu("r1"),
            target_user_id: UserId(9),
            action: SpeakerAction::Approve,
        };
        let json = serde_json::to_string(&cmd).unwrap();
        let zurueck: VoiceCommand = serde_json::from_str(&json).unwrap();
        match zurueck {
            VoiceCommand::ManageSpeaker {
                target_user_id,
                action,
                ..
            } => {
                assert_eq!(target_user_id, UserId(9));
                assert_eq!(action, SpeakerAction::Approve);
            }
            andere => panic!("Falsche Variante: {andere:?}"),
        }
    }

    #[test]
    fn signal_command_inline_felder() {
        // Signaling-Felder liegen flach neben dem Kommando-Tag
        let json = r#"{
            "type": "signal",
            "kind": "offer",
            "roomId": "lobby",
            "timestamp": "2024-01-01T00:00:00Z",
            "data": {"sdp": "v=0"}
        }"#;
        let cmd: VoiceCommand = serde_json::from_str(json).unwrap();
        match cmd {
            VoiceCommand::Signal(msg) => {
                assert_eq!(msg.kind, SignalKind::Offer);
                assert_eq!(msg.room_id, RoomId::neu("lobby"));
                assert!(msg.sender_id.is_none());
                assert!(msg.data.is_some());
            }
            andere => panic!("Falsche Variante: {andere:?}"),
        }
    }

    #[test]
    fn event_tags_kebab_case() {
        let event = VoiceEvent::MicRequestSent {
            room_id: RoomId::neu("b1"),
            queue_position: 1,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"mic-request-sent\""), "{json}");
        assert!(json.contains("\"queuePosition\":1"), "{json}");
    }

    #[test]
    fn audio_profil_defaults() {
        let profil = AudioProfile::default();
        assert_eq!(profil.codec, "opus");
        assert_eq!(profil.sample_rate, 48_000);
        assert_eq!(profil.channels, 2);
    }
}
