//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist. Statische Raeume koennen ueber `[[raeume]]`-Bloecke
//! vorab definiert werden; alle anderen Raum-IDs entstehen lazy mit
//! Standardwerten.

use parley_voice::VoiceConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Voice-Koordinations-Einstellungen
    pub voice: VoiceEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Vorab definierte Raeume
    pub raeume: Vec<RaumEintrag>,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers
    pub name: String,
    /// Benutzer-IDs mit Moderationsrechten (bis die Plattform-Identitaet
    /// angebunden ist)
    pub moderatoren: Vec<i64>,
    /// Rolle aller uebrigen Benutzer: "guest", "member", "moderator",
    /// "admin", "owner"
    pub standard_rolle: String,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Parley Server".into(),
            moderatoren: vec![],
            standard_rolle: "member".into(),
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer HTTP und WebSocket
    pub bind_adresse: String,
    /// Port fuer HTTP und WebSocket
    pub http_port: u16,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            http_port: 8090,
        }
    }
}

/// Voice-Koordinations-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceEinstellungen {
    /// Maximale Teilnehmer pro Raum
    pub max_teilnehmer: usize,
    /// Maximale Sprecher in Broadcast-Raeumen
    pub max_sprecher: usize,
    /// Inaktivitaets-Timeout in Sekunden
    pub session_timeout_sekunden: u64,
    /// Intervall des Bereinigungs-Sweeps in Sekunden
    pub sweep_intervall_sekunden: u64,
}

impl Default for VoiceEinstellungen {
    fn default() -> Self {
        Self {
            max_teilnehmer: 50,
            max_sprecher: 10,
            session_timeout_sekunden: 30,
            sweep_intervall_sekunden: 60,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Vorab definierter Raum (`[[raeume]]`-Block)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RaumEintrag {
    /// Raum-ID unter der Clients beitreten
    pub id: String,
    /// Anzeigename
    pub name: String,
    /// Optionale Beschreibung
    pub beschreibung: Option<String>,
    /// Nur Moderation darf beitreten
    pub gesperrt: bool,
    /// Broadcast-Raum mit Sprecherverwaltung
    pub broadcast: bool,
    /// Host-Benutzer (nur bei Broadcast-Raeumen sinnvoll)
    pub host_id: Option<i64>,
}

impl Default for RaumEintrag {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            beschreibung: None,
            gesperrt: false,
            broadcast: false,
            host_id: None,
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Gibt die vollstaendige HTTP-Bind-Adresse zurueck
    pub fn http_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.http_port)
    }

    /// Uebersetzt die Voice-Einstellungen in die Koordinator-Konfiguration
    pub fn voice_config(&self) -> VoiceConfig {
        VoiceConfig {
            max_teilnehmer: self.voice.max_teilnehmer,
            max_sprecher: self.voice.max_sprecher,
            session_timeout: Duration::from_secs(self.voice.session_timeout_sekunden),
            sweep_intervall: Duration::from_secs(self.voice.sweep_intervall_sekunden),
        }
    }
}
