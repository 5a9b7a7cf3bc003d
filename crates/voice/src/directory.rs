//! Externe Kollaborateure der Voice-Koordination
//!
//! Der Koordinationsdienst haelt selbst keine Stammdaten: Raum-Metadaten
//! kommen aus dem Raum-Verzeichnis der Plattform, Benutzerprofile aus dem
//! Identitaetsdienst. Beide werden als Traits injiziert, damit Tests mit
//! deterministischen Fakes arbeiten koennen – genau wie die Uhr.

use chrono::{DateTime, Utc};
use parley_core::{Result, Role, RoomId, UserId};

// ---------------------------------------------------------------------------
// Raum-Verzeichnis
// ---------------------------------------------------------------------------

/// Metadaten eines Raums aus dem externen Raum-Verzeichnis
#[derive(Debug, Clone)]
pub struct RoomMetadata {
    /// Anzeigename des Raums
    pub name: String,
    /// Optionale Beschreibung
    pub beschreibung: Option<String>,
    /// Ist der Raum fuer normale Benutzer gesperrt?
    pub gesperrt: bool,
    /// Broadcast-Raum (Host + begrenzte Sprecherliste)?
    pub broadcast: bool,
    /// Host-Benutzer (nur bei Broadcast-Raeumen gesetzt)
    pub host_id: Option<UserId>,
}

/// Zugriff auf das externe Raum-Verzeichnis
///
/// Wird genau einmal pro unbekannter Raum-ID befragt (fetch-then-insert).
/// Ein Fehler hier verhindert die Raumerstellung nicht – der Raum wird
/// dann mit generischen Standardwerten angelegt.
#[allow(async_fn_in_trait)]
pub trait RoomDirectory: Send + Sync {
    /// Laedt die Metadaten eines Raums; `None` wenn unbekannt
    async fn raum_metadaten(&self, raum_id: &RoomId) -> Result<Option<RoomMetadata>>;
}

// ---------------------------------------------------------------------------
// Identitaetsdienst
// ---------------------------------------------------------------------------

/// Profilfelder eines authentifizierten Benutzers
///
/// Die Authentifizierung selbst ist vor jedem Voice-Kommando bereits
/// erfolgt; hier werden nur Anzeigedaten und die Rolle nachgeschlagen.
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub user_id: UserId,
    pub anzeige_name: String,
    pub rolle: Role,
}

/// Zugriff auf den externen Identitaetsdienst
#[allow(async_fn_in_trait)]
pub trait IdentityDirectory: Send + Sync {
    /// Laedt das Profil eines Benutzers; `None` wenn unbekannt
    async fn benutzer_profil(&self, user_id: UserId) -> Result<Option<UserProfile>>;
}

// ---------------------------------------------------------------------------
// Uhr
// ---------------------------------------------------------------------------

/// Injizierbare Uhr
///
/// Produktiv `SystemClock`; Tests treiben den Reaper mit einer Fake-Uhr
/// und rufen den Sweep direkt auf.
pub trait Clock: Send + Sync {
    /// Aktuelle Zeit
    fn jetzt(&self) -> DateTime<Utc>;
}

/// Systemuhr (produktive Implementierung)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn jetzt(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<C: Clock> Clock for std::sync::Arc<C> {
    fn jetzt(&self) -> DateTime<Utc> {
        self.as_ref().jetzt()
    }
}
