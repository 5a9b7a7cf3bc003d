//! Session-Verwaltung – Verbindung/Benutzer/Raum-Bindung
//!
//! Eine Session bindet genau eine Transportverbindung an genau einen
//! Benutzer in genau einem Raum. Pro Benutzer existiert hoechstens eine
//! Session: ein zweiter Join verdraengt die alte Verbindung
//! (letzter gewinnt).
//!
//! Beide Indizes liegen unter EINEM Mutex, damit sie nie auseinanderlaufen.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use parley_core::{ConnectionId, RoomId, UserId};
use std::collections::HashMap;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// VoiceSession
// ---------------------------------------------------------------------------

/// Advisory Telemetrie einer Session – rein fuer Reporting, nie fuer
/// Korrektheit
#[derive(Debug, Clone, Default)]
pub struct SessionTelemetrie {
    /// Kumulierte Sprechzeit, abgeleitet aus den Sprech-Statusmeldungen
    pub sprechzeit_ms: u64,
    /// Beginn der laufenden Sprechphase (None = spricht gerade nicht)
    pub sprech_beginn: Option<DateTime<Utc>>,
    /// Vom Client gemeldete Paketzahlen
    pub pakete_empfangen: u64,
    pub pakete_verloren: u64,
    /// Vom Client gemeldete mittlere Latenz
    pub mittlere_latenz_ms: u32,
}

/// Aktive Bindung Verbindung -> Benutzer -> Raum
#[derive(Debug, Clone)]
pub struct VoiceSession {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    pub room_id: RoomId,
    pub erstellt_am: DateTime<Utc>,
    /// Wird bei jedem Kommando der Verbindung aktualisiert; Grundlage
    /// fuer die Timeout-Bereinigung
    pub letzte_aktivitaet: DateTime<Utc>,
    pub telemetrie: SessionTelemetrie,
}

/// Von einem neuen Join verdraengte Alt-Session
#[derive(Debug, Clone)]
pub struct VerdraengteSession {
    pub connection_id: ConnectionId,
    pub room_id: RoomId,
}

// ---------------------------------------------------------------------------
// SessionManager
// ---------------------------------------------------------------------------

/// Beide Richtungen des Session-Index
///
/// Invariante: `by_user[s.user_id] == s.connection_id` fuer jede Session
/// `s` in `by_connection`, und umgekehrt.
#[derive(Default)]
struct SessionIndex {
    by_connection: HashMap<ConnectionId, VoiceSession>,
    by_user: HashMap<UserId, ConnectionId>,
}

/// Verwaltet alle aktiven Voice-Sessions
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Mutex<SessionIndex>>,
}

impl SessionManager {
    /// Erstellt einen leeren SessionManager
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionIndex::default())),
        }
    }

    /// Oeffnet eine Session fuer die Verbindung
    ///
    /// Existiert bereits eine Session des Benutzers (andere Verbindung),
    /// wird sie atomar verdraengt und zurueckgegeben – der Aufrufer raeumt
    /// Raumzustand und Benachrichtigung der Alt-Verbindung nach.
    pub fn oeffnen(
        &self,
        connection_id: ConnectionId,
        user_id: UserId,
        room_id: RoomId,
        jetzt: DateTime<Utc>,
    ) -> (VoiceSession, Option<VerdraengteSession>) {
        let mut index = self.inner.lock();

        let alte_verbindung = index.by_user.get(&user_id).copied();
        let verdraengt = alte_verbindung.and_then(|alte_conn| {
            index.by_connection.remove(&alte_conn).map(|alt| VerdraengteSession {
                connection_id: alt.connection_id,
                room_id: alt.room_id,
            })
        });

        let session = VoiceSession {
            connection_id,
            user_id,
            room_id,
            erstellt_am: jetzt,
            letzte_aktivitaet: jetzt,
            telemetrie: SessionTelemetrie::default(),
        };
        index.by_connection.insert(connection_id, session.clone());
        index.by_user.insert(user_id, connection_id);

        (session, verdraengt)
    }

    /// Schliesst die Session der Verbindung
    ///
    /// Idempotent: `None` wenn keine Session existiert. Der Benutzer-Index
    /// wird nur geraeumt wenn er noch auf DIESE Verbindung zeigt (die
    /// Verdraengung durch einen neuen Join darf nicht rueckgaengig werden).
    pub fn schliessen(&self, connection_id: ConnectionId) -> Option<VoiceSession> {
        let mut index = self.inner.lock();
        let session = index.by_connection.remove(&connection_id)?;
        if index.by_user.get(&session.user_id) == Some(&connection_id) {
            index.by_user.remove(&session.user_id);
        }
        Some(session)
    }

    /// Aktualisiert den Aktivitaetszeitstempel der Verbindung
    ///
    /// Gibt `false` zurueck wenn keine Session existiert.
    pub fn aktivitaet_aktualisieren(&self, connection_id: ConnectionId, jetzt: DateTime<Utc>) -> bool {
        let mut index = self.inner.lock();
        match index.by_connection.get_mut(&connection_id) {
            Some(session) => {
                session.letzte_aktivitaet = jetzt;
                true
            }
            None => false,
        }
    }

    /// Rechnet gemeldete Client-Telemetrie auf die Session an
    pub fn telemetrie_anrechnen<F>(&self, connection_id: ConnectionId, f: F) -> bool
    where
        F: FnOnce(&mut SessionTelemetrie),
    {
        let mut index = self.inner.lock();
        match index.by_connection.get_mut(&connection_id) {
            Some(session) => {
                f(&mut session.telemetrie);
                true
            }
            None => false,
        }
    }

    /// Kopie der Session einer Verbindung
    pub fn session(&self, connection_id: ConnectionId) -> Option<VoiceSession> {
        self.inner.lock().by_connection.get(&connection_id).cloned()
    }

    /// Aktive Verbindung eines Benutzers
    pub fn verbindung_von_user(&self, user_id: UserId) -> Option<ConnectionId> {
        self.inner.lock().by_user.get(&user_id).copied()
    }

    /// Raum, in dem der Benutzer gerade verbunden ist
    pub fn raum_von_user(&self, user_id: UserId) -> Option<RoomId> {
        let index = self.inner.lock();
        let conn = index.by_user.get(&user_id)?;
        index.by_connection.get(conn).map(|s| s.room_id.clone())
    }

    /// Verbindungen, deren letzte Aktivitaet aelter als `timeout` ist
    ///
    /// Snapshot-Semantik: der Aufrufer raeumt jede Verbindung einzeln ueber
    /// den normalen Leave-Pfad; dazwischen eintreffende Aktivitaet macht
    /// den Kandidaten harmlos (schliessen ist idempotent).
    pub fn abgelaufene(&self, jetzt: DateTime<Utc>, timeout: Duration) -> Vec<ConnectionId> {
        let grenze = jetzt - timeout;
        self.inner
            .lock()
            .by_connection
            .values()
            .filter(|s| s.letzte_aktivitaet < grenze)
            .map(|s| s.connection_id)
            .collect()
    }

    /// Anzahl aktiver Sessions
    pub fn anzahl(&self) -> usize {
        self.inner.lock().by_connection.len()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oeffnen_und_schliessen() {
        let manager = SessionManager::neu();
        let conn = ConnectionId::new();
        let jetzt = Utc::now();

        let (session, verdraengt) =
            manager.oeffnen(conn, UserId(1), RoomId::neu("lobby"), jetzt);
        assert!(verdraengt.is_none());
        assert_eq!(session.user_id, UserId(1));
        assert_eq!(manager.anzahl(), 1);
        assert_eq!(manager.verbindung_von_user(UserId(1)), Some(conn));

        let geschlossen = manager.schliessen(conn).unwrap();
        assert_eq!(geschlossen.room_id, RoomId::neu("lobby"));
        assert_eq!(manager.anzahl(), 0);
        assert!(manager.verbindung_von_user(UserId(1)).is_none());

        // Idempotent
        assert!(manager.schliessen(conn).is_none());
    }

    #[test]
    fn zweiter_join_verdraengt_alte_session() {
        let manager = SessionManager::neu();
        let alt = ConnectionId::new();
        let neu = ConnectionId::new();
        let jetzt = Utc::now();

        manager.oeffnen(alt, UserId(1), RoomId::neu("a"), jetzt);
        let (_, verdraengt) = manager.oeffnen(neu, UserId(1), RoomId::neu("b"), jetzt);

        let verdraengt = verdraengt.expect("alte Session muss verdraengt werden");
        assert_eq!(verdraengt.connection_id, alt);
        assert_eq!(verdraengt.room_id, RoomId::neu("a"));

        // Nur die neue Session existiert noch
        assert_eq!(manager.anzahl(), 1);
        assert_eq!(manager.verbindung_von_user(UserId(1)), Some(neu));
        assert!(manager.session(alt).is_none());
    }

    #[test]
    fn schliessen_alter_verbindung_nach_verdraengung() {
        let manager = SessionManager::neu();
        let alt = ConnectionId::new();
        let neu = ConnectionId::new();
        let jetzt = Utc::now();

        manager.oeffnen(alt, UserId(1), RoomId::neu("a"), jetzt);
        manager.oeffnen(neu, UserId(1), RoomId::neu("a"), jetzt);

        // Die Alt-Verbindung trennt sich erst jetzt; der Benutzer-Index
        // darf dadurch nicht geraeumt werden
        assert!(manager.schliessen(alt).is_none());
        assert_eq!(manager.verbindung_von_user(UserId(1)), Some(neu));
    }

    #[test]
    fn abgelaufene_sessions_finden() {
        let manager = SessionManager::neu();
        let frisch = ConnectionId::new();
        let alt = ConnectionId::new();
        let jetzt = Utc::now();

        manager.oeffnen(alt, UserId(1), RoomId::neu("a"), jetzt - Duration::seconds(120));
        manager.oeffnen(frisch, UserId(2), RoomId::neu("a"), jetzt);

        let abgelaufen = manager.abgelaufene(jetzt, Duration::seconds(30));
        assert_eq!(abgelaufen, vec![alt]);

        // Aktivitaet rettet den Kandidaten
        assert!(manager.aktivitaet_aktualisieren(alt, jetzt));
        assert!(manager.abgelaufene(jetzt, Duration::seconds(30)).is_empty());
    }

    #[test]
    fn telemetrie_anrechnen() {
        let manager = SessionManager::neu();
        let conn = ConnectionId::new();
        manager.oeffnen(conn, UserId(1), RoomId::neu("a"), Utc::now());

        assert!(manager.telemetrie_anrechnen(conn, |t| {
            t.sprechzeit_ms += 1500;
            t.pakete_empfangen += 300;
        }));
        let session = manager.session(conn).unwrap();
        assert_eq!(session.telemetrie.sprechzeit_ms, 1500);

        assert!(!manager.telemetrie_anrechnen(ConnectionId::new(), |_| {}));
    }
}
