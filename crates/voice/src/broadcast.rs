//! Event-Broadcaster – Sendet Voice-Events an verbundene Clients
//!
//! Der EventBroadcaster verwaltet die Send-Queues aller Verbindungen und
//! stellt Methoden bereit, um Events gezielt oder raumweit zu verteilen.
//!
//! ## Selektives Broadcasting
//! - An eine Verbindung: `an_verbindung_senden`
//! - An einen Raum: `an_raum_senden`
//! - An einen Raum ausser einer Verbindung: `an_raum_ausser_senden`
//!
//! Keyed nach ConnectionId, nicht UserId: waehrend einer Verdraengung
//! existieren kurzzeitig zwei Verbindungen desselben Benutzers, und die
//! alte muss noch ihr Abschieds-Event bekommen.

use dashmap::DashMap;
use parley_core::{ConnectionId, RoomId};
use parley_protocol::voice::VoiceEvent;
use std::sync::Arc;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Groesse der Send-Queue pro Verbindung
const SEND_QUEUE_GROESSE: usize = 64;

// ---------------------------------------------------------------------------
// ConnectionSender
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue einer verbundenen Client-Verbindung
#[derive(Clone, Debug)]
pub struct ConnectionSender {
    pub connection_id: ConnectionId,
    pub tx: mpsc::Sender<VoiceEvent>,
}

impl ConnectionSender {
    /// Sendet ein Event nicht-blockierend an die Verbindung
    ///
    /// Gibt `false` zurueck wenn die Queue voll oder geschlossen ist.
    pub fn senden(&self, event: VoiceEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(connection_id = %self.connection_id, "Send-Queue voll – Event verworfen");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(connection_id = %self.connection_id, "Send-Queue geschlossen (Client getrennt)");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// EventBroadcaster
// ---------------------------------------------------------------------------

/// Zentraler Event-Broadcaster fuer alle verbundenen Clients
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct EventBroadcaster {
    inner: Arc<EventBroadcasterInner>,
}

struct EventBroadcasterInner {
    /// Send-Queues, indiziert nach ConnectionId
    verbindungen: DashMap<ConnectionId, ConnectionSender>,
    /// Raum-Mitgliedschaft: raum_id -> Vec<ConnectionId>
    raum_mitglieder: DashMap<RoomId, Vec<ConnectionId>>,
}

impl EventBroadcaster {
    /// Erstellt einen neuen EventBroadcaster
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(EventBroadcasterInner {
                verbindungen: DashMap::new(),
                raum_mitglieder: DashMap::new(),
            }),
        }
    }

    /// Registriert eine neue Verbindung und gibt ihre Empfangs-Queue zurueck
    ///
    /// Der Transport liest aus dieser Queue und sendet ans WebSocket.
    pub fn verbindung_registrieren(&self, connection_id: ConnectionId) -> mpsc::Receiver<VoiceEvent> {
        let (tx, rx) = mpsc::channel(SEND_QUEUE_GROESSE);
        let sender = ConnectionSender { connection_id, tx };
        self.inner.verbindungen.insert(connection_id, sender);
        tracing::debug!(connection_id = %connection_id, "Verbindung im Broadcaster registriert");
        rx
    }

    /// Entfernt eine Verbindung aus dem Broadcaster
    pub fn verbindung_entfernen(&self, connection_id: ConnectionId) {
        self.inner.verbindungen.remove(&connection_id);
        self.raum_verlassen(connection_id);
        tracing::debug!(connection_id = %connection_id, "Verbindung aus Broadcaster entfernt");
    }

    /// Fuegt eine Verbindung einem Raum hinzu (fuer selektives Broadcasting)
    pub fn raum_beitreten(&self, connection_id: ConnectionId, raum_id: RoomId) {
        // Aus altem Raum entfernen
        self.inner.raum_mitglieder.iter_mut().for_each(|mut entry| {
            entry.value_mut().retain(|cid| *cid != connection_id);
        });

        self.inner
            .raum_mitglieder
            .entry(raum_id)
            .or_default()
            .push(connection_id);
    }

    /// Entfernt eine Verbindung aus ihrem Raum
    pub fn raum_verlassen(&self, connection_id: ConnectionId) {
        self.inner.raum_mitglieder.iter_mut().for_each(|mut entry| {
            entry.value_mut().retain(|cid| *cid != connection_id);
        });
        self.inner
            .raum_mitglieder
            .retain(|_, mitglieder| !mitglieder.is_empty());
    }

    /// Sendet ein Event an eine einzelne Verbindung
    ///
    /// Gibt `true` zurueck wenn die Verbindung gefunden und das Event
    /// eingereiht wurde.
    pub fn an_verbindung_senden(&self, connection_id: ConnectionId, event: VoiceEvent) -> bool {
        match self.inner.verbindungen.get(&connection_id) {
            Some(sender) => sender.senden(event),
            None => {
                tracing::debug!(connection_id = %connection_id, "Senden an unbekannte Verbindung");
                false
            }
        }
    }

    /// Sendet ein Event an alle Verbindungen in einem Raum
    ///
    /// Gibt die Anzahl der erfolgreichen Sendungen zurueck.
    pub fn an_raum_senden(&self, raum_id: &RoomId, event: VoiceEvent) -> usize {
        let mitglieder = match self.inner.raum_mitglieder.get(raum_id) {
            Some(ids) => ids.clone(),
            None => return 0,
        };

        let mut gesendet = 0;
        for connection_id in &mitglieder {
            if let Some(sender) = self.inner.verbindungen.get(connection_id) {
                if sender.senden(event.clone()) {
                    gesendet += 1;
                }
            }
        }
        gesendet
    }

    /// Sendet ein Event an alle Verbindungen in einem Raum ausser einer
    ///
    /// Nuetzlich um Join/Leave-Events zu verteilen ohne den Ausloeser zu
    /// informieren.
    pub fn an_raum_ausser_senden(
        &self,
        raum_id: &RoomId,
        ausgeschlossen: ConnectionId,
        event: VoiceEvent,
    ) -> usize {
        let mitglieder = match self.inner.raum_mitglieder.get(raum_id) {
            Some(ids) => ids.clone(),
            None => return 0,
        };

        let mut gesendet = 0;
        for connection_id in &mitglieder {
            if *connection_id == ausgeschlossen {
                continue;
            }
            if let Some(sender) = self.inner.verbindungen.get(connection_id) {
                if sender.senden(event.clone()) {
                    gesendet += 1;
                }
            }
        }
        gesendet
    }

    /// Gibt die Anzahl der registrierten Verbindungen zurueck
    pub fn verbindung_anzahl(&self) -> usize {
        self.inner.verbindungen.len()
    }

    /// Prueft ob eine Verbindung registriert ist
    pub fn ist_registriert(&self, connection_id: ConnectionId) -> bool {
        self.inner.verbindungen.contains_key(&connection_id)
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
