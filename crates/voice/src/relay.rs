//! Signaling-Relay – leitet WebRTC-Nachrichten zwischen Raumteilnehmern
//!
//! Das Relay validiert nur die Adressierung (Absender-Session, Raumbezug,
//! Erreichbarkeit des Ziels) und fasst den Payload nie an. Jede Nachricht
//! wird mit der Benutzer-ID der Absender-Session gestempelt; ein vom
//! Client mitgeschickter Absender wird ueberschrieben.

use parley_core::UserId;
use parley_protocol::voice::{SignalingMessage, VoiceEvent};

use crate::broadcast::EventBroadcaster;
use crate::error::{VoiceError, VoiceResult};
use crate::session::{SessionManager, VoiceSession};

/// Leitet Signaling-Nachrichten innerhalb eines Raums weiter
#[derive(Clone)]
pub struct SignalingRelay {
    sessions: SessionManager,
    broadcaster: EventBroadcaster,
}

impl SignalingRelay {
    /// Erstellt ein Relay ueber den geteilten Session- und Broadcast-Strukturen
    pub fn neu(sessions: SessionManager, broadcaster: EventBroadcaster) -> Self {
        Self {
            sessions,
            broadcaster,
        }
    }

    /// Leitet eine Signaling-Nachricht weiter
    ///
    /// Unicast wenn `target_user_id` gesetzt ist, sonst Broadcast an alle
    /// Raumteilnehmer ausser dem Absender. Gibt die Anzahl der Zustellungen
    /// zurueck.
    pub fn weiterleiten(
        &self,
        mut nachricht: SignalingMessage,
        absender: &VoiceSession,
    ) -> VoiceResult<usize> {
        if nachricht.room_id != absender.room_id {
            return Err(VoiceError::SessionRaumKonflikt(nachricht.room_id));
        }

        // Absender-Identitaet stammt immer aus der Session
        nachricht.sender_id = Some(absender.user_id);

        match nachricht.target_user_id {
            Some(ziel) => self.unicast(nachricht, ziel),
            None => Ok(self.broadcaster.an_raum_ausser_senden(
                &absender.room_id,
                absender.connection_id,
                VoiceEvent::Signal(nachricht),
            )),
        }
    }

    fn unicast(&self, nachricht: SignalingMessage, ziel: UserId) -> VoiceResult<usize> {
        let ziel_session = self
            .sessions
            .verbindung_von_user(ziel)
            .and_then(|conn| self.sessions.session(conn))
            .filter(|s| s.room_id == nachricht.room_id)
            .ok_or(VoiceError::ZielNichtErreichbar(ziel))?;

        if self
            .broadcaster
            .an_verbindung_senden(ziel_session.connection_id, VoiceEvent::Signal(nachricht))
        {
            Ok(1)
        } else {
            Err(VoiceError::ZielNichtErreichbar(ziel))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parley_core::{ConnectionId, RoomId};
    use parley_protocol::voice::SignalKind;

    fn test_nachricht(raum: &str, ziel: Option<UserId>) -> SignalingMessage {
        SignalingMessage {
            kind: SignalKind::Offer,
            room_id: RoomId::neu(raum),
            sender_id: None,
            target_user_id: ziel,
            data: Some(serde_json::json!({"sdp": "v=0"})),
            timestamp: Utc::now(),
        }
    }

    struct TestRelay {
        relay: SignalingRelay,
        sessions: SessionManager,
        broadcaster: EventBroadcaster,
    }

    fn aufbau() -> TestRelay {
        let sessions = SessionManager::neu();
        let broadcaster = EventBroadcaster::neu();
        TestRelay {
            relay: SignalingRelay::neu(sessions.clone(), broadcaster.clone()),
            sessions,
            broadcaster,
        }
    }

    fn teilnehmer_verbinden(
        t: &TestRelay,
        user: UserId,
        raum: &str,
    ) -> (VoiceSession, tokio::sync::mpsc::Receiver<VoiceEvent>) {
        let conn = ConnectionId::new();
        let rx = t.broadcaster.verbindung_registrieren(conn);
        let (session, _) = t.sessions.oeffnen(conn, user, RoomId::neu(raum), Utc::now());
        t.broadcaster.raum_beitreten(conn, RoomId::neu(raum));
        (session, rx)
    }

    #[tokio::test]
    async fn broadcast_erreicht_alle_ausser_absender() {
        let t = aufbau();
        let (absender, mut rx_absender) = teilnehmer_verbinden(&t, UserId(1), "lobby");
        let (_, mut rx2) = teilnehmer_verbinden(&t, UserId(2), "lobby");
        let (_, mut rx3) = teilnehmer_verbinden(&t, UserId(3), "lobby");

        let anzahl = t
            .relay
            .weiterleiten(test_nachricht("lobby", None), &absender)
            .unwrap();
        assert_eq!(anzahl, 2);

        assert!(rx_absender.try_recv().is_err(), "Absender empfaengt nichts");
        for rx in [&mut rx2, &mut rx3] {
            match rx.try_recv().unwrap() {
                VoiceEvent::Signal(msg) => {
                    assert_eq!(msg.sender_id, Some(UserId(1)), "Absender wird gestempelt")
                }
                andere => panic!("Falsches Event: {andere:?}"),
            }
        }
    }

    #[tokio::test]
    async fn unicast_erreicht_nur_das_ziel() {
        let t = aufbau();
        let (absender, _rx1) = teilnehmer_verbinden(&t, UserId(1), "lobby");
        let (_, mut rx2) = teilnehmer_verbinden(&t, UserId(2), "lobby");
        let (_, mut rx3) = teilnehmer_verbinden(&t, UserId(3), "lobby");

        let anzahl = t
            .relay
            .weiterleiten(test_nachricht("lobby", Some(UserId(2))), &absender)
            .unwrap();
        assert_eq!(anzahl, 1);

        assert!(rx2.try_recv().is_ok());
        assert!(rx3.try_recv().is_err());
    }

    #[tokio::test]
    async fn raumfremde_nachricht_wird_abgewiesen() {
        let t = aufbau();
        let (absender, _rx) = teilnehmer_verbinden(&t, UserId(1), "lobby");

        let fehler = t
            .relay
            .weiterleiten(test_nachricht("anderer", None), &absender)
            .unwrap_err();
        assert_eq!(fehler, VoiceError::SessionRaumKonflikt(RoomId::neu("anderer")));
    }

    #[tokio::test]
    async fn unicast_an_fremden_raum_ist_unerreichbar() {
        let t = aufbau();
        let (absender, _rx1) = teilnehmer_verbinden(&t, UserId(1), "lobby");
        let (_, _rx2) = teilnehmer_verbinden(&t, UserId(2), "anderer");

        let fehler = t
            .relay
            .weiterleiten(test_nachricht("lobby", Some(UserId(2))), &absender)
            .unwrap_err();
        assert_eq!(fehler, VoiceError::ZielNichtErreichbar(UserId(2)));
    }

    #[tokio::test]
    async fn client_kann_absender_nicht_faelschen() {
        let t = aufbau();
        let (absender, _rx1) = teilnehmer_verbinden(&t, UserId(1), "lobby");
        let (_, mut rx2) = teilnehmer_verbinden(&t, UserId(2), "lobby");

        let mut nachricht = test_nachricht("lobby", None);
        nachricht.sender_id = Some(UserId(99));
        t.relay.weiterleiten(nachricht, &absender).unwrap();

        match rx2.try_recv().unwrap() {
            VoiceEvent::Signal(msg) => assert_eq!(msg.sender_id, Some(UserId(1))),
            andere => panic!("Falsches Event: {andere:?}"),
        }
    }
}
