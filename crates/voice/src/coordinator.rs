//! VoiceCoordinator – Fassade der gesamten Voice-Koordination
//!
//! Buendelt Registry, Sessions, Sprecherverwaltung, Relay und Broadcaster
//! hinter einer Kommando-Schnittstelle. Der Transport uebersetzt nur noch
//! WebSocket-Frames in `VoiceCommand`s und pumpt `VoiceEvent`s zurueck;
//! saemtliche Regeln leben hier.
//!
//! Jedes eingehende Kommando aktualisiert den Aktivitaetszeitstempel der
//! Session. Abgelehnte Operationen werden dem Absender als `error`-Event
//! gemeldet und sind nie fatal.

use chrono::{DateTime, Utc};
use parley_core::{ConnectionId, Role, RoomId, UserId};
use parley_protocol::voice::{
    ParticipantSummary, RoomSummary, ServiceStats, SignalingMessage, SpeakerAction, UserStatus,
    VoiceCommand, VoiceEvent,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::broadcast::EventBroadcaster;
use crate::directory::{Clock, IdentityDirectory, RoomDirectory, RoomMetadata, SystemClock};
use crate::error::{VoiceError, VoiceResult};
use crate::relay::SignalingRelay;
use crate::room::{
    RoomRegistry, VoiceParticipant, VoiceRoom, MAX_SPRECHER_STANDARD, MAX_TEILNEHMER_STANDARD,
};
use crate::session::SessionManager;
use crate::speaker_queue;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Laufzeit-Konfiguration der Voice-Koordination
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Maximale Teilnehmer pro Raum
    pub max_teilnehmer: usize,
    /// Maximale Sprecher in Broadcast-Raeumen
    pub max_sprecher: usize,
    /// Inaktivitaets-Timeout bevor eine Session bereinigt wird
    pub session_timeout: Duration,
    /// Intervall des Bereinigungs-Sweeps
    pub sweep_intervall: Duration,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            max_teilnehmer: MAX_TEILNEHMER_STANDARD,
            max_sprecher: MAX_SPRECHER_STANDARD,
            session_timeout: Duration::from_secs(30),
            sweep_intervall: Duration::from_secs(60),
        }
    }
}

// ---------------------------------------------------------------------------
// VoiceCoordinator
// ---------------------------------------------------------------------------

/// Fassade der Voice-Koordination
///
/// Raum-Verzeichnis, Identitaetsdienst und Uhr werden injiziert; Tests
/// arbeiten mit deterministischen Fakes.
pub struct VoiceCoordinator<D, I, C = SystemClock>
where
    D: RoomDirectory,
    I: IdentityDirectory,
    C: Clock,
{
    konfig: VoiceConfig,
    registry: RoomRegistry,
    sessions: SessionManager,
    broadcaster: EventBroadcaster,
    relay: SignalingRelay,
    verzeichnis: Arc<D>,
    identitaet: Arc<I>,
    uhr: C,
    weitergeleitet: AtomicU64,
    gestartet_am: DateTime<Utc>,
}

impl<D, I, C> VoiceCoordinator<D, I, C>
where
    D: RoomDirectory,
    I: IdentityDirectory,
    C: Clock,
{
    /// Erstellt den Koordinator mit injizierten Kollaborateuren
    pub fn neu(konfig: VoiceConfig, verzeichnis: Arc<D>, identitaet: Arc<I>, uhr: C) -> Arc<Self> {
        let sessions = SessionManager::neu();
        let broadcaster = EventBroadcaster::neu();
        let gestartet_am = uhr.jetzt();
        Arc::new(Self {
            konfig,
            registry: RoomRegistry::neu(),
            relay: SignalingRelay::neu(sessions.clone(), broadcaster.clone()),
            sessions,
            broadcaster,
            verzeichnis,
            identitaet,
            uhr,
            weitergeleitet: AtomicU64::new(0),
            gestartet_am,
        })
    }

    /// Aktuelle Konfiguration
    pub fn konfig(&self) -> &VoiceConfig {
        &self.konfig
    }

    // -----------------------------------------------------------------------
    // Verbindungs-Lebenszyklus
    // -----------------------------------------------------------------------

    /// Registriert eine neue Transportverbindung
    ///
    /// Der Transport liest Events aus der zurueckgegebenen Queue und sendet
    /// sie an den Client.
    pub fn verbindung_registrieren(&self, connection_id: ConnectionId) -> mpsc::Receiver<VoiceEvent> {
        self.broadcaster.verbindung_registrieren(connection_id)
    }

    /// Meldet den Abriss einer Transportverbindung
    ///
    /// Beendet die Session (falls vorhanden) wie ein explizites Verlassen
    /// und raeumt die Send-Queue.
    pub fn verbindung_getrennt(&self, connection_id: ConnectionId) {
        self.sitzung_beenden(connection_id, "Verbindung getrennt");
        self.broadcaster.verbindung_entfernen(connection_id);
    }

    // -----------------------------------------------------------------------
    // Kommando-Dispatch
    // -----------------------------------------------------------------------

    /// Verarbeitet ein Kommando einer Verbindung
    ///
    /// Fehler gehen als `error`-Event an den Absender zurueck und werden
    /// nie nach oben propagiert.
    pub async fn verarbeiten(&self, connection_id: ConnectionId, kommando: VoiceCommand) {
        // Jedes Kommando zaehlt als Aktivitaet
        self.sessions
            .aktivitaet_aktualisieren(connection_id, self.uhr.jetzt());

        let ergebnis = match kommando {
            VoiceCommand::JoinRoom { room_id, user_id } => {
                self.raum_beitreten(connection_id, room_id, user_id).await
            }
            VoiceCommand::LeaveRoom => {
                // Idempotent: Verlassen ohne Session ist ein No-op
                self.sitzung_beenden(connection_id, "Raum verlassen");
                Ok(())
            }
            VoiceCommand::Signal(nachricht) => self.signal_weiterleiten(connection_id, nachricht),
            VoiceCommand::ToggleMute { muted } => self.stumm_setzen(connection_id, muted),
            VoiceCommand::Speaking { speaking, volume } => {
                self.sprechen_melden(connection_id, speaking, volume)
            }
            VoiceCommand::RequestMic { room_id } => self.mikro_anfordern(connection_id, room_id),
            VoiceCommand::ManageSpeaker {
                room_id,
                target_user_id,
                action,
            } => self.sprecher_verwalten(connection_id, room_id, target_user_id, action),
        };

        if let Err(fehler) = ergebnis {
            if fehler.ist_berechtigungsfehler() {
                tracing::warn!(connection_id = %connection_id, fehler = %fehler, "Kommando abgelehnt");
            } else {
                tracing::debug!(connection_id = %connection_id, fehler = %fehler, "Kommando abgelehnt");
            }
            self.broadcaster.an_verbindung_senden(
                connection_id,
                VoiceEvent::Error {
                    message: fehler.to_string(),
                },
            );
        }
    }

    // -----------------------------------------------------------------------
    // Beitritt und Verlassen
    // -----------------------------------------------------------------------

    async fn raum_beitreten(
        &self,
        connection_id: ConnectionId,
        raum_id: RoomId,
        user_id: UserId,
    ) -> VoiceResult<()> {
        // Ein Raumwechsel erfordert ein explizites leave-room vorweg
        if self.sessions.session(connection_id).is_some() {
            return Err(VoiceError::BereitsVerbunden);
        }

        let profil = match self.identitaet.benutzer_profil(user_id).await {
            Ok(Some(profil)) => profil,
            Ok(None) => return Err(VoiceError::BenutzerUnbekannt(user_id)),
            Err(fehler) => {
                tracing::warn!(user_id = %user_id, fehler = %fehler, "Identitaetsdienst nicht erreichbar");
                return Err(VoiceError::BenutzerUnbekannt(user_id));
            }
        };

        // Metadaten nur fuer unbekannte Raeume holen (fetch-then-insert);
        // ein Verzeichnisfehler verhindert die Erstellung nicht
        let metadaten = if self.registry.enthaelt(&raum_id) {
            None
        } else {
            self.raum_metadaten_holen(&raum_id).await
        };
        let jetzt = self.uhr.jetzt();
        self.registry
            .holen_oder_erstellen(&raum_id, metadaten, self.konfig.max_teilnehmer, jetzt);

        // Zulassung und Eintrag laufen unter demselben Entry-Lock:
        // zwischen Kapazitaetspruefung und Einfuegen darf kein zweiter
        // Beitritt dazwischenkommen
        let teilnehmer = VoiceParticipant::neu(&profil, jetzt);
        let beitritt = self.registry.aendern(&raum_id, |raum| {
            Self::zulassung_und_eintrag(raum, profil.rolle, &teilnehmer, jetzt)
        });
        let (raum_sicht, teilnehmer_sicht) = match beitritt {
            Some(Ok(ergebnis)) => ergebnis,
            Some(Err(fehler)) => {
                // Ein abgewiesener Beitritt darf keinen frisch angelegten
                // leeren Raum zuruecklassen
                self.registry.entfernen_wenn_leer(&raum_id);
                return Err(fehler);
            }
            None => {
                // Race mit einer parallelen Raumentfernung: Metadaten
                // frisch aus dem Verzeichnis holen, einmal neu anlegen
                // und erneut eintragen
                let metadaten = self.raum_metadaten_holen(&raum_id).await;
                self.registry
                    .holen_oder_erstellen(&raum_id, metadaten, self.konfig.max_teilnehmer, jetzt);
                self.registry
                    .aendern(&raum_id, |raum| {
                        Self::zulassung_und_eintrag(raum, profil.rolle, &teilnehmer, jetzt)
                    })
                    .ok_or_else(|| VoiceError::RaumNichtGefunden(raum_id.clone()))??
            }
        };

        // Session erst nach erfolgreichem Eintrag oeffnen: ein abgelehnter
        // Beitritt laesst eine bestehende Session des Benutzers unberuehrt.
        // Ein bestehender Login desselben Benutzers wird verdraengt
        // (letzter gewinnt).
        let (_, verdraengt) = self
            .sessions
            .oeffnen(connection_id, user_id, raum_id.clone(), jetzt);
        if let Some(alt) = verdraengt {
            tracing::info!(
                user_id = %user_id,
                alte_verbindung = %alt.connection_id,
                "Bestehende Session durch neuen Login verdraengt"
            );
            self.broadcaster.an_verbindung_senden(
                alt.connection_id,
                VoiceEvent::SessionReplaced {
                    room_id: alt.room_id.clone(),
                },
            );
            self.broadcaster.raum_verlassen(alt.connection_id);
            // Beim Rejoin in denselben Raum wurde der Teilnehmer-Eintrag
            // bereits ersetzt; austragen wuerde ihn faelschlich entfernen
            // und einen leeren Raum samt Metadaten abreissen
            if alt.room_id != raum_id {
                self.teilnehmer_austragen(&alt.room_id, user_id);
            }
        }

        self.broadcaster.raum_beitreten(connection_id, raum_id.clone());
        self.broadcaster.an_raum_ausser_senden(
            &raum_id,
            connection_id,
            VoiceEvent::UserJoined {
                room_id: raum_id.clone(),
                participant: teilnehmer_sicht.clone(),
            },
        );
        self.broadcaster.an_verbindung_senden(
            connection_id,
            VoiceEvent::RoomJoined {
                room: raum_sicht,
                participant: teilnehmer_sicht,
            },
        );

        tracing::info!(user_id = %user_id, raum_id = %raum_id, "Benutzer dem Voice-Raum beigetreten");
        Ok(())
    }

    /// Zulassungspruefung und Teilnehmer-Eintrag in einem Schritt
    ///
    /// Laeuft vollstaendig unter dem Entry-Lock des Raums; moderierende
    /// Rollen umgehen die Sperre, niemand umgeht die Kapazitaet. Ein
    /// bereits eingetragener Benutzer (Rejoin) belegt keinen neuen Platz.
    fn zulassung_und_eintrag(
        raum: &mut VoiceRoom,
        rolle: Role,
        teilnehmer: &VoiceParticipant,
        jetzt: DateTime<Utc>,
    ) -> VoiceResult<(RoomSummary, ParticipantSummary)> {
        if raum.gesperrt && !rolle.ist_moderierend() {
            return Err(VoiceError::RaumGesperrt(raum.id.clone()));
        }
        if raum.ist_voll() && raum.teilnehmer_finden(teilnehmer.user_id).is_none() {
            return Err(VoiceError::RaumVoll(raum.id.clone()));
        }
        raum.teilnehmer_hinzufuegen(teilnehmer.clone(), jetzt);
        Ok((raum.zusammenfassung(), teilnehmer.zusammenfassung()))
    }

    async fn raum_metadaten_holen(&self, raum_id: &RoomId) -> Option<RoomMetadata> {
        match self.verzeichnis.raum_metadaten(raum_id).await {
            Ok(metadaten) => metadaten,
            Err(fehler) => {
                tracing::warn!(
                    raum_id = %raum_id,
                    fehler = %fehler,
                    "Raum-Verzeichnis nicht erreichbar – Standardwerte"
                );
                None
            }
        }
    }

    /// Gemeinsamer Aufraeumpfad fuer Verlassen, Trennung, Verdraengung
    /// und Timeout
    ///
    /// Idempotent; genau der erste Aufruf pro Session verschickt das
    /// `user-left`-Event. Gibt `true` zurueck wenn eine Session beendet
    /// wurde.
    fn sitzung_beenden(&self, connection_id: ConnectionId, grund: &str) -> bool {
        let Some(session) = self.sessions.schliessen(connection_id) else {
            return false;
        };
        self.broadcaster.raum_verlassen(connection_id);
        self.teilnehmer_austragen(&session.room_id, session.user_id);
        tracing::info!(
            user_id = %session.user_id,
            raum_id = %session.room_id,
            grund = grund,
            "Voice-Session beendet"
        );
        true
    }

    /// Entfernt den Teilnehmer aus dem Raumzustand und benachrichtigt die
    /// verbliebenen Teilnehmer
    fn teilnehmer_austragen(&self, raum_id: &RoomId, user_id: UserId) {
        let jetzt = self.uhr.jetzt();
        let war_teilnehmer = self
            .registry
            .aendern(raum_id, |raum| raum.teilnehmer_entfernen(user_id, jetzt))
            .unwrap_or(false);
        if war_teilnehmer {
            self.broadcaster.an_raum_senden(
                raum_id,
                VoiceEvent::UserLeft {
                    room_id: raum_id.clone(),
                    user_id,
                },
            );
        }
        self.registry.entfernen_wenn_leer(raum_id);
    }

    // -----------------------------------------------------------------------
    // Signaling und Teilnehmer-Status
    // -----------------------------------------------------------------------

    fn signal_weiterleiten(
        &self,
        connection_id: ConnectionId,
        nachricht: SignalingMessage,
    ) -> VoiceResult<()> {
        let session = self
            .sessions
            .session(connection_id)
            .ok_or(VoiceError::NichtImRaum)?;
        let zugestellt = self.relay.weiterleiten(nachricht, &session)?;
        self.weitergeleitet
            .fetch_add(zugestellt as u64, Ordering::Relaxed);
        Ok(())
    }

    fn stumm_setzen(&self, connection_id: ConnectionId, stumm: bool) -> VoiceResult<()> {
        let session = self
            .sessions
            .session(connection_id)
            .ok_or(VoiceError::NichtImRaum)?;

        let geaendert = self
            .registry
            .aendern(&session.room_id, |raum| {
                match raum.teilnehmer_finden_mut(session.user_id) {
                    Some(teilnehmer) => {
                        teilnehmer.stumm = stumm;
                        true
                    }
                    None => false,
                }
            })
            .unwrap_or(false);
        if !geaendert {
            return Err(VoiceError::NichtImRaum);
        }

        self.broadcaster.an_raum_senden(
            &session.room_id,
            VoiceEvent::UserMuteChanged {
                room_id: session.room_id.clone(),
                user_id: session.user_id,
                muted: stumm,
            },
        );
        Ok(())
    }

    fn sprechen_melden(
        &self,
        connection_id: ConnectionId,
        spricht: bool,
        lautstaerke: Option<u8>,
    ) -> VoiceResult<()> {
        let session = self
            .sessions
            .session(connection_id)
            .ok_or(VoiceError::NichtImRaum)?;

        let aktuelle_lautstaerke = self
            .registry
            .aendern(&session.room_id, |raum| {
                raum.teilnehmer_finden_mut(session.user_id).map(|teilnehmer| {
                    teilnehmer.spricht = spricht;
                    if let Some(wert) = lautstaerke {
                        teilnehmer.lautstaerke = wert.min(100);
                    }
                    teilnehmer.lautstaerke
                })
            })
            .flatten()
            .ok_or(VoiceError::NichtImRaum)?;

        // Sprechzeit fuer das Reporting kumulieren
        let jetzt = self.uhr.jetzt();
        self.sessions.telemetrie_anrechnen(connection_id, |telemetrie| {
            match (spricht, telemetrie.sprech_beginn) {
                (true, None) => telemetrie.sprech_beginn = Some(jetzt),
                (false, Some(beginn)) => {
                    telemetrie.sprechzeit_ms += (jetzt - beginn).num_milliseconds().max(0) as u64;
                    telemetrie.sprech_beginn = None;
                }
                _ => {}
            }
        });

        // Nur die anderen interessiert der Sprech-Status
        self.broadcaster.an_raum_ausser_senden(
            &session.room_id,
            connection_id,
            VoiceEvent::UserSpeakingChanged {
                room_id: session.room_id.clone(),
                user_id: session.user_id,
                speaking: spricht,
                volume: aktuelle_lautstaerke,
            },
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Sprecherverwaltung
    // -----------------------------------------------------------------------

    fn mikro_anfordern(&self, connection_id: ConnectionId, raum_id: RoomId) -> VoiceResult<()> {
        let session = self
            .sessions
            .session(connection_id)
            .ok_or(VoiceError::NichtImRaum)?;
        if session.room_id != raum_id {
            return Err(VoiceError::SessionRaumKonflikt(raum_id));
        }

        let position = self
            .registry
            .aendern(&raum_id, |raum| {
                speaker_queue::mikro_anfordern(raum, session.user_id)
            })
            .ok_or_else(|| VoiceError::RaumNichtGefunden(raum_id.clone()))??;

        // Host und Moderation erfahren von der Anfrage
        let moderierende = self
            .registry
            .lesen(&raum_id, |raum| raum.moderierende_user_ids())
            .unwrap_or_default();
        for mod_user in moderierende {
            if let Some(mod_conn) = self.sessions.verbindung_von_user(mod_user) {
                self.broadcaster.an_verbindung_senden(
                    mod_conn,
                    VoiceEvent::MicRequested {
                        room_id: raum_id.clone(),
                        user_id: session.user_id,
                        queue_position: position,
                    },
                );
            }
        }

        self.broadcaster.an_verbindung_senden(
            connection_id,
            VoiceEvent::MicRequestSent {
                room_id: raum_id,
                queue_position: position,
            },
        );
        Ok(())
    }

    fn sprecher_verwalten(
        &self,
        connection_id: ConnectionId,
        raum_id: RoomId,
        ziel: UserId,
        aktion: SpeakerAction,
    ) -> VoiceResult<()> {
        let session = self
            .sessions
            .session(connection_id)
            .ok_or(VoiceError::NichtImRaum)?;
        if session.room_id != raum_id {
            return Err(VoiceError::SessionRaumKonflikt(raum_id));
        }
        let akteur = session.user_id;

        match aktion {
            SpeakerAction::Approve => {
                self.registry
                    .aendern(&raum_id, |raum| {
                        speaker_queue::genehmigen(raum, ziel, akteur, self.konfig.max_sprecher)
                    })
                    .ok_or_else(|| VoiceError::RaumNichtGefunden(raum_id.clone()))??;

                if let Some(ziel_conn) = self.sessions.verbindung_von_user(ziel) {
                    self.broadcaster.an_verbindung_senden(
                        ziel_conn,
                        VoiceEvent::MicApproved {
                            room_id: raum_id.clone(),
                        },
                    );
                }
                self.broadcaster.an_raum_senden(
                    &raum_id,
                    VoiceEvent::SpeakerAdded {
                        room_id: raum_id.clone(),
                        user_id: ziel,
                    },
                );
                tracing::info!(raum_id = %raum_id, ziel = %ziel, akteur = %akteur, "Sprecher genehmigt");
            }
            SpeakerAction::Deny => {
                let entfernt = self
                    .registry
                    .aendern(&raum_id, |raum| speaker_queue::ablehnen(raum, ziel, akteur))
                    .ok_or_else(|| VoiceError::RaumNichtGefunden(raum_id.clone()))??;

                if entfernt {
                    if let Some(ziel_conn) = self.sessions.verbindung_von_user(ziel) {
                        self.broadcaster.an_verbindung_senden(
                            ziel_conn,
                            VoiceEvent::MicDenied {
                                room_id: raum_id.clone(),
                            },
                        );
                    }
                }
            }
            SpeakerAction::Remove => {
                let entfernt = self
                    .registry
                    .aendern(&raum_id, |raum| {
                        speaker_queue::sprecher_entfernen(raum, ziel, akteur)
                    })
                    .ok_or_else(|| VoiceError::RaumNichtGefunden(raum_id.clone()))??;

                if entfernt {
                    self.broadcaster.an_raum_senden(
                        &raum_id,
                        VoiceEvent::SpeakerRemoved {
                            room_id: raum_id.clone(),
                            user_id: ziel,
                        },
                    );
                }
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Bereinigung
    // -----------------------------------------------------------------------

    /// Beendet alle Sessions deren Inaktivitaet das Timeout ueberschreitet
    ///
    /// Wird periodisch vom Reaper aufgerufen; Tests rufen den Sweep direkt
    /// mit einer Fake-Uhr auf. Gibt die Anzahl bereinigter Sessions zurueck.
    pub fn abgelaufene_bereinigen(&self) -> usize {
        let jetzt = self.uhr.jetzt();
        let timeout = chrono::Duration::from_std(self.konfig.session_timeout)
            .unwrap_or_else(|_| chrono::Duration::seconds(30));

        let kandidaten = self.sessions.abgelaufene(jetzt, timeout);
        let mut bereinigt = 0;
        for connection_id in kandidaten {
            if self.sitzung_beenden(connection_id, "Inaktivitaets-Timeout") {
                bereinigt += 1;
            }
        }
        if bereinigt > 0 {
            tracing::info!(anzahl = bereinigt, "Inaktive Voice-Sessions bereinigt");
        }
        bereinigt
    }

    // -----------------------------------------------------------------------
    // Query-Oberflaeche
    // -----------------------------------------------------------------------

    /// Bereinigte Sicht auf alle aktiven Raeume
    pub fn alle_raeume(&self) -> Vec<RoomSummary> {
        self.registry.alle_zusammenfassungen()
    }

    /// Bereinigte Sicht auf einen Raum
    pub fn raum(&self, raum_id: &RoomId) -> Option<RoomSummary> {
        self.registry.zusammenfassung(raum_id)
    }

    /// Teilnehmerliste eines Raums
    pub fn raum_teilnehmer(&self, raum_id: &RoomId) -> Option<Vec<ParticipantSummary>> {
        self.registry.zusammenfassung(raum_id).map(|s| s.participants)
    }

    /// Verbindungsstatus eines Benutzers
    pub fn benutzer_status(&self, user_id: UserId) -> UserStatus {
        let raum = self.sessions.raum_von_user(user_id);
        UserStatus {
            user_id,
            connected: raum.is_some(),
            room_id: raum,
        }
    }

    /// Aggregierte Dienststatistik
    pub fn statistik(&self) -> ServiceStats {
        ServiceStats {
            active_rooms: self.registry.anzahl(),
            rooms_created_total: self.registry.erstellt_gesamt(),
            active_sessions: self.sessions.anzahl(),
            relayed_messages: self.weitergeleitet.load(Ordering::Relaxed),
            uptime_seconds: (self.uhr.jetzt() - self.gestartet_am)
                .num_seconds()
                .max(0) as u64,
        }
    }
}
