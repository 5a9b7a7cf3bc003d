//! Raum-Modell und RoomRegistry – autoritativer In-Memory-Zustand
//!
//! Raeume entstehen lazy beim ersten Beitritt zu einer unbekannten Raum-ID
//! und verschwinden in dem Moment, in dem der letzte Teilnehmer geht.
//! Nichts hiervon wird persistiert; nach einem Neustart ist die Registry
//! leer und Metadaten werden bei Bedarf neu aus dem Verzeichnis geholt.
//!
//! Thread-safe durch DashMap: der per-Entry-Lock von `aendern` serialisiert
//! alle Mutationen eines Raums gegeneinander.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parley_core::{Role, RoomId, UserId};
use parley_protocol::voice::{AudioProfile, ConnectionQuality, ParticipantSummary, RoomSummary};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::directory::{RoomMetadata, UserProfile};

/// Standard-Obergrenze fuer Teilnehmer pro Raum
pub const MAX_TEILNEHMER_STANDARD: usize = 50;

/// Standard-Obergrenze fuer Sprecher in Broadcast-Raeumen
pub const MAX_SPRECHER_STANDARD: usize = 10;

// ---------------------------------------------------------------------------
// VoiceParticipant
// ---------------------------------------------------------------------------

/// Transienter Voice-Zustand eines verbundenen Teilnehmers
///
/// Rolle und Anzeigename werden beim Beitritt aus dem Identitaetsdienst
/// kopiert und danach nicht live aktualisiert.
#[derive(Debug, Clone)]
pub struct VoiceParticipant {
    pub user_id: UserId,
    pub anzeige_name: String,
    pub rolle: Role,
    pub stumm: bool,
    pub taub: bool,
    pub spricht: bool,
    /// Lautstaerke 0–100
    pub lautstaerke: u8,
    pub verbindungs_qualitaet: ConnectionQuality,
    pub beigetreten_am: DateTime<Utc>,
}

impl VoiceParticipant {
    /// Erstellt einen Teilnehmer aus einem Identitaetsprofil
    pub fn neu(profil: &UserProfile, jetzt: DateTime<Utc>) -> Self {
        Self {
            user_id: profil.user_id,
            anzeige_name: profil.anzeige_name.clone(),
            rolle: profil.rolle,
            stumm: false,
            taub: false,
            spricht: false,
            lautstaerke: 80,
            verbindungs_qualitaet: ConnectionQuality::default(),
            beigetreten_am: jetzt,
        }
    }

    /// Bereinigte Sicht fuer Events und die Query-Oberflaeche
    pub fn zusammenfassung(&self) -> ParticipantSummary {
        ParticipantSummary {
            user_id: self.user_id,
            display_name: self.anzeige_name.clone(),
            role: self.rolle,
            muted: self.stumm,
            deafened: self.taub,
            speaking: self.spricht,
            volume: self.lautstaerke,
            connection_quality: self.verbindungs_qualitaet,
            joined_at: self.beigetreten_am,
        }
    }
}

// ---------------------------------------------------------------------------
// VoiceRoom
// ---------------------------------------------------------------------------

/// Ein aktiver Voice-Raum
///
/// Invarianten:
/// - eine UserId steht hoechstens in einer der Listen {sprecher,
///   mikro_warteschlange}
/// - `teilnehmer` enthaelt genau die Benutzer mit aktiver Session auf
///   diesen Raum
#[derive(Debug, Clone)]
pub struct VoiceRoom {
    pub id: RoomId,
    pub name: String,
    pub beschreibung: Option<String>,
    pub max_teilnehmer: usize,
    pub gesperrt: bool,
    pub broadcast: bool,
    /// Host (nur bei Broadcast-Raeumen gesetzt)
    pub host_id: Option<UserId>,
    /// Geordnete Sprecherliste (kapazitaetsbegrenzt)
    pub sprecher: Vec<UserId>,
    /// FIFO-Warteschlange der Mikrofonanfragen
    pub mikro_warteschlange: Vec<UserId>,
    /// Informatives Audio-Profil – wird von diesem Dienst nicht durchgesetzt
    pub audio: AudioProfile,
    /// Verbundene Teilnehmer in Beitrittsreihenfolge
    pub teilnehmer: Vec<VoiceParticipant>,
    pub erstellt_am: DateTime<Utc>,
    pub letzte_aktivitaet: DateTime<Utc>,
}

impl VoiceRoom {
    /// Erstellt einen Raum aus Verzeichnis-Metadaten
    ///
    /// `metadaten = None` bedeutet: das Verzeichnis kennt den Raum nicht
    /// oder war nicht erreichbar – dann generische Standardwerte
    /// (Verfuegbarkeit geht vor Vollstaendigkeit).
    pub fn neu(
        id: RoomId,
        metadaten: Option<RoomMetadata>,
        max_teilnehmer: usize,
        jetzt: DateTime<Utc>,
    ) -> Self {
        let (name, beschreibung, gesperrt, broadcast, host_id) = match metadaten {
            Some(m) => (m.name, m.beschreibung, m.gesperrt, m.broadcast, m.host_id),
            None => (format!("Raum {}", id.as_str()), None, false, false, None),
        };

        Self {
            id,
            name,
            beschreibung,
            max_teilnehmer,
            gesperrt,
            broadcast,
            host_id,
            sprecher: Vec::new(),
            mikro_warteschlange: Vec::new(),
            audio: AudioProfile::default(),
            teilnehmer: Vec::new(),
            erstellt_am: jetzt,
            letzte_aktivitaet: jetzt,
        }
    }

    /// Prueft ob die Teilnehmer-Obergrenze erreicht ist
    pub fn ist_voll(&self) -> bool {
        self.teilnehmer.len() >= self.max_teilnehmer
    }

    /// Prueft ob der Raum leer ist (und damit zu entfernen)
    pub fn ist_leer(&self) -> bool {
        self.teilnehmer.is_empty()
    }

    /// Sucht einen Teilnehmer anhand der UserId
    pub fn teilnehmer_finden(&self, user_id: UserId) -> Option<&VoiceParticipant> {
        self.teilnehmer.iter().find(|t| t.user_id == user_id)
    }

    /// Sucht einen Teilnehmer veraenderbar
    pub fn teilnehmer_finden_mut(&mut self, user_id: UserId) -> Option<&mut VoiceParticipant> {
        self.teilnehmer.iter_mut().find(|t| t.user_id == user_id)
    }

    /// Fuegt einen Teilnehmer hinzu und aktualisiert die Aktivitaet
    ///
    /// Ein bestehender Eintrag desselben Benutzers wird ersetzt (Rejoin
    /// nach Verdraengung in denselben Raum); pro UserId existiert damit
    /// hoechstens ein Eintrag.
    pub fn teilnehmer_hinzufuegen(&mut self, teilnehmer: VoiceParticipant, jetzt: DateTime<Utc>) {
        match self.teilnehmer_finden_mut(teilnehmer.user_id) {
            Some(vorhanden) => *vorhanden = teilnehmer,
            None => self.teilnehmer.push(teilnehmer),
        }
        self.letzte_aktivitaet = jetzt;
    }

    /// Entfernt einen Teilnehmer samt Sprecher- und Warteschlangen-Eintrag
    ///
    /// Gibt `true` zurueck wenn der Benutzer Teilnehmer war.
    pub fn teilnehmer_entfernen(&mut self, user_id: UserId, jetzt: DateTime<Utc>) -> bool {
        let vorher = self.teilnehmer.len();
        self.teilnehmer.retain(|t| t.user_id != user_id);
        self.sprecher.retain(|id| *id != user_id);
        self.mikro_warteschlange.retain(|id| *id != user_id);
        self.letzte_aktivitaet = jetzt;
        self.teilnehmer.len() != vorher
    }

    /// Konsolidiertes Moderations-Praedikat
    ///
    /// Host ODER moderierende Rolle – damit behaelt die Moderation die
    /// Kontrolle auch wenn der Host abwesend ist.
    pub fn kann_moderieren(&self, akteur: &VoiceParticipant) -> bool {
        akteur.rolle.ist_moderierend() || self.host_id == Some(akteur.user_id)
    }

    /// Verbindungen von Host und Moderation (Empfaenger von `mic-requested`)
    pub fn moderierende_user_ids(&self) -> Vec<UserId> {
        self.teilnehmer
            .iter()
            .filter(|t| self.kann_moderieren(t))
            .map(|t| t.user_id)
            .collect()
    }

    /// Bereinigte Sicht fuer Events und die Query-Oberflaeche
    pub fn zusammenfassung(&self) -> RoomSummary {
        RoomSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.beschreibung.clone(),
            max_participants: self.max_teilnehmer,
            locked: self.gesperrt,
            broadcast: self.broadcast,
            host_id: self.host_id,
            speakers: self.sprecher.clone(),
            audio: self.audio.clone(),
            participants: self.teilnehmer.iter().map(|t| t.zusammenfassung()).collect(),
            participant_count: self.teilnehmer.len(),
        }
    }
}

// ---------------------------------------------------------------------------
// RoomRegistry
// ---------------------------------------------------------------------------

/// Autoritative Registry aller aktiven Voice-Raeume
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct RoomRegistry {
    inner: Arc<RoomRegistryInner>,
}

struct RoomRegistryInner {
    /// Aktive Raeume, indiziert nach RoomId
    raeume: DashMap<RoomId, VoiceRoom>,
    /// Zaehler erstellter Raeume (nur fuer Reporting)
    erstellt_gesamt: AtomicU64,
}

impl RoomRegistry {
    /// Erstellt eine neue leere Registry
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(RoomRegistryInner {
                raeume: DashMap::new(),
                erstellt_gesamt: AtomicU64::new(0),
            }),
        }
    }

    /// Legt den Raum an falls er fehlt (Metadaten wurden vorher geholt –
    /// fetch-then-insert, nie ein Await unter gehaltenem Entry)
    ///
    /// Gibt `true` zurueck wenn der Raum neu erstellt wurde.
    pub fn holen_oder_erstellen(
        &self,
        raum_id: &RoomId,
        metadaten: Option<RoomMetadata>,
        max_teilnehmer: usize,
        jetzt: DateTime<Utc>,
    ) -> bool {
        let mut erstellt = false;
        self.inner.raeume.entry(raum_id.clone()).or_insert_with(|| {
            erstellt = true;
            self.inner.erstellt_gesamt.fetch_add(1, Ordering::Relaxed);
            tracing::info!(raum_id = %raum_id, "Voice-Raum erstellt");
            VoiceRoom::neu(raum_id.clone(), metadaten, max_teilnehmer, jetzt)
        });
        erstellt
    }

    /// Prueft ob ein Raum existiert
    pub fn enthaelt(&self, raum_id: &RoomId) -> bool {
        self.inner.raeume.contains_key(raum_id)
    }

    /// Veraendert einen Raum unter dessen Entry-Lock
    ///
    /// Alle Mutationen eines Raums laufen hierdurch und sind damit
    /// gegeneinander serialisiert. Gibt `None` zurueck wenn der Raum
    /// nicht (mehr) existiert.
    pub fn aendern<F, R>(&self, raum_id: &RoomId, f: F) -> Option<R>
    where
        F: FnOnce(&mut VoiceRoom) -> R,
    {
        self.inner.raeume.get_mut(raum_id).map(|mut raum| f(&mut raum))
    }

    /// Liest einen Raum unter Shared-Lock
    pub fn lesen<F, R>(&self, raum_id: &RoomId, f: F) -> Option<R>
    where
        F: FnOnce(&VoiceRoom) -> R,
    {
        self.inner.raeume.get(raum_id).map(|raum| f(&raum))
    }

    /// Entfernt den Raum sofort wenn er keine Teilnehmer mehr hat
    ///
    /// Gibt `true` zurueck wenn der Raum entfernt wurde.
    pub fn entfernen_wenn_leer(&self, raum_id: &RoomId) -> bool {
        let entfernt = self
            .inner
            .raeume
            .remove_if(raum_id, |_, raum| raum.ist_leer())
            .is_some();
        if entfernt {
            tracing::info!(raum_id = %raum_id, "Leerer Voice-Raum entfernt");
        }
        entfernt
    }

    /// Bereinigte Sicht auf einen Raum
    pub fn zusammenfassung(&self, raum_id: &RoomId) -> Option<RoomSummary> {
        self.lesen(raum_id, |raum| raum.zusammenfassung())
    }

    /// Bereinigte Sicht auf alle aktiven Raeume
    pub fn alle_zusammenfassungen(&self) -> Vec<RoomSummary> {
        self.inner
            .raeume
            .iter()
            .map(|e| e.value().zusammenfassung())
            .collect()
    }

    /// Anzahl aktiver Raeume
    pub fn anzahl(&self) -> usize {
        self.inner.raeume.len()
    }

    /// Gesamtzahl jemals erstellter Raeume (Reporting)
    pub fn erstellt_gesamt(&self) -> u64 {
        self.inner.erstellt_gesamt.load(Ordering::Relaxed)
    }
}

impl Default for RoomRegistry {
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

    fn test_profil(id: i64, rolle: Role) -> UserProfile {
        UserProfile {
            user_id: UserId(id),
            anzeige_name: format!("user{id}"),
            rolle,
        }
    }

    fn test_metadaten(broadcast: bool) -> RoomMetadata {
        RoomMetadata {
            name: "Testraum".into(),
            beschreibung: Some("Beschreibung".into()),
            gesperrt: false,
            broadcast,
            host_id: broadcast.then_some(UserId(1)),
        }
    }

    #[test]
    fn raum_erstellen_mit_metadaten() {
        let registry = RoomRegistry::neu();
        let rid = RoomId::neu("r1");

        let erstellt = registry.holen_oder_erstellen(
            &rid,
            Some(test_metadaten(true)),
            MAX_TEILNEHMER_STANDARD,
            Utc::now(),
        );
        assert!(erstellt);
        assert_eq!(registry.anzahl(), 1);
        assert_eq!(registry.erstellt_gesamt(), 1);

        let summary = registry.zusammenfassung(&rid).unwrap();
        assert_eq!(summary.name, "Testraum");
        assert!(summary.broadcast);
        assert_eq!(summary.host_id, Some(UserId(1)));
    }

    #[test]
    fn raum_erstellen_ohne_metadaten_nutzt_standardwerte() {
        let registry = RoomRegistry::neu();
        let rid = RoomId::neu("unbekannt");

        registry.holen_oder_erstellen(&rid, None, MAX_TEILNEHMER_STANDARD, Utc::now());

        let summary = registry.zusammenfassung(&rid).unwrap();
        assert_eq!(summary.name, "Raum unbekannt");
        assert!(!summary.broadcast);
        assert!(!summary.locked);
        assert_eq!(summary.audio.codec, "opus");
    }

    #[test]
    fn doppeltes_erstellen_ist_noop() {
        let registry = RoomRegistry::neu();
        let rid = RoomId::neu("r1");

        assert!(registry.holen_oder_erstellen(&rid, None, 50, Utc::now()));
        assert!(!registry.holen_oder_erstellen(&rid, None, 50, Utc::now()));
        assert_eq!(registry.erstellt_gesamt(), 1);
    }

    #[test]
    fn entfernen_nur_wenn_leer() {
        let registry = RoomRegistry::neu();
        let rid = RoomId::neu("r1");
        let jetzt = Utc::now();

        registry.holen_oder_erstellen(&rid, None, 50, jetzt);
        registry.aendern(&rid, |raum| {
            raum.teilnehmer_hinzufuegen(
                VoiceParticipant::neu(&test_profil(1, Role::Member), jetzt),
                jetzt,
            );
        });

        assert!(!registry.entfernen_wenn_leer(&rid), "Raum mit Teilnehmer bleibt");
        assert!(registry.enthaelt(&rid));

        registry.aendern(&rid, |raum| {
            raum.teilnehmer_entfernen(UserId(1), jetzt);
        });
        assert!(registry.entfernen_wenn_leer(&rid));
        assert!(!registry.enthaelt(&rid));
    }

    #[test]
    fn neuerstellung_nach_entfernen_ist_frisch() {
        let registry = RoomRegistry::neu();
        let rid = RoomId::neu("r1");
        let jetzt = Utc::now();

        registry.holen_oder_erstellen(&rid, None, 50, jetzt);
        registry.aendern(&rid, |raum| {
            raum.sprecher.push(UserId(5));
        });
        registry.entfernen_wenn_leer(&rid);

        registry.holen_oder_erstellen(&rid, None, 50, jetzt);
        let summary = registry.zusammenfassung(&rid).unwrap();
        assert!(summary.speakers.is_empty(), "Neuer Raum startet leer");
        assert_eq!(summary.participant_count, 0);
    }

    #[test]
    fn doppelter_eintrag_ersetzt_den_bestehenden() {
        let jetzt = Utc::now();
        let mut raum = VoiceRoom::neu(RoomId::neu("r"), None, 50, jetzt);

        let mut erster = VoiceParticipant::neu(&test_profil(7, Role::Member), jetzt);
        erster.stumm = true;
        raum.teilnehmer_hinzufuegen(erster, jetzt);
        raum.teilnehmer_hinzufuegen(
            VoiceParticipant::neu(&test_profil(7, Role::Member), jetzt),
            jetzt,
        );

        assert_eq!(raum.teilnehmer.len(), 1);
        // Der neue Eintrag gilt, inklusive frischem Zustand
        assert!(!raum.teilnehmer_finden(UserId(7)).unwrap().stumm);
    }

    #[test]
    fn teilnehmer_entfernen_raeumt_sprecher_und_warteschlange() {
        let jetzt = Utc::now();
        let mut raum = VoiceRoom::neu(RoomId::neu("b"), Some(test_metadaten(true)), 50, jetzt);
        raum.teilnehmer_hinzufuegen(
            VoiceParticipant::neu(&test_profil(7, Role::Member), jetzt),
            jetzt,
        );
        raum.sprecher.push(UserId(7));

        assert!(raum.teilnehmer_entfernen(UserId(7), jetzt));
        assert!(raum.sprecher.is_empty());
        assert!(raum.ist_leer());

        // Idempotent: zweites Entfernen meldet false
        assert!(!raum.teilnehmer_entfernen(UserId(7), jetzt));
    }

    #[test]
    fn moderations_praedikat() {
        let jetzt = Utc::now();
        let mut raum = VoiceRoom::neu(RoomId::neu("b"), Some(test_metadaten(true)), 50, jetzt);

        let host = VoiceParticipant::neu(&test_profil(1, Role::Member), jetzt);
        let moderator = VoiceParticipant::neu(&test_profil(2, Role::Moderator), jetzt);
        let mitglied = VoiceParticipant::neu(&test_profil(3, Role::Member), jetzt);

        // Host ist UserId(1) laut Metadaten, auch ohne moderierende Rolle
        assert!(raum.kann_moderieren(&host));
        assert!(raum.kann_moderieren(&moderator));
        assert!(!raum.kann_moderieren(&mitglied));

        raum.teilnehmer_hinzufuegen(host, jetzt);
        raum.teilnehmer_hinzufuegen(moderator, jetzt);
        raum.teilnehmer_hinzufuegen(mitglied, jetzt);
        let mods = raum.moderierende_user_ids();
        assert_eq!(mods, vec![UserId(1), UserId(2)]);
    }
}
