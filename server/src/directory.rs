//! Verzeichnis-Anbindungen des Servers
//!
//! `KonfigRoomDirectory` bedient Raum-Metadaten aus den `[[raeume]]`-
//! Bloecken der Konfiguration. `PlatzhalterIdentity` steht fuer die noch
//! nicht angebundene Plattform-Identitaet: jede positive Benutzer-ID gilt
//! als bekannt, Moderationsrechte kommen aus der Konfiguration.

use parley_core::{Result, Role, RoomId, UserId};
use parley_voice::{IdentityDirectory, RoomDirectory, RoomMetadata, UserProfile};
use std::collections::{HashMap, HashSet};

use crate::config::ServerConfig;

/// Raum-Verzeichnis auf Basis der Server-Konfiguration
pub struct KonfigRoomDirectory {
    raeume: HashMap<RoomId, RoomMetadata>,
}

impl KonfigRoomDirectory {
    /// Uebernimmt alle `[[raeume]]`-Eintraege der Konfiguration
    pub fn aus_config(config: &ServerConfig) -> Self {
        let raeume = config
            .raeume
            .iter()
            .filter(|eintrag| !eintrag.id.is_empty())
            .map(|eintrag| {
                (
                    RoomId::neu(&eintrag.id),
                    RoomMetadata {
                        name: eintrag.name.clone(),
                        beschreibung: eintrag.beschreibung.clone(),
                        gesperrt: eintrag.gesperrt,
                        broadcast: eintrag.broadcast,
                        host_id: eintrag.host_id.map(UserId),
                    },
                )
            })
            .collect();
        Self { raeume }
    }
}

impl RoomDirectory for KonfigRoomDirectory {
    async fn raum_metadaten(&self, raum_id: &RoomId) -> Result<Option<RoomMetadata>> {
        Ok(self.raeume.get(raum_id).cloned())
    }
}

/// Platzhalter-Identitaet bis zur Anbindung der Plattform
///
/// Die eigentliche Authentifizierung passiert vorgelagert (Reverse-Proxy
/// bzw. Plattform-Session); hier werden nur Anzeigename und Rolle
/// aufgeloest. TODO: gegen den Identitaetsdienst der Plattform tauschen
/// sobald dessen interne API stabil ist.
pub struct PlatzhalterIdentity {
    moderatoren: HashSet<UserId>,
    standard_rolle: Role,
}

impl PlatzhalterIdentity {
    /// Moderationsrechte kommen aus `server.moderatoren`, die Rolle der
    /// uebrigen Benutzer aus `server.standard_rolle`
    pub fn aus_config(config: &ServerConfig) -> Self {
        Self {
            moderatoren: config.server.moderatoren.iter().copied().map(UserId).collect(),
            standard_rolle: Role::aus_str(&config.server.standard_rolle),
        }
    }
}

impl IdentityDirectory for PlatzhalterIdentity {
    async fn benutzer_profil(&self, user_id: UserId) -> Result<Option<UserProfile>> {
        if user_id.inner() <= 0 {
            return Ok(None);
        }
        let rolle = if self.moderatoren.contains(&user_id) {
            Role::Moderator
        } else {
            self.standard_rolle
        };
        Ok(Some(UserProfile {
            user_id,
            anzeige_name: format!("Benutzer {}", user_id.inner()),
            rolle,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RaumEintrag;

    fn test_config() -> ServerConfig {
        let mut config = ServerConfig::default();
        config.server.moderatoren = vec![2];
        config.raeume.push(RaumEintrag {
            id: "buehne".into(),
            name: "Buehne".into(),
            broadcast: true,
            host_id: Some(1),
            ..RaumEintrag::default()
        });
        config
    }

    #[tokio::test]
    async fn konfigurierte_raeume_werden_gefunden() {
        let verzeichnis = KonfigRoomDirectory::aus_config(&test_config());

        let metadaten = verzeichnis
            .raum_metadaten(&RoomId::neu("buehne"))
            .await
            .unwrap()
            .expect("Raum muss bekannt sein");
        assert_eq!(metadaten.name, "Buehne");
        assert!(metadaten.broadcast);
        assert_eq!(metadaten.host_id, Some(UserId(1)));

        assert!(verzeichnis
            .raum_metadaten(&RoomId::neu("unbekannt"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn platzhalter_identitaet() {
        let identitaet = PlatzhalterIdentity::aus_config(&test_config());

        let profil = identitaet.benutzer_profil(UserId(2)).await.unwrap().unwrap();
        assert_eq!(profil.rolle, Role::Moderator);

        let profil = identitaet.benutzer_profil(UserId(3)).await.unwrap().unwrap();
        assert_eq!(profil.rolle, Role::Member);
        assert_eq!(profil.anzeige_name, "Benutzer 3");

        assert!(identitaet.benutzer_profil(UserId(0)).await.unwrap().is_none());
        assert!(identitaet.benutzer_profil(UserId(-4)).await.unwrap().is_none());
    }
}
