//! Session-Reaper – periodische Bereinigung inaktiver Sessions
//!
//! Ein Hintergrund-Task ruft in festem Intervall den Sweep des
//! Koordinators auf. Abgelaufene Sessions laufen durch denselben
//! Aufraeumpfad wie ein freiwilliges Verlassen; fuer die verbliebenen
//! Teilnehmer ist beides nicht unterscheidbar.

use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::coordinator::VoiceCoordinator;
use crate::directory::{Clock, IdentityDirectory, RoomDirectory};

/// Startet den Bereinigungs-Task
///
/// Laeuft bis der Prozess endet oder das Handle abgebrochen wird. Das
/// Intervall kommt aus der Koordinator-Konfiguration.
pub fn starten<D, I, C>(koordinator: Arc<VoiceCoordinator<D, I, C>>) -> JoinHandle<()>
where
    D: RoomDirectory + 'static,
    I: IdentityDirectory + 'static,
    C: Clock + 'static,
{
    let intervall = koordinator.konfig().sweep_intervall;
    tokio::spawn(async move {
        let mut takt = tokio::time::interval(intervall);
        // Der erste Tick kommt sofort und wuerde frisch gestartete
        // Prozesse sinnlos sweepen
        takt.tick().await;
        loop {
            takt.tick().await;
            let bereinigt = koordinator.abgelaufene_bereinigen();
            tracing::debug!(bereinigt = bereinigt, "Session-Sweep abgeschlossen");
        }
    })
}
