//! parley-server – Bibliotheks-Root
//!
//! Deklariert alle Server-Module und stellt den oeffentlichen
//! Einstiegspunkt fuer Integrationstests bereit.

pub mod config;
pub mod directory;
pub mod http;

use anyhow::Result;
use std::sync::Arc;

use config::ServerConfig;
use directory::{KonfigRoomDirectory, PlatzhalterIdentity};
use parley_voice::{reaper, SystemClock, VoiceCoordinator};

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Server-Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Koordinator mit Verzeichnis-Anbindungen verdrahten
    /// 2. Session-Reaper starten
    /// 3. HTTP/WebSocket-Listener binden
    /// 4. Auf Ctrl-C / SIGTERM warten
    pub async fn starten(self) -> Result<()> {
        tracing::info!(
            server_name = %self.config.server.name,
            http = %self.config.http_bind_adresse(),
            raeume = self.config.raeume.len(),
            "Server startet"
        );

        let koordinator = VoiceCoordinator::neu(
            self.config.voice_config(),
            Arc::new(KonfigRoomDirectory::aus_config(&self.config)),
            Arc::new(PlatzhalterIdentity::aus_config(&self.config)),
            SystemClock,
        );

        let reaper_handle = reaper::starten(koordinator.clone());

        let listener = tokio::net::TcpListener::bind(self.config.http_bind_adresse()).await?;
        tracing::info!(adresse = %self.config.http_bind_adresse(), "HTTP/WebSocket-Listener bereit");

        axum::serve(listener, http::router(koordinator))
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        reaper_handle.abort();
        tracing::info!("Server beendet");
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
}
