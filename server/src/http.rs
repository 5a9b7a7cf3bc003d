//! HTTP-Oberflaeche: Query-Endpunkte und WebSocket-Transport
//!
//! Die Query-Endpunkte liefern ausschliesslich bereinigte Sichten; der
//! WebSocket-Endpunkt uebersetzt Frames in `VoiceCommand`s und pumpt
//! `VoiceEvent`s zurueck. Regeln leben vollstaendig im Koordinator.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use parley_core::{ConnectionId, RoomId, UserId};
use parley_protocol::voice::VoiceCommand;
use parley_voice::{SystemClock, VoiceCoordinator};
use serde_json::json;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::directory::{KonfigRoomDirectory, PlatzhalterIdentity};

/// Der produktiv verdrahtete Koordinator
pub type Koordinator = Arc<VoiceCoordinator<KonfigRoomDirectory, PlatzhalterIdentity, SystemClock>>;

/// Erstellt den vollstaendigen Router
pub fn router(koordinator: Koordinator) -> Router {
    Router::new()
        .route("/v1/voice/rooms", get(raeume_auflisten))
        .route("/v1/voice/rooms/:id", get(raum_anzeigen))
        .route("/v1/voice/rooms/:id/participants", get(raum_teilnehmer))
        .route("/v1/voice/users/:id/status", get(benutzer_status))
        .route("/v1/voice/stats", get(statistik))
        .route("/v1/voice/ws", get(ws_verbindung))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(koordinator)
}

// ---------------------------------------------------------------------------
// Query-Endpunkte
// ---------------------------------------------------------------------------

async fn raeume_auflisten(State(koordinator): State<Koordinator>) -> Response {
    Json(koordinator.alle_raeume()).into_response()
}

async fn raum_anzeigen(
    State(koordinator): State<Koordinator>,
    Path(id): Path<String>,
) -> Response {
    match koordinator.raum(&RoomId::neu(id)) {
        Some(raum) => Json(raum).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Raum nicht aktiv" })),
        )
            .into_response(),
    }
}

async fn raum_teilnehmer(
    State(koordinator): State<Koordinator>,
    Path(id): Path<String>,
) -> Response {
    match koordinator.raum_teilnehmer(&RoomId::neu(id)) {
        Some(teilnehmer) => Json(teilnehmer).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Raum nicht aktiv" })),
        )
            .into_response(),
    }
}

async fn benutzer_status(
    State(koordinator): State<Koordinator>,
    Path(id): Path<i64>,
) -> Response {
    Json(koordinator.benutzer_status(UserId(id))).into_response()
}

async fn statistik(State(koordinator): State<Koordinator>) -> Response {
    Json(koordinator.statistik()).into_response()
}

// ---------------------------------------------------------------------------
// WebSocket-Transport
// ---------------------------------------------------------------------------

async fn ws_verbindung(
    State(koordinator): State<Koordinator>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| verbindung_behandeln(koordinator, socket))
}

/// Pumpt Kommandos vom Socket in den Koordinator und Events zurueck
async fn verbindung_behandeln(koordinator: Koordinator, socket: WebSocket) {
    let connection_id = ConnectionId::new();
    let mut events = koordinator.verbindung_registrieren(connection_id);
    let (mut sender, mut empfaenger) = socket.split();

    tracing::debug!(connection_id = %connection_id, "WebSocket-Verbindung angenommen");

    let sende_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(fehler) => {
                    tracing::error!(fehler = %fehler, "Event nicht serialisierbar");
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(nachricht)) = empfaenger.next().await {
        match nachricht {
            Message::Text(text) => match serde_json::from_str::<VoiceCommand>(&text) {
                Ok(kommando) => koordinator.verarbeiten(connection_id, kommando).await,
                Err(fehler) => {
                    tracing::debug!(
                        connection_id = %connection_id,
                        fehler = %fehler,
                        "Unlesbares Kommando verworfen"
                    );
                }
            },
            Message::Close(_) => break,
            // Ping/Pong beantwortet axum selbst, Binaerframes ignorieren wir
            _ => {}
        }
    }

    koordinator.verbindung_getrennt(connection_id);
    sende_task.abort();
    tracing::debug!(connection_id = %connection_id, "WebSocket-Verbindung geschlossen");
}
