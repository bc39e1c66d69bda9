//! HTTP/websocket transport.
//!
//! Thin glue between the network and `StreamSession`: one websocket per
//! session at `/ws/stream`, a model-listing endpoint at `/models`, and
//! permissive CORS for browser clients. The socket is split into a reader
//! task and a writer task bridging the session worker's two channel lanes;
//! closing the inbound lane is how the worker observes a disconnect.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;

use crate::detect::BackendRegistry;
use crate::session::{SessionConfig, StreamSession};

/// Inbound control lane depth; a client flooding control messages gets
/// backpressure, not unbounded buffering.
const INBOUND_CAPACITY: usize = 32;
/// Outbound lane stays shallow so a slow peer throttles frame production.
const OUTBOUND_CAPACITY: usize = 4;

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<BackendRegistry>,
    pub session_config: SessionConfig,
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws/stream", get(stream_handler))
        .route("/models", get(models_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn models_handler(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.registry.list_models())
}

async fn stream_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (in_tx, in_rx) = mpsc::channel::<String>(INBOUND_CAPACITY);
    let (out_tx, mut out_rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);

    let session = StreamSession::new(
        state.registry.clone(),
        state.session_config.clone(),
        in_rx,
        out_tx,
    );
    let worker = tokio::task::spawn_blocking(move || session.run());

    let send_task = tokio::spawn(async move {
        while let Some(text) = out_rx.recv().await {
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        // lane closed: the session is done, tell the peer
        let _ = sender.close().await;
    });

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                if in_tx.send(text).await.is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }
    // dropping the inbound lane is the disconnect signal the worker polls for
    drop(in_tx);

    if let Err(err) = worker.await {
        log::error!("session worker panicked: {err}");
    }
    let _ = send_task.await;
}
