use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::{
    extract::{State, WebSocketUpgrade, ws::{Message, WebSocket}},
    response::Response,
};
use casavoz_services::{RecognitionAdapter, SimulatedTranscripts};
use casavoz_transcript::RecognitionEvent;
use futures::{SinkExt, StreamExt, stream::SplitSink};
use serde_json::json;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use super::session::{ClientCommand, Session, SessionEvent};
use crate::state::AppState;

pub type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Sends a JSON message over the shared socket sink.
pub(crate) async fn send_json(sender: &WsSender, message: &serde_json::Value) {
    let text = serde_json::to_string(message).unwrap_or_default();
    let mut guard = sender.lock().await;
    if let Err(e) = guard.send(Message::text(text)).await {
        warn!(%e, "failed to send WS message");
    }
}

pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// One session per client connection: owns the recognition adapter, the
/// per-session event queue, and the inbound message loop.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let client_id = state.client_seq.fetch_add(1, Ordering::SeqCst) + 1;
    state.connections.fetch_add(1, Ordering::SeqCst);
    info!(client_id, "client connected");

    let (sender, mut receiver) = socket.split();
    let sender = Arc::new(Mutex::new(sender));

    send_json(
        &sender,
        &json!({ "type": "connected", "clientId": client_id }),
    )
    .await;

    // Single tagged-event queue, consumed by one sequential loop. Adapter
    // callbacks, client commands and role-resolution outcomes all re-enter
    // through it, so transcript state never needs a lock.
    let (event_tx, event_rx) = mpsc::channel::<SessionEvent>(256);

    // Recognition events feed the same queue through a forwarding task; the
    // adapter stays ignorant of session-level variants.
    let (recognition_tx, mut recognition_rx) = mpsc::channel::<RecognitionEvent>(256);
    {
        let event_tx = event_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = recognition_rx.recv().await {
                if event_tx.send(SessionEvent::Recognition(event)).await.is_err() {
                    break;
                }
            }
        });
    }

    let adapter = match RecognitionAdapter::connect(&state.settings.deepgram, recognition_tx).await
    {
        Ok(adapter) => Some(adapter),
        Err(e) => {
            warn!(client_id, %e, "recognition stream unavailable, running in degraded mode");
            None
        }
    };

    let session = Session::new(client_id, state.clone(), sender.clone(), event_tx.clone());
    let session_task = tokio::spawn(session.run(event_rx));

    let mut simulator = SimulatedTranscripts::new();
    let mut frames: u64 = 0;
    let mut bytes: u64 = 0;

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Binary(data)) => {
                frames += 1;
                bytes += data.len() as u64;
                if frames <= 5 || frames % 25 == 0 {
                    debug!(client_id, frames, bytes, "audio frames received");
                }

                match &adapter {
                    Some(adapter) => adapter.send(&data),
                    None => {
                        // degraded mode: audio is discarded, canned phrases
                        // occasionally stand in for transcription
                        if let Some(phrase) = simulator.maybe_phrase() {
                            debug!(client_id, phrase, "simulated transcript");
                            send_json(
                                &sender,
                                &json!({
                                    "type": "transcript",
                                    "text": phrase,
                                    "is_final": true,
                                }),
                            )
                            .await;
                        }
                    }
                }
            }
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientCommand>(&text) {
                Ok(command) => {
                    if event_tx.send(SessionEvent::Command(command)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(client_id, %e, "malformed client message dropped");
                }
            },
            Ok(Message::Ping(data)) => {
                let mut guard = sender.lock().await;
                let _ = guard.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) => break,
            Err(e) => {
                warn!(client_id, %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    // Flush the in-progress utterance before tearing the session down.
    let _ = event_tx.send(SessionEvent::Shutdown).await;
    drop(event_tx);

    if let Some(adapter) = &adapter {
        adapter.close().await;
    }
    let _ = session_task.await;

    state.connections.fetch_sub(1, Ordering::SeqCst);
    info!(client_id, frames, bytes, "client disconnected");
}
