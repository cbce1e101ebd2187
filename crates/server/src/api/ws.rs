//! WebSocket progress streaming.
//!
//! One socket observes one job: the current snapshot is delivered on
//! connect, then one message per transition. The stream closes naturally
//! once a terminal snapshot has been sent, or immediately with code 4404
//! when the job id is unknown.

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_SNAPSHOTS_SENT};
use crate::state::AppState;

/// Close code for a subscription on an unknown job id.
const CLOSE_UNKNOWN_JOB: u16 = 4404;

/// WebSocket upgrade handler.
pub async fn progress_ws(
    ws: WebSocketUpgrade,
    Path(job_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, job_id))
}

/// Handle a single progress connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, job_id: String) {
    let (mut sender, mut receiver) = socket.split();

    let mut subscription = match state.orchestrator().subscribe(&job_id).await {
        Ok(subscription) => subscription,
        Err(_) => {
            let payload = json!({"status": "error", "error": "Job not found"});
            let _ = sender.send(Message::Text(payload.to_string().into())).await;
            let _ = sender
                .send(Message::Close(Some(CloseFrame {
                    code: CLOSE_UNKNOWN_JOB,
                    reason: "job not found".into(),
                })))
                .await;
            return;
        }
    };

    WS_CONNECTIONS_TOTAL.inc();
    WS_CONNECTIONS_ACTIVE.inc();
    debug!(job_id, "progress subscriber connected");

    loop {
        tokio::select! {
            update = subscription.receiver.recv() => {
                match update {
                    Some(snapshot) => {
                        let terminal = snapshot.status.is_terminal();
                        match serde_json::to_string(&snapshot) {
                            Ok(payload) => {
                                if sender.send(Message::Text(payload.into())).await.is_err() {
                                    debug!(job_id, "progress send failed, client disconnected");
                                    break;
                                }
                                WS_SNAPSHOTS_SENT.inc();
                            }
                            Err(e) => {
                                warn!(job_id, error = %e, "failed to serialize snapshot");
                            }
                        }
                        if terminal {
                            let _ = sender.send(Message::Close(None)).await;
                            break;
                        }
                    }
                    // Channel gone; nothing more will arrive.
                    None => break,
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(job_id, "progress client closed connection");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Clients are not expected to send anything.
                    }
                    Some(Err(e)) => {
                        debug!(job_id, error = %e, "progress receive error");
                        break;
                    }
                }
            }
        }
    }

    state
        .orchestrator()
        .unsubscribe(&job_id, subscription.id)
        .await;
    WS_CONNECTIONS_ACTIVE.dec();
    debug!(job_id, "progress subscriber disconnected");
}
