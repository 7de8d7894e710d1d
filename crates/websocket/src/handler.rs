use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tokio::time::{interval_at, Instant};
use uuid::Uuid;

use events::{EventBus, EventEnvelope};

use crate::messages::{ClientMessage, ServerMessage};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct WsState {
    pub event_bus: EventBus,
    pub heartbeat_interval: Duration,
}

impl WsState {
    pub fn new(event_bus: EventBus) -> Self {
        Self {
            event_bus,
            heartbeat_interval: HEARTBEAT_INTERVAL,
        }
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(project_id): Path<Uuid>,
    State(state): State<Arc<WsState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, project_id, state))
}

/// Events already folded into the snapshot the client holds are skipped.
fn is_newer(envelope: &EventEnvelope, last_sequence: u64) -> bool {
    envelope.sequence > last_sequence
}

async fn send(sender: &mut SplitSink<WebSocket, Message>, msg: &ServerMessage) -> bool {
    let json = match msg.to_json() {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode websocket message");
            return true;
        }
    };
    sender.send(Message::Text(json.into())).await.is_ok()
}

async fn handle_socket(socket: WebSocket, project_id: Uuid, state: Arc<WsState>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before reading the snapshot so nothing falls between them.
    let mut event_rx = state.event_bus.subscribe(project_id);
    let record = state.event_bus.snapshot(project_id);
    let mut last_sequence = record.as_ref().map(|r| r.last_sequence).unwrap_or(0);
    if !send(&mut sender, &ServerMessage::Snapshot { record }).await {
        return;
    }
    tracing::debug!(project_id = %project_id, "WebSocket client connected");

    let period = state.heartbeat_interval;
    let mut heartbeat = interval_at(Instant::now() + period, period);

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if !send(&mut sender, &ServerMessage::Heartbeat).await {
                    break;
                }
            }

            event_result = event_rx.recv() => {
                match event_result {
                    Ok(envelope) => {
                        if envelope.event.is_heartbeat() || !is_newer(&envelope, last_sequence) {
                            continue;
                        }
                        last_sequence = envelope.sequence;
                        if !send(&mut sender, &ServerMessage::Event { envelope }).await {
                            break;
                        }
                        heartbeat.reset();
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(project_id = %project_id, missed, "WebSocket client lagged");
                        if !send(&mut sender, &ServerMessage::Lagged { missed }).await {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::Ping) => ServerMessage::Pong,
                            Ok(ClientMessage::Snapshot) => {
                                let record = state.event_bus.snapshot(project_id);
                                if let Some(record) = &record {
                                    last_sequence = last_sequence.max(record.last_sequence);
                                }
                                ServerMessage::Snapshot { record }
                            }
                            Err(e) => ServerMessage::Error {
                                message: format!("Invalid message: {}", e),
                            },
                        };
                        if !send(&mut sender, &reply).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    tracing::debug!(project_id = %project_id, "WebSocket connection closed");
}
