use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use events::EventEnvelope;
use futures::stream::{self, StreamExt};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::error::{AppError, ErrorResponse};
use crate::state::AppState;

pub const SSE_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

fn parse_last_event_id(headers: &HeaderMap) -> Option<u64> {
    headers
        .get("Last-Event-ID")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}

fn envelope_to_sse_event(envelope: &EventEnvelope) -> Result<Event, Infallible> {
    let data = serde_json::to_string(envelope).unwrap_or_else(|_| "{}".to_string());

    Ok(Event::default()
        .id(envelope.sequence.to_string())
        .event(envelope.event.kind())
        .data(data))
}

fn lagged_sse_event(missed: u64) -> Result<Event, Infallible> {
    Ok(Event::default()
        .event("lagged")
        .data(format!("{{\"missed\":{}}}", missed)))
}

#[utoipa::path(
    get,
    path = "/api/projects/{id}/events",
    params(
        ("id" = Uuid, Path, description = "Project ID"),
        ("Last-Event-ID" = Option<u64>, Header, description = "Sequence of the last event the client saw"),
    ),
    responses(
        (status = 200, description = "SSE stream: recorded events of the current run, then live events"),
        (status = 404, description = "Project not found", body = ErrorResponse),
    ),
    tag = "events"
)]
pub async fn project_events(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    state.service.get_project(id).await?;
    let last_seen = parse_last_event_id(&headers).unwrap_or(0);

    let (history, rx) = state.event_bus.history_plus_stream(id);
    let replay: Vec<EventEnvelope> = history
        .into_iter()
        .filter(|envelope| envelope.sequence > last_seen)
        .collect();
    let replayed_up_to = replay
        .last()
        .map(|envelope| envelope.sequence)
        .unwrap_or(last_seen);

    let replay_stream = stream::iter(replay.into_iter().map(|e| envelope_to_sse_event(&e)));

    let live_stream = BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(envelope) => {
                if envelope.event.is_heartbeat() || envelope.sequence <= replayed_up_to {
                    return None;
                }
                Some(envelope_to_sse_event(&envelope))
            }
            Err(BroadcastStreamRecvError::Lagged(missed)) => {
                tracing::warn!(project_id = %id, missed, "SSE client lagged");
                Some(lagged_sse_event(missed))
            }
        }
    });

    Ok(Sse::new(replay_stream.chain(live_stream)).keep_alive(
        KeepAlive::new()
            .interval(SSE_KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    ))
}
