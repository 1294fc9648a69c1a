use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::stream;
use futures::Stream;
use serde_json::json;

use warden_common::models::Node;

use crate::handlers::ApiResult;
use crate::services::node;
use crate::AppState;

pub async fn register_node(
    State(state): State<AppState>,
    Json(candidate): Json<Node>,
) -> ApiResult<(StatusCode, Json<Node>)> {
    Ok((
        StatusCode::CREATED,
        Json(node::register(&state, candidate).await?),
    ))
}

pub async fn list_nodes(State(state): State<AppState>) -> ApiResult<Json<Vec<Node>>> {
    Ok(Json(node::list(&state).await?))
}

pub async fn deregister_node(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    node::deregister(&state, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Mutation event stream. Events arrive as `type:id` strings from the
/// broadcast channel and go out as SSE events with a small JSON payload.
pub async fn subscribe(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let rx = state.events.subscribe();

    let stream = stream::unfold(rx, |mut rx| async move {
        match rx.recv().await {
            Ok(message) => {
                let (event_type, id) = match message.split_once(':') {
                    Some((t, id)) => (t.to_string(), Some(id.to_string())),
                    None => (message, None),
                };
                let data = json!({ "type": event_type, "id": id });
                let sse_event = Event::default().event(event_type).data(data.to_string());
                Some((Ok(sse_event), rx))
            }
            // Lagged or closed; end the stream and let the client reconnect.
            Err(_) => None,
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("ping"))
}
