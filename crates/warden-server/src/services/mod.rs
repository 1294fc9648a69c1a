//! Per-entity orchestration: validate, re-read context inside the
//! transaction, conflict-check, update the ledger, persist, notify agents.
//! The notify step runs before commit so a dispatch failure drops the
//! transaction and rolls the store back.

pub mod admit;
pub mod client_class;
pub mod node;
pub mod pd_pool;
pub mod pool4;
pub mod pool6;
pub mod reservation4;
pub mod reservation6;
pub mod reserved_pd_pool;
pub mod reserved_pool4;
pub mod reserved_pool6;
pub mod shared_network;
pub mod subnet4;
pub mod subnet6;

#[cfg(test)]
mod tests;

use serde::Serialize;

use warden_common::models::Node;

use crate::agent::{dispatch_with_rollback, AgentCommand, AgentCommandKind, Compensation};
use crate::AppState;

/// Build and dispatch a command, with the inverse command as compensation
/// where one exists.
pub(crate) async fn notify<T: Serialize>(
    state: &AppState,
    targets: &[Node],
    kind: AgentCommandKind,
    body: &T,
) -> anyhow::Result<()> {
    let command = AgentCommand::new(kind, payload(body));
    let compensation = Compensation::inverse_of(&command);
    dispatch_with_rollback(
        state.agents.as_ref(),
        targets,
        &command,
        compensation.as_ref(),
    )
    .await
}

pub(crate) fn payload<T: Serialize>(body: &T) -> serde_json::Value {
    serde_json::to_value(body).unwrap_or(serde_json::Value::Null)
}

/// Publish an SSE mutation event, e.g. `pool4_created:<id>`.
pub(crate) fn publish(state: &AppState, event: &str, id: impl std::fmt::Display) {
    state.events.send(format!("{}:{}", event, id));
}
