//! Shared fixtures: in-memory store, mock agent channel, pre-registered node.

use std::sync::Arc;

use chrono::Utc;

use warden_common::models::{Node, NodeRole};

use crate::agent::{MockAgentChannel, NodeRegistry};
use crate::event_manager::EventManager;
use crate::{db, AppState};

pub fn test_node(id: &str) -> Node {
    Node {
        id: id.to_string(),
        endpoint: format!("http://{}:8899", id),
        roles: vec![
            NodeRole::Sentry4,
            NodeRole::Server4,
            NodeRole::Sentry6,
            NodeRole::Server6,
        ],
        virtual_ip: None,
        registered_at: Utc::now(),
    }
}

/// AppState backed by an in-memory database and a recording agent channel,
/// with a single dual-role node registered as "node-a".
pub async fn test_state() -> (AppState, Arc<MockAgentChannel>) {
    let pool = db::init_db(":memory:").await.expect("in-memory db");
    let channel = Arc::new(MockAgentChannel::new());
    let nodes = Arc::new(NodeRegistry::new());
    nodes.upsert(test_node("node-a"));
    let state = AppState {
        db: pool,
        agents: channel.clone(),
        nodes,
        events: EventManager::new(),
    };
    (state, channel)
}
