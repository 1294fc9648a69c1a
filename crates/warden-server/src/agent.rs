//! Remote agent command dispatch.
//!
//! Every persisted mutation fans out a typed command to the subnet's assigned
//! agent nodes, in order, synchronously per node. Delivery is not part of the
//! store transaction: a failed send aborts the enclosing transaction, and the
//! nodes that already applied the command get a best-effort compensating
//! inverse command. Compensation sub-errors are logged, never escalated; the
//! primary error is already on its way to the caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;
use tracing::{info, warn};

use ipnet::Ipv6Net;
use warden_common::models::{Node, NodeRole};

/// Command kinds understood by the remote agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentCommandKind {
    CreateSubnet4,
    UpdateSubnet4,
    DeleteSubnet4,
    CreateSubnet6,
    UpdateSubnet6,
    DeleteSubnet6,
    CreatePool4,
    DeletePool4,
    CreatePool6,
    DeletePool6,
    CreateReservedPool4,
    DeleteReservedPool4,
    CreateReservedPool6,
    DeleteReservedPool6,
    CreateReservation4,
    DeleteReservation4,
    CreateReservation6,
    DeleteReservation6,
    CreatePdPool,
    DeletePdPool,
    CreateReservedPdPool,
    DeleteReservedPdPool,
    CreateClientClass,
    UpdateClientClass,
    DeleteClientClass,
    UpdateAdmitList,
    UpdateRateLimitList,
}

impl AgentCommandKind {
    /// The compensating command for a create; deletes have no inverse (the
    /// row is gone, there is nothing to restore on a node that applied it
    /// before a later node failed — re-creation is a manual reconciliation).
    pub fn inverse(self) -> Option<AgentCommandKind> {
        use AgentCommandKind::*;
        match self {
            CreateSubnet4 => Some(DeleteSubnet4),
            CreateSubnet6 => Some(DeleteSubnet6),
            CreatePool4 => Some(DeletePool4),
            CreatePool6 => Some(DeletePool6),
            CreateReservedPool4 => Some(DeleteReservedPool4),
            CreateReservedPool6 => Some(DeleteReservedPool6),
            CreateReservation4 => Some(DeleteReservation4),
            CreateReservation6 => Some(DeleteReservation6),
            CreatePdPool => Some(DeletePdPool),
            CreateReservedPdPool => Some(DeleteReservedPdPool),
            CreateClientClass => Some(DeleteClientClass),
            _ => None,
        }
    }
}

/// A typed command plus its JSON payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentCommand {
    pub kind: AgentCommandKind,
    pub payload: serde_json::Value,
}

impl AgentCommand {
    pub fn new(kind: AgentCommandKind, payload: serde_json::Value) -> Self {
        Self { kind, payload }
    }
}

/// Explicit compensation record: the undo command the dispatcher sends to
/// nodes that applied a command before a later node failed.
#[derive(Debug, Clone)]
pub struct Compensation {
    pub command: AgentCommand,
}

impl Compensation {
    /// Derive the compensation for a create command: the inverse kind with
    /// the same payload (agents key deletes on the embedded entity id).
    pub fn inverse_of(command: &AgentCommand) -> Option<Self> {
        command.kind.inverse().map(|kind| Self {
            command: AgentCommand::new(kind, command.payload.clone()),
        })
    }
}

/// Scope of a live-lease count query, the delete precondition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum LeaseScope {
    Subnet4 { subnet_id: u64 },
    Pool4 { subnet_id: u64, begin: Ipv4Addr, end: Ipv4Addr },
    Reservation4 { subnet_id: u64, ip: Ipv4Addr },
    Subnet6 { subnet_id: u64 },
    Pool6 { subnet_id: u64, begin: Ipv6Addr, end: Ipv6Addr },
    Reservation6 { subnet_id: u64 },
    PdPool { subnet_id: u64, prefix: Ipv6Net },
}

/// Transport to the remote agents. One send per node; ordering within a node
/// is the call order.
#[async_trait]
pub trait AgentChannel: Send + Sync {
    async fn send(&self, node: &Node, command: &AgentCommand) -> anyhow::Result<()>;

    /// Live leases currently allocated within `scope`. The first reachable
    /// node answers for the deployment.
    async fn lease_count(&self, nodes: &[Node], scope: &LeaseScope) -> anyhow::Result<u64>;
}

/// Send `command` to `targets` in order. On the first per-node failure, stop,
/// send the compensation (if any) to the nodes that already succeeded, and
/// return the original error.
pub async fn dispatch_with_rollback(
    channel: &dyn AgentChannel,
    targets: &[Node],
    command: &AgentCommand,
    compensation: Option<&Compensation>,
) -> anyhow::Result<()> {
    let mut succeeded: Vec<&Node> = Vec::new();
    for node in targets {
        match channel.send(node, command).await {
            Ok(()) => succeeded.push(node),
            Err(e) => {
                warn!(
                    "Command {:?} failed at node {} after {} nodes succeeded: {}",
                    command.kind,
                    node.id,
                    succeeded.len(),
                    e
                );
                if let Some(comp) = compensation {
                    for done in &succeeded {
                        if let Err(undo_err) = channel.send(done, &comp.command).await {
                            // Logged only: the primary error is already being
                            // returned and there is no further recovery step.
                            warn!(
                                "Compensating {:?} failed at node {}: {}",
                                comp.command.kind, done.id, undo_err
                            );
                        }
                    }
                }
                return Err(e);
            }
        }
    }
    Ok(())
}

/// HTTP transport posting commands to each node's endpoint.
pub struct HttpAgentChannel {
    client: reqwest::Client,
}

impl HttpAgentChannel {
    pub fn new(timeout_secs: u64) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { client })
    }
}

#[derive(Deserialize)]
struct LeaseCountResponse {
    count: u64,
}

#[async_trait]
impl AgentChannel for HttpAgentChannel {
    async fn send(&self, node: &Node, command: &AgentCommand) -> anyhow::Result<()> {
        let url = format!("{}/commands", node.endpoint.trim_end_matches('/'));
        let response = self.client.post(&url).json(command).send().await?;
        if !response.status().is_success() {
            anyhow::bail!(
                "node {} rejected {:?}: status {}",
                node.id,
                command.kind,
                response.status()
            );
        }
        Ok(())
    }

    async fn lease_count(&self, nodes: &[Node], scope: &LeaseScope) -> anyhow::Result<u64> {
        let mut last_err = anyhow::anyhow!("no nodes available for lease count");
        for node in nodes {
            let url = format!("{}/leases/count", node.endpoint.trim_end_matches('/'));
            match self.client.post(&url).json(scope).send().await {
                Ok(response) if response.status().is_success() => {
                    let body: LeaseCountResponse = response.json().await?;
                    return Ok(body.count);
                }
                Ok(response) => {
                    last_err =
                        anyhow::anyhow!("node {} returned status {}", node.id, response.status());
                }
                Err(e) => last_err = e.into(),
            }
        }
        Err(last_err)
    }
}

/// In-process channel for tests: records every send, fails configured nodes,
/// and serves configured lease counts.
#[cfg(test)]
#[derive(Default)]
pub struct MockAgentChannel {
    sent: std::sync::Mutex<Vec<(String, AgentCommand)>>,
    failures: std::sync::Mutex<Vec<(String, Option<AgentCommandKind>)>>,
    lease_count: std::sync::Mutex<u64>,
}

#[cfg(test)]
impl MockAgentChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every send to `node_id`.
    pub fn fail_node(&self, node_id: &str) {
        self.failures.lock().unwrap().push((node_id.to_string(), None));
    }

    /// Fail only sends of `kind` to `node_id`.
    pub fn fail_command(&self, node_id: &str, kind: AgentCommandKind) {
        self.failures
            .lock()
            .unwrap()
            .push((node_id.to_string(), Some(kind)));
    }

    pub fn set_lease_count(&self, count: u64) {
        *self.lease_count.lock().unwrap() = count;
    }

    pub fn sent(&self) -> Vec<(String, AgentCommand)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_kinds(&self) -> Vec<(String, AgentCommandKind)> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(node, cmd)| (node.clone(), cmd.kind))
            .collect()
    }
}

#[cfg(test)]
#[async_trait]
impl AgentChannel for MockAgentChannel {
    async fn send(&self, node: &Node, command: &AgentCommand) -> anyhow::Result<()> {
        let blocked = self
            .failures
            .lock()
            .unwrap()
            .iter()
            .any(|(id, kind)| *id == node.id && kind.map_or(true, |k| k == command.kind));
        if blocked {
            anyhow::bail!("node {} unreachable", node.id);
        }
        self.sent
            .lock()
            .unwrap()
            .push((node.id.clone(), command.clone()));
        Ok(())
    }

    async fn lease_count(&self, _nodes: &[Node], _scope: &LeaseScope) -> anyhow::Result<u64> {
        Ok(*self.lease_count.lock().unwrap())
    }
}

/// In-memory view of the registered agent nodes, loaded from the store at
/// startup and refreshed on node registration. Shared read-mostly state.
#[derive(Default)]
pub struct NodeRegistry {
    inner: std::sync::RwLock<HashMap<String, Node>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&self, nodes: Vec<Node>) {
        let mut map = self.inner.write().expect("node registry poisoned");
        map.clear();
        for node in nodes {
            map.insert(node.id.clone(), node);
        }
    }

    pub fn upsert(&self, node: Node) {
        self.inner
            .write()
            .expect("node registry poisoned")
            .insert(node.id.clone(), node);
    }

    pub fn remove(&self, id: &str) {
        self.inner.write().expect("node registry poisoned").remove(id);
    }

    pub fn all(&self) -> Vec<Node> {
        let mut nodes: Vec<Node> = self
            .inner
            .read()
            .expect("node registry poisoned")
            .values()
            .cloned()
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }

    /// Resolve a subnet's assigned node ids to dispatch targets. Nodes
    /// sharing a virtual IP form an HA group; the group collapses to a single
    /// target so the command is applied once behind the VIP.
    pub fn targets_for(&self, assigned: &[String]) -> Vec<Node> {
        let map = self.inner.read().expect("node registry poisoned");
        let mut targets: Vec<Node> = Vec::new();
        let mut seen_vips: std::collections::HashSet<String> = std::collections::HashSet::new();
        for id in assigned {
            let Some(node) = map.get(id) else {
                info!("Assigned node {} is not registered, skipping", id);
                continue;
            };
            match &node.virtual_ip {
                Some(vip) => {
                    if seen_vips.insert(vip.clone()) {
                        targets.push(node.clone());
                    }
                }
                None => targets.push(node.clone()),
            }
        }
        targets
    }

    /// Targets for dual-stack global commands: every sentry and server node
    /// of both families, VIP groups collapsed.
    pub fn dual_stack_targets(&self) -> Vec<Node> {
        let ids: Vec<String> = self
            .all()
            .into_iter()
            .filter(|n| {
                n.has_role(NodeRole::Sentry4)
                    || n.has_role(NodeRole::Server4)
                    || n.has_role(NodeRole::Sentry6)
                    || n.has_role(NodeRole::Server6)
            })
            .map(|n| n.id)
            .collect();
        self.targets_for(&ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn node(id: &str, roles: Vec<NodeRole>, vip: Option<&str>) -> Node {
        Node {
            id: id.to_string(),
            endpoint: format!("http://{}:8899", id),
            roles,
            virtual_ip: vip.map(str::to_string),
            registered_at: Utc::now(),
        }
    }

    #[test]
    fn test_inverse_kinds() {
        assert_eq!(
            AgentCommandKind::CreatePool4.inverse(),
            Some(AgentCommandKind::DeletePool4)
        );
        assert_eq!(AgentCommandKind::DeletePool4.inverse(), None);
        assert_eq!(AgentCommandKind::UpdateAdmitList.inverse(), None);
    }

    #[test]
    fn test_registry_vip_collapse() {
        let registry = NodeRegistry::new();
        registry.upsert(node("a", vec![NodeRole::Sentry4], Some("10.0.0.254")));
        registry.upsert(node("b", vec![NodeRole::Sentry4], Some("10.0.0.254")));
        registry.upsert(node("c", vec![NodeRole::Server4], None));

        let targets = registry.targets_for(&[
            "a".to_string(),
            "b".to_string(),
            "c".to_string(),
        ]);
        assert_eq!(targets.len(), 2);
        assert!(targets.iter().any(|n| n.id == "c"));
        // Exactly one of the HA pair survives.
        assert_eq!(
            targets.iter().filter(|n| n.virtual_ip.is_some()).count(),
            1
        );
    }

    #[test]
    fn test_registry_skips_unregistered() {
        let registry = NodeRegistry::new();
        registry.upsert(node("a", vec![NodeRole::Sentry4], None));
        let targets = registry.targets_for(&["a".to_string(), "ghost".to_string()]);
        assert_eq!(targets.len(), 1);
    }

    #[test]
    fn test_dual_stack_targets_union() {
        let registry = NodeRegistry::new();
        registry.upsert(node("s4", vec![NodeRole::Sentry4], None));
        registry.upsert(node("s6", vec![NodeRole::Server6], None));
        registry.upsert(node("idle", vec![], None));
        let targets = registry.dual_stack_targets();
        assert_eq!(targets.len(), 2);
        assert!(!targets.iter().any(|n| n.id == "idle"));
    }

    #[tokio::test]
    async fn test_dispatch_all_nodes_in_order() {
        let channel = MockAgentChannel::new();
        let targets = vec![node("a", vec![], None), node("b", vec![], None)];
        let cmd = AgentCommand::new(AgentCommandKind::CreatePool4, serde_json::json!({"id": "x"}));
        dispatch_with_rollback(&channel, &targets, &cmd, None)
            .await
            .unwrap();
        let sent = channel.sent_kinds();
        assert_eq!(
            sent,
            vec![
                ("a".to_string(), AgentCommandKind::CreatePool4),
                ("b".to_string(), AgentCommandKind::CreatePool4),
            ]
        );
    }

    #[tokio::test]
    async fn test_dispatch_partial_failure_compensates_succeeded_nodes() {
        let channel = MockAgentChannel::new();
        channel.fail_node("b");
        let targets = vec![
            node("a", vec![], None),
            node("b", vec![], None),
            node("c", vec![], None),
        ];
        let cmd = AgentCommand::new(AgentCommandKind::CreatePool4, serde_json::json!({"id": "x"}));
        let comp = Compensation::inverse_of(&cmd).unwrap();

        let result = dispatch_with_rollback(&channel, &targets, &cmd, Some(&comp)).await;
        assert!(result.is_err());

        let sent = channel.sent_kinds();
        // a got the create, then the compensating delete; c never got anything.
        assert_eq!(
            sent,
            vec![
                ("a".to_string(), AgentCommandKind::CreatePool4),
                ("a".to_string(), AgentCommandKind::DeletePool4),
            ]
        );
    }

    #[tokio::test]
    async fn test_compensation_failure_is_swallowed() {
        let channel = MockAgentChannel::new();
        channel.fail_node("b");
        // "a" accepts the create but refuses the compensating delete.
        channel.fail_command("a", AgentCommandKind::DeletePool4);
        let targets = vec![node("a", vec![], None), node("b", vec![], None)];
        let cmd = AgentCommand::new(AgentCommandKind::CreatePool4, serde_json::json!({"id": "x"}));
        let comp = Compensation::inverse_of(&cmd).unwrap();

        let result = dispatch_with_rollback(&channel, &targets, &cmd, Some(&comp)).await;
        // The primary error from "b" comes back despite the failed undo.
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("node b unreachable"));
        assert_eq!(
            channel.sent_kinds(),
            vec![("a".to_string(), AgentCommandKind::CreatePool4)]
        );
    }
}
