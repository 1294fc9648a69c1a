//! Server configuration.

use std::net::SocketAddr;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use warden_common::models::Node;

/// Configuration for the management-plane server. Loadable from a TOML file;
/// every field has a default so a partial file is fine.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the REST API listens on.
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// SQLite database path. ":memory:" for an ephemeral store.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Request timeout for per-node agent command posts, seconds.
    #[serde(default = "default_agent_timeout_secs")]
    pub agent_timeout_secs: u64,

    /// Agent nodes registered at startup, merged with any already in the
    /// store. Nodes can also register themselves through the API.
    #[serde(default)]
    pub nodes: Vec<Node>,
}

fn default_listen() -> SocketAddr {
    "0.0.0.0:3000".parse().expect("static addr")
}

fn default_database_path() -> String {
    "warden.db".to_string()
}

fn default_agent_timeout_secs() -> u64 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            database_path: default_database_path(),
            agent_timeout_secs: default_agent_timeout_secs(),
            nodes: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn with_listen(mut self, listen: SocketAddr) -> Self {
        self.listen = listen;
        self
    }

    pub fn with_database_path(mut self, path: impl Into<String>) -> Self {
        self.database_path = path.into();
        self
    }

    pub fn with_agent_timeout_secs(mut self, secs: u64) -> Self {
        self.agent_timeout_secs = secs;
        self
    }

    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_common::models::NodeRole;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.listen.port(), 3000);
        assert_eq!(config.database_path, "warden.db");
        assert_eq!(config.agent_timeout_secs, 10);
        assert!(config.nodes.is_empty());
    }

    #[test]
    fn test_builder() {
        let config = ServerConfig::new()
            .with_listen("127.0.0.1:8080".parse().unwrap())
            .with_database_path(":memory:")
            .with_agent_timeout_secs(3);
        assert_eq!(config.listen.port(), 8080);
        assert_eq!(config.database_path, ":memory:");
        assert_eq!(config.agent_timeout_secs, 3);
    }

    #[test]
    fn test_toml_with_node_seeds() {
        let config: ServerConfig = toml::from_str(
            r#"
            listen = "127.0.0.1:8443"

            [[nodes]]
            id = "edge-1"
            endpoint = "http://edge-1:8899"
            roles = ["sentry4", "server4"]
            "#,
        )
        .unwrap();
        assert_eq!(config.listen.port(), 8443);
        assert_eq!(config.database_path, "warden.db");
        assert_eq!(config.nodes.len(), 1);
        assert!(config.nodes[0].has_role(NodeRole::Sentry4));
    }
}
