// Main binary that starts the management-plane server.
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};

use warden_server::{run, ServerConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Warden DHCP management plane", long_about = None)]
struct Cli {
    /// Path to a TOML config file. Flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address the REST API listens on.
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// SQLite database path. Use ":memory:" for an ephemeral store.
    #[arg(long)]
    database: Option<String>,

    /// Timeout for per-node agent command posts, in seconds.
    #[arg(long)]
    agent_timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    registry().with(filter).with(fmt::layer()).init();

    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::new(),
    };
    if let Some(listen) = cli.listen {
        config = config.with_listen(listen);
    }
    if let Some(database) = cli.database {
        config = config.with_database_path(database);
    }
    if let Some(secs) = cli.agent_timeout {
        config = config.with_agent_timeout_secs(secs);
    }

    info!(listen = %config.listen, database = %config.database_path, "starting warden");
    run(config).await
}
