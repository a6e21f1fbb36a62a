//! Crowd Quest Server
//!
//! Binary entry point: wires the coordinator, gateway, and WebSocket server
//! together and runs until interrupted.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crowd_quest::{
    BroadcastGateway, CoordinatorConfig, GameServer, ServerConfig, VoteCoordinator, VERSION,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Crowd Quest Server v{VERSION}");

    let server_config = ServerConfig {
        bind_addr: std::env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .context("invalid BIND_ADDR")?,
        ..ServerConfig::default()
    };

    let gateway = BroadcastGateway::default();
    let (coordinator, handle) =
        VoteCoordinator::new(CoordinatorConfig::default(), gateway.clone());
    tokio::spawn(coordinator.run());

    let server = GameServer::new(server_config, handle, gateway);
    server.run().await.context("server failed")?;
    Ok(())
}
