use tracing_subscriber::EnvFilter;

use blastgrid_engine::config::GameRules;
use blastgrid_server::config::ServerConfig;
use blastgrid_server::{build_app, spawn_state_sweeper};

#[tokio::main]
async fn main() {
    let json_logs = std::env::var("BLASTGRID_LOG_JSON").is_ok_and(|v| v == "1");
    if json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .init();
    }

    let config = ServerConfig::load();
    config.validate();
    let rules = GameRules::load();
    let listen_addr = config.listen_addr.clone();

    let (app, state) = build_app(config, rules);
    spawn_state_sweeper(state);

    let listener = match tokio::net::TcpListener::bind(&listen_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(addr = %listen_addr, error = %e, "Failed to bind");
            std::process::exit(1);
        },
    };
    tracing::info!(addr = %listen_addr, "Blastgrid server listening");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Server error");
    }
}
