use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

mod app;
mod http;
mod ws;

#[derive(Parser, Debug)]
#[command(name = "formpulse-gateway", version, about = "Live analytics broadcast gateway")]
struct Args {
    /// Path to formpulse.toml (falls back to FORMPULSE_CONFIG, then ~/.formpulse/formpulse.toml).
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "formpulse_gateway=info,formpulse_hub=info,tower_http=debug".into()
            }),
        )
        .init();

    let args = Args::parse();

    // load config: --config > FORMPULSE_CONFIG env > ~/.formpulse/formpulse.toml
    let config_path = args.config.or_else(|| std::env::var("FORMPULSE_CONFIG").ok());
    let config = formpulse_core::config::FormpulseConfig::load(config_path.as_deref())
        .unwrap_or_else(|e| {
            tracing::warn!("Config load failed ({}), using defaults", e);
            formpulse_core::config::FormpulseConfig::default()
        });

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;

    let hub = formpulse_hub::Hub::spawn(config.hub.clone())?;
    let state = Arc::new(app::AppState::new(config, hub.clone()));
    let router = app::build_router(state);

    info!("Formpulse gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(hub))
        .await?;

    info!("gateway stopped");
    Ok(())
}

/// Wait for Ctrl-C, then stop the hub so every client gets a close frame.
async fn shutdown_signal(hub: formpulse_hub::Hub) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
    hub.shutdown();
}
