//! presence-relay - counts recent accesses, relays them to a webhook, and shows
//! the live count as a Discord channel name.
//!
//! Usage:
//!   presence-relay --token <TOKEN> --webhook-url <URL> --channel-id <ID> [--port 10000]
//!
//! Every flag can also be set through the environment (see `--help`).

use clap::Parser;
use presence_relay::config::Config;
use presence_relay::display::{DiscordChannel, DisplaySurface, DEFAULT_DISPLAY_TIMEOUT};
use presence_relay::http_server;
use presence_relay::reconciler::Reconciler;
use presence_relay::relay::WebhookRelay;
use presence_relay::state::{AccessRegistry, AppState};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is normal outside local development.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();

    let registry = Arc::new(AccessRegistry::with_ttl_minutes(config.ttl_minutes));
    let relay = Arc::new(WebhookRelay::new(
        config.webhook_url.clone(),
        config.relay_timeout(),
        config.relay_max_in_flight(),
    )?);
    let surface: Arc<dyn DisplaySurface> = Arc::new(DiscordChannel::new(
        &config.token,
        config.channel_id,
        config.discord_api_base.clone(),
        DEFAULT_DISPLAY_TIMEOUT,
    )?);

    info!(
        channel_id = config.channel_id.get(),
        ttl_minutes = config.ttl_minutes,
        webhook_host = relay.endpoint().host_str().unwrap_or("-"),
        "Starting presence relay"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let reconciler = Reconciler::new(registry.clone(), surface, config.reconcile_interval());
    let reconciler_handle = tokio::spawn(reconciler.run(shutdown_rx));

    let state = AppState::new(registry, relay);
    http_server::run_server(config.port, state, shutdown_signal()).await?;

    let _ = shutdown_tx.send(true);
    let _ = reconciler_handle.await;
    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
