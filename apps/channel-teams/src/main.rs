use std::sync::Arc;

use anyhow::{Context, Result};
use axum::serve;
use tb_channel_teams::{AppState, ClientRegistry, ServiceConfig, register_outgoing, router};
use tb_core::{MiddlewareChain, NoopBus, SharedBus};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tb_telemetry::install("channel-teams")?;

    let config = ServiceConfig::from_env()?;
    let store = tb_session::store_from_env().await?;
    let chain = Arc::new(MiddlewareChain::new());
    let clients = ClientRegistry::new();
    let order = register_outgoing(&chain, clients.clone())?;
    info!(order, "teams outgoing middleware registered");

    let bus = connect_bus(&config, Arc::clone(&chain)).await?;
    for bot in config.bots.iter().cloned() {
        let bot_id = bot.bot_id.clone();
        clients
            .mount_bot(bot, store.clone(), bus.clone())
            .with_context(|| format!("failed to mount teams channel for bot {bot_id}"))?;
    }
    if clients.is_empty() {
        warn!("no enabled bots configured; every inbound request will be rejected");
    }

    let app = router(AppState::new(clients));
    let listener = TcpListener::bind(config.addr).await?;
    info!("channel-teams listening on {}", config.addr);

    serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    Ok(())
}

#[cfg(feature = "nats")]
async fn connect_bus(config: &ServiceConfig, chain: Arc<MiddlewareChain>) -> Result<SharedBus> {
    use tb_channel_teams::nats::{NatsEventBus, run_outgoing_loop};

    let Some(url) = config.nats_url.as_deref() else {
        warn!("NATS_URL not set; incoming events are dropped and no outgoing events are consumed");
        return Ok(Arc::new(NoopBus));
    };
    let client = async_nats::connect(url)
        .await
        .with_context(|| format!("failed to connect to NATS at {url}"))?;
    info!(%url, prefix = %config.subject_prefix, "connected to NATS");

    let consumer = client.clone();
    let prefix = config.subject_prefix.clone();
    tokio::spawn(async move {
        if let Err(err) = run_outgoing_loop(consumer, prefix, chain).await {
            tracing::error!(error = %err, "outgoing event loop stopped");
        }
    });
    Ok(Arc::new(NatsEventBus::new(client, config.subject_prefix.clone())))
}

#[cfg(not(feature = "nats"))]
async fn connect_bus(_config: &ServiceConfig, _chain: Arc<MiddlewareChain>) -> Result<SharedBus> {
    warn!("built without nats; incoming events are dropped");
    Ok(Arc::new(NoopBus))
}
