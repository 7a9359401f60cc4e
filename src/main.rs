use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use en_passant::chat::OutboundChat;
use en_passant::config::Config;
use en_passant::helix::HelixClient;
use en_passant::server::{AppState, build_router};
use en_passant::store::{KeyValueStore, MemoryStore, RestStore};
use en_passant::vote::{ChannelAlarm, run_vote_closer};

/// Pending vote alarms; one window runs at a time, so this is generous.
const ALARM_CHANNEL_CAPACITY: usize = 16;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "en_passant=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("invalid configuration")?;

    let helix = config
        .helix
        .clone()
        .map(HelixClient::new)
        .transpose()
        .context("failed to build platform API client")?;

    match (&helix, &config.callback_url) {
        (Some(client), Some(callback)) => {
            match client
                .ensure_subscriptions(callback, &config.eventsub_secret)
                .await
            {
                Ok(created) => info!(created, "EventSub subscriptions checked"),
                Err(e) => warn!(error = %e, "Could not check EventSub subscriptions"),
            }
        }
        (None, _) => warn!("Platform credentials not set, chat replies will only be logged"),
        (Some(_), None) => info!("EVENTSUB_CALLBACK_URL not set, not managing subscriptions"),
    }
    let chat = OutboundChat::new(helix);

    match &config.store {
        Some(store_config) => {
            let store = RestStore::new(store_config.url.clone(), store_config.auth.clone())
                .context("failed to build store client")?;
            serve(config, store, chat).await
        }
        None => {
            warn!("STORE_URL not set, using in-process store; queue and votes are lost on restart");
            serve(config, MemoryStore::new(), chat).await
        }
    }
}

async fn serve<S>(config: Config, store: S, chat: OutboundChat) -> anyhow::Result<()>
where
    S: KeyValueStore + 'static,
{
    let store = Arc::new(store);
    let chat = Arc::new(chat);
    let shutdown = CancellationToken::new();

    let (alarm, alarms) = ChannelAlarm::channel(ALARM_CHANNEL_CAPACITY);
    let closer = tokio::spawn(run_vote_closer(
        store.clone(),
        chat.clone(),
        config.lock,
        alarms,
        shutdown.clone(),
    ));

    let app = build_router(AppState::new(&config, store, chat, alarm));

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!("listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    shutdown.cancel();
    closer.await.context("vote closer panicked")?;
    info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
