mod attach;
mod config;

use anyhow::{Context, Result};
use attach::AttachHandler;
use config::Config;
use dotenv::dotenv;
use lines_rust_core::channel::RedisChannel;
use lines_rust_core::clients::LinesProviderClient;
use lines_rust_core::db::{create_pool, PgLineDatabase, SqlLineStore};
use lines_rust_core::poller::LinePoller;
use lines_rust_core::redis::{ReconnectConfig, ReconnectingPubSub, RedisBus};
use lines_rust_core::{DispatchConfig, Dispatcher, LineStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const STATS_INTERVAL: Duration = Duration::from_secs(60);
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(5);

fn log_stats(dispatcher: &Dispatcher, label: &str) {
    let stats = dispatcher.stats();
    info!(
        subscriptions = dispatcher.len(),
        ticks = stats.ticks,
        failed_ticks = stats.failed_ticks,
        deliveries = stats.deliveries,
        evictions = stats.evictions,
        "{}",
        label
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Line Distributor...");

    let config = Config::from_env()?;
    info!(
        dispatch_interval_ms = config.dispatch_interval.as_millis() as u64,
        send_timeout_ms = config.send_timeout.as_millis() as u64,
        default_sports = ?config.default_sports,
        "Configuration loaded"
    );

    let pool = create_pool(&config.database_url, &config.pool).await?;
    let database = PgLineDatabase::new(pool);
    database
        .ensure_schema()
        .await
        .context("Failed to prepare sport_lines schema")?;
    let store: Arc<dyn LineStore> = Arc::new(SqlLineStore::new(database));

    let bus = RedisBus::connect(&config.redis_url).await?;
    info!("Connected to Redis at {}", config.redis_url);

    let poller = match &config.lines_provider_url {
        Some(url) => {
            let client = LinesProviderClient::new(url.clone(), PROVIDER_TIMEOUT)?;
            let poller = LinePoller::start(
                client,
                store.clone(),
                &config.default_sports,
                config.provider_poll_interval,
            )?;
            info!(provider = %url, sports = poller.len(), "Provider poller started");
            Some(poller)
        }
        None => {
            warn!("LINES_PROVIDER_URL not set; lines must be stored by another writer");
            None
        }
    };

    let dispatcher = Arc::new(Dispatcher::new(
        store,
        DispatchConfig {
            default_sports: config.default_sports.clone(),
            send_timeout: config.send_timeout,
        },
    ));
    let dispatch_ticker = dispatcher.run(config.dispatch_interval)?;

    let requests = ReconnectingPubSub::subscribe(
        bus.clone(),
        vec![config.attach_channel.clone(), config.detach_channel.clone()],
        ReconnectConfig::from_env(),
    );
    let handler = AttachHandler::new(
        dispatcher.clone(),
        move |consumer: &str| RedisChannel::new(bus.clone(), consumer),
        config.attach_channel.clone(),
        config.detach_channel.clone(),
    );
    let listener = tokio::spawn(handler.listen(requests));
    info!(
        attach = %config.attach_channel,
        detach = %config.detach_channel,
        "Listening for subscription requests"
    );

    let stats_dispatcher = dispatcher.clone();
    let stats_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(STATS_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            log_stats(&stats_dispatcher, "Dispatch stats");
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    if let Some(poller) = &poller {
        poller.stop();
    }
    listener.abort();
    stats_task.abort();
    dispatch_ticker.shutdown().await;

    log_stats(&dispatcher, "Final dispatch stats");
    info!("Line Distributor stopped");
    Ok(())
}
