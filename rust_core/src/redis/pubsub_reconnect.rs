//! Redis pub/sub stream that survives connection loss.
//!
//! Reconnects with exponential backoff and jitter and resubscribes to the
//! same channels, so long-lived listeners never have to handle a dropped
//! connection themselves.

use futures_util::stream::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::bus::RedisBus;

/// Configuration for reconnection behavior
#[derive(Clone, Debug)]
pub struct ReconnectConfig {
    /// Base delay in milliseconds for exponential backoff
    pub base_delay_ms: u64,
    /// Maximum delay in milliseconds
    pub max_delay_ms: u64,
    /// Jitter fraction applied to each delay (0.1 = ±10%)
    pub jitter_pct: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            jitter_pct: 0.1,
        }
    }
}

impl ReconnectConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_delay_ms: std::env::var("REDIS_RECONNECT_BASE_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.base_delay_ms),
            max_delay_ms: std::env::var("REDIS_RECONNECT_MAX_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_delay_ms),
            jitter_pct: defaults.jitter_pct,
        }
    }

    /// Exponential backoff for the given 1-based attempt, capped and jittered
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponential_ms =
            self.base_delay_ms as f64 * 2f64.powi(attempt.saturating_sub(1).min(30) as i32);
        let capped_ms = exponential_ms.min(self.max_delay_ms as f64);

        let jitter_range = capped_ms * self.jitter_pct;
        let jitter = (rand::random::<f64>() * 2.0 - 1.0) * jitter_range;

        Duration::from_millis((capped_ms + jitter).max(0.0) as u64)
    }
}

#[derive(Debug, Default)]
pub struct ReconnectStats {
    pub connects: AtomicU64,
    pub failures: AtomicU64,
    pub consecutive_failures: AtomicU32,
}

impl ReconnectStats {
    fn record_connect(&self) {
        self.connects.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    fn record_failure(&self) -> u32 {
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// One message received on a subscribed channel.
#[derive(Debug, Clone)]
pub struct ChannelMessage {
    pub channel: String,
    pub payload: String,
}

/// Message stream over a set of channels, reconnecting on failure.
///
/// Dropping the stream stops the background connection task.
pub struct ReconnectingPubSub {
    receiver: mpsc::UnboundedReceiver<ChannelMessage>,
    stats: Arc<ReconnectStats>,
    task: JoinHandle<()>,
}

impl ReconnectingPubSub {
    pub fn subscribe(bus: RedisBus, channels: Vec<String>, config: ReconnectConfig) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let stats = Arc::new(ReconnectStats::default());

        let task = tokio::spawn(reconnecting_task(bus, channels, config, stats.clone(), sender));

        Self {
            receiver,
            stats,
            task,
        }
    }

    pub fn stats(&self) -> &Arc<ReconnectStats> {
        &self.stats
    }
}

async fn reconnecting_task(
    bus: RedisBus,
    channels: Vec<String>,
    config: ReconnectConfig,
    stats: Arc<ReconnectStats>,
    sender: mpsc::UnboundedSender<ChannelMessage>,
) {
    loop {
        match bus.subscribe(&channels).await {
            Ok(mut pubsub) => {
                stats.record_connect();
                info!(channels = ?channels, "Subscribed to Redis channels");

                let mut stream = pubsub.on_message();
                while let Some(msg) = stream.next().await {
                    let payload = match msg.get_payload::<String>() {
                        Ok(payload) => payload,
                        Err(e) => {
                            warn!(error = %e, "Dropping non-text pub/sub payload");
                            continue;
                        }
                    };
                    let message = ChannelMessage {
                        channel: msg.get_channel_name().to_string(),
                        payload,
                    };
                    if sender.send(message).is_err() {
                        info!("Pub/sub receiver dropped, stopping");
                        return;
                    }
                }

                let attempt = stats.record_failure();
                let delay = config.calculate_delay(attempt);
                warn!(?delay, "Redis pub/sub stream ended, reconnecting");
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                let attempt = stats.record_failure();
                let delay = config.calculate_delay(attempt);
                error!(attempt, error = %format!("{:#}", e), ?delay, "Redis subscribe failed");
                tokio::time::sleep(delay).await;
            }
        }

        if sender.is_closed() {
            return;
        }
    }
}

impl Drop for ReconnectingPubSub {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl Stream for ReconnectingPubSub {
    type Item = ChannelMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
