use anyhow::{Context, Result};
use redis::aio::{MultiplexedConnection, PubSub};
use redis::{AsyncCommands, Client};
use serde::Serialize;

/// Shared Redis handle used for publishing updates and opening pub/sub
/// connections.
#[derive(Clone)]
pub struct RedisBus {
    client: Client,
    connection: MultiplexedConnection,
}

impl RedisBus {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url).context("Invalid Redis URL")?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .context("Failed to connect to Redis")?;

        Ok(Self { client, connection })
    }

    /// Publish a JSON encoded message; returns the number of receivers.
    pub async fn publish<T: Serialize>(&self, channel: &str, message: &T) -> Result<i64> {
        let payload = serde_json::to_string(message)?;
        self.publish_str(channel, &payload).await
    }

    /// Publish a raw string; returns the number of receivers.
    pub async fn publish_str(&self, channel: &str, message: &str) -> Result<i64> {
        let mut conn = self.connection.clone();
        let receivers: i64 = conn
            .publish(channel, message)
            .await
            .with_context(|| format!("Failed to publish on {}", channel))?;
        Ok(receivers)
    }

    /// Dedicated pub/sub connection subscribed to `channels`.
    pub async fn subscribe(&self, channels: &[String]) -> Result<PubSub> {
        let conn = self
            .client
            .get_async_connection()
            .await
            .context("Failed to get async Redis connection")?;
        let mut pubsub = conn.into_pubsub();
        for channel in channels {
            pubsub
                .subscribe(channel)
                .await
                .with_context(|| format!("Failed to subscribe to channel: {}", channel))?;
        }
        Ok(pubsub)
    }

    pub fn client(&self) -> Client {
        self.client.clone()
    }
}
