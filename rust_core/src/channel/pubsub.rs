use async_trait::async_trait;

use super::SubscriberChannel;
use crate::error::SendError;
use crate::models::{LinesUpdate, SportLine};
use crate::redis::RedisBus;

/// Prefix of the per-consumer Redis channel carrying updates.
pub const UPDATES_CHANNEL_PREFIX: &str = "lines:updates:";

pub fn updates_channel(consumer: &str) -> String {
    format!("{}{}", UPDATES_CHANNEL_PREFIX, consumer)
}

/// Publishes JSON [`LinesUpdate`]s on a consumer's Redis channel.
///
/// A publish that reaches no listener means the consumer went away.
#[derive(Clone)]
pub struct RedisChannel {
    bus: RedisBus,
    channel: String,
}

impl RedisChannel {
    pub fn new(bus: RedisBus, consumer: &str) -> Self {
        Self {
            bus,
            channel: updates_channel(consumer),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

#[async_trait]
impl SubscriberChannel for RedisChannel {
    async fn send(&self, lines: &[SportLine]) -> Result<(), SendError> {
        let payload = serde_json::to_string(&LinesUpdate::from_lines(lines))?;
        let receivers = self
            .bus
            .publish_str(&self.channel, &payload)
            .await
            .map_err(|e| SendError::Transport(format!("{:#}", e)))?;

        if receivers == 0 {
            return Err(SendError::Closed);
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("redis:{}", self.channel)
    }
}
