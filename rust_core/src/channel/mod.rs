//! Delivery of line batches to one remote consumer.
//!
//! A channel writes each batch to its consumer once and reports failure.
//! Retry and eviction policy live in the dispatcher.

use async_trait::async_trait;

use crate::error::SendError;
use crate::models::SportLine;

mod pubsub;
mod stream;

pub use pubsub::{updates_channel, RedisChannel, UPDATES_CHANNEL_PREFIX};
pub use stream::StreamChannel;

#[async_trait]
pub trait SubscriberChannel: Send + Sync {
    /// Deliver one batch as a unit. No internal retry, batching or reordering.
    async fn send(&self, lines: &[SportLine]) -> Result<(), SendError>;

    /// Short label used in logs.
    fn describe(&self) -> String {
        "subscriber".to_string()
    }
}
