//! Subscription requests arriving over Redis.

use anyhow::{Context, Result};
use futures_util::StreamExt;
use lines_rust_core::models::parse_sport_list;
use lines_rust_core::redis::ChannelMessage;
use lines_rust_core::{Dispatcher, Interest, SubscriberChannel, SubscriptionId};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
pub struct AttachRequest {
    pub consumer: String,
    #[serde(default)]
    pub sports: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct DetachRequest {
    pub consumer: String,
}

impl AttachRequest {
    /// Missing or empty `sports` means every sport.
    pub fn interest(&self) -> Result<Interest> {
        let names = self.sports.as_deref().unwrap_or_default();
        let sports = parse_sport_list(&names.join(",")).context("Invalid sports list")?;
        Ok(Interest::from_sports(&sports))
    }
}

fn parse_attach(payload: &str) -> Result<(String, Interest)> {
    let request: AttachRequest =
        serde_json::from_str(payload).context("Malformed attach request")?;
    let consumer = request.consumer.trim().to_string();
    if consumer.is_empty() {
        anyhow::bail!("Attach request has an empty consumer");
    }
    let interest = request.interest()?;
    Ok((consumer, interest))
}

fn parse_detach(payload: &str) -> Result<String> {
    let request: DetachRequest =
        serde_json::from_str(payload).context("Malformed detach request")?;
    Ok(request.consumer.trim().to_string())
}

/// Maps consumer names to their live subscription. Re-attaching a consumer
/// replaces its previous subscription.
pub struct AttachHandler<C, F> {
    dispatcher: Arc<Dispatcher>,
    make_channel: F,
    attach_channel: String,
    detach_channel: String,
    consumers: HashMap<String, SubscriptionId>,
    _channel: std::marker::PhantomData<fn() -> C>,
}

impl<C, F> AttachHandler<C, F>
where
    C: SubscriberChannel + 'static,
    F: Fn(&str) -> C,
{
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        make_channel: F,
        attach_channel: impl Into<String>,
        detach_channel: impl Into<String>,
    ) -> Self {
        Self {
            dispatcher,
            make_channel,
            attach_channel: attach_channel.into(),
            detach_channel: detach_channel.into(),
            consumers: HashMap::new(),
            _channel: std::marker::PhantomData,
        }
    }

    pub fn subscription_of(&self, consumer: &str) -> Option<SubscriptionId> {
        self.consumers.get(consumer).copied()
    }

    /// Number of consumers with a subscription on record.
    pub fn tracked(&self) -> usize {
        self.consumers.len()
    }

    /// Forget consumers whose subscription the dispatcher no longer holds,
    /// i.e. ones evicted after a failed delivery. Returns how many went.
    pub fn prune(&mut self) -> usize {
        let before = self.consumers.len();
        let dispatcher = &self.dispatcher;
        self.consumers.retain(|_, id| dispatcher.contains(*id));
        let pruned = before - self.consumers.len();
        if pruned > 0 {
            debug!(pruned, "Dropped evicted consumers");
        }
        pruned
    }

    pub fn attach(&mut self, payload: &str) -> Result<SubscriptionId> {
        let (consumer, interest) = parse_attach(payload)?;
        self.prune();

        if let Some(previous) = self.consumers.remove(&consumer) {
            self.dispatcher.detach(previous);
        }

        let channel = (self.make_channel)(&consumer);
        let id = self.dispatcher.attach(interest, channel)?;
        info!(consumer = %consumer, subscription = %id, "Consumer attached");
        self.consumers.insert(consumer, id);
        Ok(id)
    }

    /// Returns false when the consumer had no live subscription.
    pub fn detach(&mut self, payload: &str) -> Result<bool> {
        let consumer = parse_detach(payload)?;
        let removed = match self.consumers.remove(&consumer) {
            Some(id) => self.dispatcher.detach(id),
            None => false,
        };
        info!(consumer = %consumer, removed, "Consumer detached");
        Ok(removed)
    }

    pub fn handle(&mut self, message: &ChannelMessage) {
        let result = if message.channel == self.attach_channel {
            self.attach(&message.payload).map(|_| ())
        } else if message.channel == self.detach_channel {
            self.detach(&message.payload).map(|_| ())
        } else {
            warn!(channel = %message.channel, "Message on unexpected channel");
            return;
        };

        if let Err(e) = result {
            warn!(channel = %message.channel, error = %format!("{:#}", e), "Rejected subscription request");
        }
    }

    /// Drain `messages` until the stream ends.
    pub async fn listen<S>(mut self, mut messages: S)
    where
        S: futures_util::Stream<Item = ChannelMessage> + Unpin,
    {
        while let Some(message) = messages.next().await {
            self.handle(&message);
        }
        info!("Subscription request stream closed");
    }
}
