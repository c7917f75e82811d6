//! Periodic fan-out of current lines to every live subscription.
//!
//! Each tick reads the lines for the union of live interests and hands every
//! subscription its filtered batch. A failed or timed out delivery evicts
//! exactly that subscription; a failed read skips the tick. Neither stops the
//! loop.

mod stats;

pub use stats::{DispatchStats, DispatchStatsSnapshot};

use futures_util::future::join_all;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::channel::SubscriberChannel;
use crate::db::LineStore;
use crate::error::{LineError, SendError};
use crate::models::{Interest, SportLine, SportType, SubscriptionId};
use crate::ticker::Ticker;

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Sports fetched for subscriptions interested in everything
    pub default_sports: Vec<SportType>,
    /// Upper bound on a single delivery
    pub send_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_sports: SportType::ALL.to_vec(),
            send_timeout: Duration::from_secs(2),
        }
    }
}

struct Subscription {
    id: SubscriptionId,
    interest: Interest,
    channel: Arc<dyn SubscriberChannel>,
    active: AtomicBool,
}

enum Delivery {
    Sent,
    Skipped,
    Failed(SendError),
}

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutcome {
    /// Sports requested from the store; empty when nothing was queried
    pub requested: Vec<SportType>,
    pub delivered: usize,
    pub evicted: Vec<SubscriptionId>,
    /// Set when the store read failed and the tick was skipped
    pub store_error: Option<LineError>,
}

pub struct Dispatcher {
    store: Arc<dyn LineStore>,
    config: DispatchConfig,
    registry: RwLock<FxHashMap<SubscriptionId, Arc<Subscription>>>,
    stats: DispatchStats,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn LineStore>, config: DispatchConfig) -> Self {
        Self {
            store,
            config,
            registry: RwLock::new(FxHashMap::default()),
            stats: DispatchStats::default(),
        }
    }

    /// Register a consumer. An explicit but empty interest set is rejected.
    pub fn attach<C>(&self, interest: Interest, channel: C) -> Result<SubscriptionId, LineError>
    where
        C: SubscriberChannel + 'static,
    {
        if let Interest::Only(set) = &interest {
            if set.is_empty() {
                return Err(LineError::invalid_argument(
                    "subscription must name at least one sport",
                ));
            }
        }

        let id = SubscriptionId::new();
        let label = channel.describe();
        let subscription = Arc::new(Subscription {
            id,
            interest,
            channel: Arc::new(channel),
            active: AtomicBool::new(true),
        });

        let total = {
            let mut registry = self.registry.write();
            registry.insert(id, subscription);
            registry.len()
        };
        info!(subscription = %id, channel = %label, total, "Subscription attached");
        Ok(id)
    }

    /// Remove a subscription. Returns false if it was not registered.
    pub fn detach(&self, id: SubscriptionId) -> bool {
        let removed = self.registry.write().remove(&id);
        match removed {
            Some(subscription) => {
                subscription.active.store(false, Ordering::SeqCst);
                info!(subscription = %id, "Subscription detached");
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.registry.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.registry.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.read().is_empty()
    }

    pub fn stats(&self) -> DispatchStatsSnapshot {
        self.stats.snapshot()
    }

    fn required_types(&self, subscriptions: &[Arc<Subscription>]) -> Vec<SportType> {
        let mut types = BTreeSet::new();
        for subscription in subscriptions {
            match &subscription.interest {
                Interest::All => types.extend(self.config.default_sports.iter().copied()),
                Interest::Only(set) => types.extend(set.iter().copied()),
            }
        }
        types.into_iter().collect()
    }

    async fn deliver(&self, subscription: &Subscription, lines: &[SportLine]) -> Delivery {
        // Detached after the snapshot was taken
        if !subscription.active.load(Ordering::SeqCst) {
            return Delivery::Skipped;
        }

        let batch = subscription.interest.filter(lines);
        match tokio::time::timeout(self.config.send_timeout, subscription.channel.send(&batch)).await
        {
            Ok(Ok(())) => Delivery::Sent,
            Ok(Err(e)) => Delivery::Failed(e),
            Err(_) => Delivery::Failed(SendError::TimedOut(self.config.send_timeout)),
        }
    }

    fn evict(&self, subscription: &Subscription, reason: &SendError) -> bool {
        subscription.active.store(false, Ordering::SeqCst);
        if self.registry.write().remove(&subscription.id).is_none() {
            // Detached concurrently
            return false;
        }
        self.stats.record_eviction();
        warn!(
            subscription = %subscription.id,
            channel = %subscription.channel.describe(),
            error = %reason,
            "Delivery failed, subscription evicted"
        );
        true
    }

    /// Run one refresh-and-broadcast cycle.
    pub async fn tick(&self) -> TickOutcome {
        self.stats.record_tick();

        let snapshot: Vec<Arc<Subscription>> = self.registry.read().values().cloned().collect();
        if snapshot.is_empty() {
            debug!("No subscriptions, skipping tick");
            return TickOutcome::default();
        }

        let requested = self.required_types(&snapshot);
        if requested.is_empty() {
            return TickOutcome::default();
        }

        let lines = match self.store.get_lines_by_sport_types(&requested).await {
            Ok(lines) => lines,
            Err(e) => {
                self.stats.record_failed_tick();
                if e.is_table_not_exist() {
                    warn!(error = %e, "Line store not provisioned, skipping tick");
                } else {
                    error!(error = %e, "Failed to read lines, skipping tick");
                }
                return TickOutcome {
                    requested,
                    store_error: Some(e),
                    ..Default::default()
                };
            }
        };

        let results = join_all(
            snapshot
                .iter()
                .map(|subscription| self.deliver(subscription, &lines)),
        )
        .await;

        let mut outcome = TickOutcome {
            requested,
            ..Default::default()
        };
        for (subscription, result) in snapshot.iter().zip(results) {
            match result {
                Delivery::Sent => outcome.delivered += 1,
                Delivery::Skipped => {}
                Delivery::Failed(e) => {
                    if self.evict(subscription, &e) {
                        outcome.evicted.push(subscription.id);
                    }
                }
            }
        }

        self.stats.record_deliveries(outcome.delivered as u64);
        debug!(
            lines = lines.len(),
            delivered = outcome.delivered,
            evicted = outcome.evicted.len(),
            "Tick complete"
        );
        outcome
    }

    /// Tick every `period` on a dedicated [`Ticker`].
    pub fn run(self: &Arc<Self>, period: Duration) -> Result<Ticker, LineError> {
        let dispatcher = Arc::clone(self);
        Ticker::start(period, move || {
            let dispatcher = dispatcher.clone();
            async move {
                dispatcher.tick().await;
            }
        })
    }
}
