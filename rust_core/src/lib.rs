//! Lines Core - periodic distribution of sport lines to subscribers.
//!
//! This crate provides:
//! - A transactional line store over Postgres with typed failure classification
//! - A fixed-period scheduler ([`ticker::Ticker`])
//! - Subscriber channels (in-process stream, Redis pub/sub)
//! - The dispatcher that fans current lines out to every live subscription
//! - A poller that keeps the store fed from the upstream lines provider

pub mod channel;
pub mod clients;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod models;
pub mod poller;
pub mod redis;
pub mod ticker;

pub use channel::SubscriberChannel;
pub use db::LineStore;
pub use dispatch::{DispatchConfig, Dispatcher};
pub use error::{ErrorKind, LineError, SendError};
pub use models::{Interest, LinesUpdate, SportLine, SportType, SubscriptionId};
pub use ticker::Ticker;
