use anyhow::{Context, Result};
use lines_rust_core::db::DbPoolConfig;
use lines_rust_core::models::parse_sport_list;
use lines_rust_core::SportType;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub pool: DbPoolConfig,
    pub dispatch_interval: Duration,
    pub send_timeout: Duration,
    pub default_sports: Vec<SportType>,
    pub lines_provider_url: Option<String>,
    pub provider_poll_interval: Duration,
    pub attach_channel: String,
    pub detach_channel: String,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let default_sports = match env::var("DEFAULT_SPORTS") {
            Ok(raw) if !raw.trim().is_empty() => {
                parse_sport_list(&raw).context("Invalid DEFAULT_SPORTS")?
            }
            _ => SportType::ALL.to_vec(),
        };

        let lines_provider_url = env::var("LINES_PROVIDER_URL")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        Ok(Self {
            database_url,
            redis_url: env_string("REDIS_URL", "redis://localhost:6379"),
            pool: DbPoolConfig::from_env(),
            dispatch_interval: Duration::from_millis(env_or("DISPATCH_INTERVAL_MS", 1000)),
            send_timeout: Duration::from_millis(env_or("SEND_TIMEOUT_MS", 2000)),
            default_sports,
            lines_provider_url,
            provider_poll_interval: Duration::from_millis(env_or(
                "PROVIDER_POLL_INTERVAL_MS",
                1000,
            )),
            attach_channel: env_string("ATTACH_CHANNEL", "lines:subscribe"),
            detach_channel: env_string("DETACH_CHANNEL", "lines:unsubscribe"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        env::set_var("LINE_DISTRIBUTOR_TEST_GARBAGE", "not-a-number");
        assert_eq!(env_or("LINE_DISTRIBUTOR_TEST_GARBAGE", 1000u64), 1000);
        env::remove_var("LINE_DISTRIBUTOR_TEST_GARBAGE");
    }

    #[test]
    fn test_env_or_parses_value() {
        env::set_var("LINE_DISTRIBUTOR_TEST_VALUE", "250");
        assert_eq!(env_or("LINE_DISTRIBUTOR_TEST_VALUE", 1000u64), 250);
        env::remove_var("LINE_DISTRIBUTOR_TEST_VALUE");
    }
}
