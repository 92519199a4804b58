//! Command-line and environment configuration.

use crate::display::DEFAULT_API_BASE;
use clap::Parser;
use reqwest::Url;
use std::num::NonZeroU64;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "presence-relay")]
#[command(about = "Live access counter with webhook relay and Discord channel display")]
pub struct Config {
    /// Discord bot token
    #[arg(long, env = "DISCORD_BOT_TOKEN", hide_env_values = true, value_parser = non_empty)]
    pub token: String,

    /// Webhook that receives every access payload
    #[arg(long, env = "DISCORD_WEBHOOK_URL")]
    pub webhook_url: Url,

    /// Channel whose name shows the live count
    #[arg(long, env = "CHANNEL_ID")]
    pub channel_id: NonZeroU64,

    /// Minutes before an access stops counting as online
    #[arg(long, env = "EXPIRATION_MINUTES", default_value = "7",
          value_parser = clap::value_parser!(u64).range(1..))]
    pub ttl_minutes: u64,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value = "10000")]
    pub port: u16,

    /// Timeout for a single webhook relay, in seconds
    #[arg(long, env = "RELAY_TIMEOUT_SECS", default_value = "10",
          value_parser = clap::value_parser!(u64).range(1..))]
    pub relay_timeout_secs: u64,

    /// Maximum relay attempts in flight before new ones are dropped
    #[arg(long, env = "RELAY_MAX_IN_FLIGHT", default_value = "64",
          value_parser = clap::value_parser!(u64).range(1..))]
    pub relay_max_in_flight: u64,

    /// Seconds between channel name reconciliations
    #[arg(long, env = "RECONCILE_INTERVAL_SECS", default_value = "60",
          value_parser = clap::value_parser!(u64).range(1..))]
    pub reconcile_interval_secs: u64,

    /// Discord REST API base URL
    #[arg(long, env = "DISCORD_API_BASE", default_value = DEFAULT_API_BASE)]
    pub discord_api_base: Url,
}

fn non_empty(s: &str) -> Result<String, String> {
    let s = s.trim();
    if s.is_empty() {
        Err("must not be empty".to_string())
    } else {
        Ok(s.to_string())
    }
}

impl Config {
    pub fn relay_timeout(&self) -> Duration {
        Duration::from_secs(self.relay_timeout_secs)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    pub fn relay_max_in_flight(&self) -> usize {
        usize::try_from(self.relay_max_in_flight).unwrap_or(usize::MAX)
    }
}
