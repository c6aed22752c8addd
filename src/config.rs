use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};

const REQUIRED_VARS: [&str; 2] = ["TELOXIDE_TOKEN", "CHANNEL_USERNAME"];

/// Checks that the variables the bot cannot start without are present.
/// `.env` must already be loaded.
pub fn load_environment() -> Result<()> {
    let missing = missing_required_vars(|key| env::var(key).ok());
    if !missing.is_empty() {
        return Err(anyhow!("Missing required environment variables: {}", missing.join(", ")));
    }
    Ok(())
}

fn missing_required_vars<F>(lookup: F) -> Vec<&'static str>
where
    F: Fn(&str) -> Option<String>,
{
    REQUIRED_VARS
        .iter()
        .copied()
        .filter(|name| lookup(name).is_none_or(|v| v.trim().is_empty()))
        .collect()
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bot_token: String,
    /// Channel users must join, e.g. `@mychannel`. Also the source channel for content copies.
    pub channel: String,
    pub database_path: PathBuf,
    pub admin_ids: Vec<i64>,
    pub advertise_contact: String,
    pub sponsor_card: String,
    pub link_domain: String,
    pub subscription_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bot_token = get("TELOXIDE_TOKEN").ok_or_else(|| anyhow!("TELOXIDE_TOKEN must be set"))?;
        let channel = get("CHANNEL_USERNAME").ok_or_else(|| anyhow!("CHANNEL_USERNAME must be set"))?;

        let database_dir = get("DATABASE_DIR").unwrap_or_else(|| ".".to_string());
        let db_name = get("DB_NAME").unwrap_or_else(|| "telegram_bot".to_string());
        let database_path = PathBuf::from(database_dir).join(format!("{}.db", db_name));

        let timeout_secs = match get("SUBSCRIPTION_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|e| anyhow!("Invalid SUBSCRIPTION_TIMEOUT_SECS '{}': {}", raw, e))?,
            None => 5,
        };

        Ok(Self {
            bot_token,
            channel,
            database_path,
            admin_ids: parse_admin_ids(&get("ADMIN_IDS").unwrap_or_default()),
            advertise_contact: get("ADVERTISE_CONTACT").unwrap_or_else(|| "@admin".to_string()),
            sponsor_card: get("SPONSOR_CARD").unwrap_or_else(|| "not configured".to_string()),
            link_domain: get("LINK_DOMAIN").unwrap_or_else(|| "t.me".to_string()),
            subscription_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

pub fn parse_admin_ids(admin_ids_str: &str) -> Vec<i64> {
    admin_ids_str
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect()
}
