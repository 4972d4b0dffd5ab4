use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};

use relay_sync::{RelaySettings, RetryPolicy};

/// Ingest tokens that MUST NOT be used.
const PLACEHOLDER_TOKENS: &[&str] = &["change-me", "change-me-to-a-random-string", "dev-token"];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    /// Bearer token the event-ingestion host presents on every request.
    pub ingest_token: String,
    pub webhook_api_base: String,
    pub relay: RelaySettings,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let ingest_token = var("RELAY_INGEST_TOKEN").unwrap_or_default();
        if ingest_token.is_empty() || PLACEHOLDER_TOKENS.contains(&ingest_token.as_str()) {
            bail!("RELAY_INGEST_TOKEN is unset or still a placeholder");
        }

        let port: u16 = var("RELAY_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("RELAY_PORT")?;

        let dispatch_timeout_ms: u64 = parse_or(&var, "RELAY_DISPATCH_TIMEOUT_MS", 5000)?;
        let retry_attempts: u32 = parse_or(&var, "RELAY_TOGGLE_RETRY_ATTEMPTS", 5)?;
        let retry_backoff_ms: u64 = parse_or(&var, "RELAY_TOGGLE_RETRY_BACKOFF_MS", 250)?;

        Ok(Self {
            host: var("RELAY_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_path: var("RELAY_DB_PATH").unwrap_or_else(|| "relay.db".into()).into(),
            ingest_token,
            webhook_api_base: var("RELAY_WEBHOOK_API_BASE")
                .unwrap_or_else(|| "https://discord.com/api/v10".into())
                .trim_end_matches('/')
                .to_string(),
            relay: RelaySettings {
                non_chat_networks: parse_list(&var("RELAY_NON_CHAT_NETWORKS").unwrap_or_default()),
                dispatch_timeout: Duration::from_millis(dispatch_timeout_ms),
                toggle_retry: RetryPolicy {
                    attempts: retry_attempts,
                    backoff: Duration::from_millis(retry_backoff_ms),
                },
            },
        })
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(value) => value.trim().parse().with_context(|| format!("invalid {}", key)),
        None => Ok(default),
    }
}

/// Comma separated list, blanks dropped.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}
