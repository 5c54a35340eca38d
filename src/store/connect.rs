//! Startup connection with bounded exponential backoff.

use super::DocumentStore;
use crate::config::DatabaseConfig;
use crate::error::{MigratorError, Result};
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{error, info, warn};

static CREDENTIALS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"//([^:/@]+):([^@]+)@").expect("credential pattern is valid"));

/// Mask `user:password@` in a connection string before logging it
pub fn redact_uri(uri: &str) -> String {
    CREDENTIALS.replace(uri, "//***:***@").into_owned()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first failed attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubled for every further retry
    pub base_delay: Duration,
    /// Upper bound for a single connection attempt
    pub connect_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self {
            max_retries: config.retry_attempts,
            base_delay: config.retry_base_delay(),
            connect_timeout: config.connect_timeout(),
        }
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(20))
    }
}

/// Connect, retrying with `base * 2^attempt` delays.
///
/// `target` names what is being connected to in the log; credentials in it
/// are masked.
pub async fn connect_with_retry(
    store: &dyn DocumentStore,
    target: &str,
    policy: &RetryPolicy,
) -> Result<()> {
    let mut attempt = 0u32;
    loop {
        info!("Connecting to {}", redact_uri(target));

        let result = match tokio::time::timeout(policy.connect_timeout, store.connect()).await {
            Ok(result) => result,
            Err(_) => Err(MigratorError::database(
                "connect",
                format!("timed out after {:?}", policy.connect_timeout),
            )),
        };

        match result {
            Ok(()) => {
                info!("Store connected");
                return Ok(());
            }
            Err(e) if attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                warn!(
                    "Store connection failed, retrying in {}ms (attempt {}/{}): {}",
                    delay.as_millis(),
                    attempt + 1,
                    policy.max_retries,
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                error!("Store connection failed after maximum retry attempts: {}", e);
                return Err(e);
            }
        }
    }
}
