use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cli::config::ProxySettings;
use crate::error::{Error, Result};
use crate::storage::TaskQueue;

/// Backoff never grows beyond this between polls.
const MAX_POLL_DELAY: Duration = Duration::from_secs(60);

/// Hands one proxy endpoint to each outbound request.
///
/// Endpoints are consumed from a shared queue refilled by an external
/// producer. A popped endpoint belongs to the request that popped it and
/// is never returned to the pool. An empty pool is backpressure, not an
/// error: the loop polls with exponential backoff until the configured
/// deadline, then surfaces a typed timeout instead of blocking forever.
pub struct ProxyPool {
    queue: Arc<dyn TaskQueue>,
    pool_key: String,
    poll_interval: Duration,
    max_wait: Duration,
}

impl ProxyPool {
    pub fn new(queue: Arc<dyn TaskQueue>, settings: &ProxySettings) -> Self {
        Self {
            queue,
            pool_key: settings.pool_key.clone(),
            poll_interval: Duration::from_secs(settings.poll_interval),
            max_wait: Duration::from_secs(settings.max_wait),
        }
    }

    /// Acquire a proxy endpoint, ready to hand to the HTTP client.
    pub async fn acquire(&self) -> Result<String> {
        let started = Instant::now();
        let mut backoff = self.poll_interval;

        loop {
            if let Some(endpoint) = self.queue.pop_now(&self.pool_key).await? {
                debug!(endpoint = %endpoint, "acquired proxy");
                return Ok(format!("http://{endpoint}"));
            }

            let waited = started.elapsed();
            if waited >= self.max_wait {
                return Err(Error::ProxyWaitTimeout { waited });
            }

            let delay = backoff.min(self.max_wait - waited);
            warn!(
                pool = %self.pool_key,
                delay_secs = delay.as_secs(),
                "proxy pool empty, waiting before next poll"
            );
            tokio::time::sleep(delay).await;
            backoff = (backoff * 2).min(MAX_POLL_DELAY);
        }
    }
}
