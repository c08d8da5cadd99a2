use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, Client};
use tokio::sync::Mutex;
use tracing::debug;

use crate::cli::config::QueueSettings;
use crate::error::Result;

/// Ordered-list queue operations shared by the task queues and the proxy
/// pool. The external Redis service is the only synchronization point
/// between workers.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Append a record to the tail of the queue.
    async fn push(&self, key: &str, payload: &str) -> Result<()>;

    /// Pop from the head, blocking up to `timeout`. `None` means the queue
    /// stayed empty for the whole window.
    async fn pop(&self, key: &str, timeout: Duration) -> Result<Option<String>>;

    /// Non-blocking pop from the head.
    async fn pop_now(&self, key: &str) -> Result<Option<String>>;

    /// Current queue length.
    async fn len(&self, key: &str) -> Result<usize>;
}

/// Input queue names for one worker identity, rendered once at startup.
#[derive(Debug, Clone)]
pub struct QueueKeys {
    /// Master input queue, also the continuation target
    pub master: String,

    /// Slave input queue for detail tasks
    pub detail: String,
}

impl QueueKeys {
    pub fn from_settings(settings: &QueueSettings, worker_name: &str) -> Self {
        Self {
            master: settings.master_key.replace("{name}", worker_name),
            detail: settings.detail_key.replace("{name}", worker_name),
        }
    }
}

/// Redis-backed queue client.
pub struct RedisQueue {
    conn: Arc<Mutex<MultiplexedConnection>>,
}

impl RedisQueue {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl TaskQueue for RedisQueue {
    async fn push(&self, key: &str, payload: &str) -> Result<()> {
        let mut conn = self.conn.lock().await;

        redis::cmd("RPUSH")
            .arg(key)
            .arg(payload)
            .query_async::<_, ()>(&mut *conn)
            .await?;

        debug!(queue = %key, "pushed record");

        Ok(())
    }

    async fn pop(&self, key: &str, timeout: Duration) -> Result<Option<String>> {
        let mut conn = self.conn.lock().await;

        // BLPOP returns (key, value) or nil on timeout
        let popped: Option<(String, String)> = redis::cmd("BLPOP")
            .arg(key)
            .arg(timeout.as_secs().max(1))
            .query_async(&mut *conn)
            .await?;

        Ok(popped.map(|(_, value)| value))
    }

    async fn pop_now(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.lock().await;

        let popped: Option<String> = redis::cmd("LPOP")
            .arg(key)
            .query_async(&mut *conn)
            .await?;

        Ok(popped)
    }

    async fn len(&self, key: &str) -> Result<usize> {
        let mut conn = self.conn.lock().await;

        let count: usize = redis::cmd("LLEN").arg(key).query_async(&mut *conn).await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_keys_render_worker_name() {
        let settings = QueueSettings {
            redis_url: "redis://localhost:6379/1".to_string(),
            master_key: "{name}:master_urls".to_string(),
            detail_key: "{name}:detail_urls".to_string(),
        };

        let keys = QueueKeys::from_settings(&settings, "spider");
        assert_eq!(keys.master, "spider:master_urls");
        assert_eq!(keys.detail, "spider:detail_urls");
    }
}
