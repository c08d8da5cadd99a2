use std::sync::Arc;

use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, Client};
use tokio::sync::Mutex;
use tracing::debug;

use crate::cli::config::DedupSettings;
use crate::error::Result;

/// Per-site record of detail URLs that have already been scheduled.
///
/// Presence of a record is proof a detail task was enqueued; absence is
/// permission to enqueue. The insert must be a single indivisible
/// set-if-absent so that two workers racing on the same URL cannot both
/// win — separate read-then-write calls would only give a best-effort
/// guarantee.
#[async_trait]
pub trait DedupStore: Send + Sync {
    /// Record `(site_id, url)` with its first-seen timestamp unless it
    /// already exists. Returns whether this call performed the insert.
    async fn insert_if_absent(&self, site_id: &str, url: &str, seen_at: i64) -> Result<bool>;
}

/// Redis hash-map implementation, one hash per site.
pub struct RedisDedup {
    conn: Arc<Mutex<MultiplexedConnection>>,
    key_template: String,
}

impl RedisDedup {
    pub async fn connect(settings: &DedupSettings) -> Result<Self> {
        let client = Client::open(settings.redis_url.as_str())?;
        let conn = client.get_multiplexed_async_connection().await?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            key_template: settings.judge_key.clone(),
        })
    }

    fn judge_key(&self, site_id: &str) -> String {
        self.key_template.replace("{site_id}", site_id)
    }
}

#[async_trait]
impl DedupStore for RedisDedup {
    async fn insert_if_absent(&self, site_id: &str, url: &str, seen_at: i64) -> Result<bool> {
        let key = self.judge_key(site_id);
        let mut conn = self.conn.lock().await;

        // HSETNX is atomic: exactly one concurrent caller observes true
        let inserted: bool = redis::cmd("HSETNX")
            .arg(&key)
            .arg(url)
            .arg(seen_at)
            .query_async(&mut *conn)
            .await?;

        if inserted {
            debug!(site_id = %site_id, url = %url, "recorded first sighting");
        }

        Ok(inserted)
    }
}
