use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::error::Result;
use crate::metrics::{counter, CounterRegistry};
use crate::storage::{DedupStore, QueueKeys, TaskQueue};
use crate::worker::task::{ListPage, Task};

/// Whether pagination continues past a page that yielded no new URLs.
/// A deployment-time choice, not a per-task one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationPolicy {
    /// Follow next-page links to the end of the listing regardless of
    /// what was already seen. For full rescans of a site.
    ScanAll,

    /// Stop paginating once a page contributes nothing new. For
    /// incremental harvesting of listings ordered newest-first.
    StopOnExhaustion,
}

impl PaginationPolicy {
    pub fn from_scan_all(scan_all: bool) -> Self {
        if scan_all {
            PaginationPolicy::ScanAll
        } else {
            PaginationPolicy::StopOnExhaustion
        }
    }

    fn should_continue(&self, new_urls: usize) -> bool {
        match self {
            PaginationPolicy::ScanAll => true,
            PaginationPolicy::StopOnExhaustion => new_urls > 0,
        }
    }
}

/// Filters list-page results against the dedup store and decides
/// pagination.
///
/// For every candidate detail URL an atomic set-if-absent either claims
/// the URL (enqueue a derived detail task) or proves another worker got
/// there first (skip). Reprocessing an identical page against unchanged
/// dedup state therefore enqueues nothing.
pub struct DedupEngine {
    queue: Arc<dyn TaskQueue>,
    dedup: Arc<dyn DedupStore>,
    keys: QueueKeys,
    policy: PaginationPolicy,
    metrics: Arc<CounterRegistry>,
}

impl DedupEngine {
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        dedup: Arc<dyn DedupStore>,
        keys: QueueKeys,
        policy: PaginationPolicy,
        metrics: Arc<CounterRegistry>,
    ) -> Self {
        Self {
            queue,
            dedup,
            keys,
            policy,
            metrics,
        }
    }

    /// Process one list-page result: schedule unseen detail URLs and
    /// enqueue the continuation when the policy admits it. Errors
    /// propagate to the caller, which treats the whole page as a no-op.
    pub async fn process_list_page(&self, task: &Task, page: &ListPage) -> Result<()> {
        let mut new_urls = 0usize;

        for url in &page.detail_urls {
            if url.is_empty() {
                continue;
            }

            let seen_at = Utc::now().timestamp();
            if self.dedup.insert_if_absent(&task.site_id, url, seen_at).await? {
                let detail = task.detail_from(url);
                self.queue
                    .push(&self.keys.detail, &serde_json::to_string(&detail)?)
                    .await?;
                self.metrics.incr(counter::ENQUEUED);
                new_urls += 1;
            } else {
                self.metrics.incr(counter::FILTERED);
            }
        }

        if let Some(next_page_url) = &page.next_page_url {
            if self.policy.should_continue(new_urls) {
                let continuation = task.continuation(next_page_url);
                self.queue
                    .push(&self.keys.master, &serde_json::to_string(&continuation)?)
                    .await?;
                self.metrics.incr(counter::ENQUEUED);
                info!(
                    queue = %self.keys.master,
                    next = %next_page_url,
                    new_urls = new_urls,
                    "continuing pagination"
                );
            } else {
                debug!(url = %task.url, "page yielded nothing new, stopping pagination");
            }
        }

        Ok(())
    }
}
