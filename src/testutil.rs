//! In-memory doubles for the external services, shared across unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::fetch::{FetchedPage, PageFetcher};
use crate::storage::{DedupStore, DocumentSink, TaskQueue};
use crate::worker::task::{DetailRecord, Task, TaskKind};

pub fn sample_task(kind: TaskKind) -> Task {
    serde_json::from_value(json!({
        "url": "https://example.com/list?page=1",
        "task_type": u8::from(kind),
        "site_id": "42",
        "template_id": "7",
        "table": "articles",
        "category": "news"
    }))
    .unwrap()
}

/// Queue double. `delay_push` plants a value that appears only after a
/// number of empty non-blocking polls, for exercising retry loops.
#[derive(Default)]
pub struct InMemoryQueue {
    queues: Mutex<HashMap<String, VecDeque<String>>>,
    delayed: Mutex<HashMap<String, (String, usize)>>,
    pop_now_calls: AtomicUsize,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn delay_push(&self, key: &str, payload: &str, empty_polls: usize) {
        self.delayed
            .lock()
            .await
            .insert(key.to_string(), (payload.to_string(), empty_polls));
    }

    pub fn pop_now_calls(&self) -> usize {
        self.pop_now_calls.load(Ordering::SeqCst)
    }

    pub async fn drain(&self, key: &str) -> Vec<String> {
        self.queues
            .lock()
            .await
            .remove(key)
            .map(|q| q.into_iter().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TaskQueue for InMemoryQueue {
    async fn push(&self, key: &str, payload: &str) -> Result<()> {
        self.queues
            .lock()
            .await
            .entry(key.to_string())
            .or_default()
            .push_back(payload.to_string());
        Ok(())
    }

    async fn pop(&self, key: &str, timeout: Duration) -> Result<Option<String>> {
        if let Some(value) = self
            .queues
            .lock()
            .await
            .get_mut(key)
            .and_then(|q| q.pop_front())
        {
            return Ok(Some(value));
        }
        tokio::time::sleep(timeout.min(Duration::from_millis(10))).await;
        Ok(None)
    }

    async fn pop_now(&self, key: &str) -> Result<Option<String>> {
        self.pop_now_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(value) = self
            .queues
            .lock()
            .await
            .get_mut(key)
            .and_then(|q| q.pop_front())
        {
            return Ok(Some(value));
        }

        let mut delayed = self.delayed.lock().await;
        if let Some((payload, remaining)) = delayed.get_mut(key) {
            if *remaining == 0 {
                let payload = payload.clone();
                delayed.remove(key);
                return Ok(Some(payload));
            }
            *remaining -= 1;
        }

        Ok(None)
    }

    async fn len(&self, key: &str) -> Result<usize> {
        Ok(self
            .queues
            .lock()
            .await
            .get(key)
            .map(|q| q.len())
            .unwrap_or(0))
    }
}

/// Dedup double with call accounting for scope-isolation assertions.
#[derive(Default)]
pub struct InMemoryDedup {
    seen: Mutex<HashSet<(String, String)>>,
    inserts: AtomicUsize,
    calls: AtomicUsize,
}

impl InMemoryDedup {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn preload(&self, site_id: &str, url: &str) {
        self.seen
            .lock()
            .await
            .insert((site_id.to_string(), url.to_string()));
    }

    pub fn insert_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DedupStore for InMemoryDedup {
    async fn insert_if_absent(&self, site_id: &str, url: &str, _seen_at: i64) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let inserted = self
            .seen
            .lock()
            .await
            .insert((site_id.to_string(), url.to_string()));
        if inserted {
            self.inserts.fetch_add(1, Ordering::SeqCst);
        }

        Ok(inserted)
    }
}

/// Document sink double recording every upsert.
#[derive(Default)]
pub struct InMemoryDocuments {
    upserts: Mutex<Vec<(String, String, DetailRecord)>>,
}

impl InMemoryDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn stored(&self) -> Vec<(String, String, DetailRecord)> {
        self.upserts.lock().await.clone()
    }
}

#[async_trait]
impl DocumentSink for InMemoryDocuments {
    async fn upsert(&self, table: &str, url: &str, record: &DetailRecord) -> Result<()> {
        self.upserts
            .lock()
            .await
            .push((table.to_string(), url.to_string(), record.clone()));
        Ok(())
    }
}

/// Fetcher double returning a canned body for every URL.
pub struct FakeFetcher {
    body: String,
    fetches: AtomicUsize,
}

impl FakeFetcher {
    pub fn with_body(body: &str) -> Self {
        Self {
            body: body.to_string(),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(&self, _url: &str) -> Result<FetchedPage> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(FetchedPage {
            status: 200,
            body: self.body.clone(),
        })
    }
}
