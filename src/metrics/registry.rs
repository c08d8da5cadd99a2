use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Names of the cumulative counters the worker tracks.
pub mod counter {
    pub const REQUESTED: &str = "requested";
    pub const REQUEST_BYTES: &str = "request_bytes";
    pub const RESPONSE: &str = "response";
    pub const RESPONSE_BYTES: &str = "response_bytes";
    pub const RESPONSE_200: &str = "response_200";
    pub const RESPONSE_301: &str = "response_301";
    pub const RESPONSE_404: &str = "response_404";
    pub const ITEM: &str = "item";
    pub const FILTERED: &str = "filtered";
    pub const ENQUEUED: &str = "enqueued";
    pub const DEQUEUED: &str = "dequeued";
    pub const LOG_WARNING: &str = "log_warning";
}

const TRACKED: &[&str] = &[
    counter::REQUESTED,
    counter::REQUEST_BYTES,
    counter::RESPONSE,
    counter::RESPONSE_BYTES,
    counter::RESPONSE_200,
    counter::RESPONSE_301,
    counter::RESPONSE_404,
    counter::ITEM,
    counter::FILTERED,
    counter::ENQUEUED,
    counter::DEQUEUED,
    counter::LOG_WARNING,
];

/// Process-wide cumulative counters, updated lock-free from every
/// component and read as a consistent-enough snapshot by the reporter.
#[derive(Debug)]
pub struct CounterRegistry {
    counters: HashMap<&'static str, AtomicU64>,
}

impl CounterRegistry {
    pub fn new() -> Self {
        let counters = TRACKED
            .iter()
            .map(|name| (*name, AtomicU64::new(0)))
            .collect();

        Self { counters }
    }

    pub fn incr(&self, name: &str) {
        self.add(name, 1);
    }

    pub fn add(&self, name: &str, value: u64) {
        if let Some(counter) = self.counters.get(name) {
            counter.fetch_add(value, Ordering::Relaxed);
        }
    }

    pub fn get(&self, name: &str) -> u64 {
        self.counters
            .get(name)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Current cumulative value of every tracked counter.
    pub fn snapshot(&self) -> HashMap<String, u64> {
        self.counters
            .iter()
            .map(|(name, counter)| (name.to_string(), counter.load(Ordering::Relaxed)))
            .collect()
    }
}

impl Default for CounterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
