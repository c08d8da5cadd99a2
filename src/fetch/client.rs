use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::header::USER_AGENT;
use reqwest::{Client, Proxy};
use tracing::debug;

use crate::error::Result;
use crate::metrics::{counter, CounterRegistry};
use crate::proxy::ProxyPool;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
];

/// A fetched page body with its HTTP status.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
}

/// Seam between the coordination core and the HTTP transport.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

/// Thin reqwest-based fetcher. Rotates user agents per request, pulls one
/// proxy endpoint from the pool per request when proxy use is enabled,
/// and feeds the transfer counters. Retry policy and robots handling are
/// the engine's concern, not this client's.
pub struct HttpFetcher {
    client: Client,
    proxy: Option<Arc<ProxyPool>>,
    metrics: Arc<CounterRegistry>,
}

impl HttpFetcher {
    pub fn new(proxy: Option<Arc<ProxyPool>>, metrics: Arc<CounterRegistry>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            proxy,
            metrics,
        })
    }

    fn random_user_agent() -> &'static str {
        USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(USER_AGENTS[0])
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        // the acquired endpoint is owned by this request and never reused
        let client = match &self.proxy {
            Some(pool) => {
                let endpoint = pool.acquire().await?;
                Client::builder()
                    .timeout(Duration::from_secs(30))
                    .proxy(Proxy::all(&endpoint)?)
                    .build()?
            }
            None => self.client.clone(),
        };

        self.metrics.incr(counter::REQUESTED);
        self.metrics.add(counter::REQUEST_BYTES, url.len() as u64);

        let response = client
            .get(url)
            .header(USER_AGENT, Self::random_user_agent())
            .send()
            .await?;

        let status = response.status().as_u16();
        self.metrics.incr(counter::RESPONSE);
        match status {
            200 => self.metrics.incr(counter::RESPONSE_200),
            301 => self.metrics.incr(counter::RESPONSE_301),
            404 => self.metrics.incr(counter::RESPONSE_404),
            _ => {}
        }

        let body = response.text().await?;
        self.metrics.add(counter::RESPONSE_BYTES, body.len() as u64);

        debug!(url = %url, status = status, bytes = body.len(), "fetched page");

        Ok(FetchedPage { status, body })
    }
}
