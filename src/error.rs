use std::time::Duration;
use thiserror::Error;

/// Error taxonomy for the worker.
///
/// Configuration errors are fatal at startup. Queue/store/transport errors
/// are transient and isolated at the task or page boundary. A sink write
/// rejection is fatal for the metrics reporter, which must never skip
/// silently over a broken sink.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("queue operation failed: {0}")]
    Queue(#[from] redis::RedisError),

    #[error("document store operation failed: {0}")]
    Documents(#[from] mongodb::error::Error),

    #[error("failed to encode document: {0}")]
    Bson(#[from] mongodb::bson::ser::Error),

    #[error("http transport failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("metrics sink rejected write: {0}")]
    SinkWrite(String),

    #[error("no proxy available after waiting {waited:?}")]
    ProxyWaitTimeout { waited: Duration },

    #[error("malformed payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("no template registered for site {site_id} template {template_id}")]
    UnknownTemplate {
        site_id: String,
        template_id: String,
    },

    #[error("page parse failed: {0}")]
    Parse(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
