use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Task kind on the wire: 0 for a list page, 1 for a detail page.
///
/// The numeric values are part of the queue record format shared with the
/// external task producers, so unknown values must fail decoding rather
/// than default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TaskKind {
    List,
    Detail,
}

impl From<TaskKind> for u8 {
    fn from(kind: TaskKind) -> u8 {
        match kind {
            TaskKind::List => 0,
            TaskKind::Detail => 1,
        }
    }
}

impl TryFrom<u8> for TaskKind {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TaskKind::List),
            1 => Ok(TaskKind::Detail),
            other => Err(format!("unknown task_type {other}, expected 0 or 1")),
        }
    }
}

/// A crawl task as it travels through the shared queue.
///
/// The record is self-contained: no separate lookup is needed to process
/// it. Any fields beyond the known set are caller metadata and are carried
/// verbatim across continuations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Page URL to fetch
    pub url: String,

    /// List page vs detail page; fully determines downstream routing
    pub task_type: TaskKind,

    /// Site the page belongs to, scopes the dedup namespace
    pub site_id: String,

    /// Parsing template for the site, opaque to the coordination core
    pub template_id: String,

    /// Destination collection for detail records
    pub table: String,

    /// Caller-defined metadata, copied as-is into derived tasks
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Task {
    /// Derive a new detail task for a URL discovered on a list page.
    /// The original task is never mutated.
    pub fn detail_from(&self, url: &str) -> Task {
        let mut task = self.clone();
        task.url = url.to_string();
        task.task_type = TaskKind::Detail;
        task
    }

    /// Derive the continuation task for the next list page.
    pub fn continuation(&self, next_page_url: &str) -> Task {
        let mut task = self.clone();
        task.url = next_page_url.to_string();
        task.task_type = TaskKind::List;
        task
    }
}

/// Parsed output of a list page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListPage {
    /// Candidate detail URLs found on the page
    #[serde(default)]
    pub detail_urls: Vec<String>,

    /// Link to the next list page, if the site paginates
    #[serde(default)]
    pub next_page_url: Option<String>,
}

/// Parsed output of a detail page, destined for the document store.
pub type DetailRecord = Map<String, Value>;
