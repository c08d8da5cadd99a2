use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::fetch::PageFetcher;
use crate::metrics::{counter, CounterRegistry};
use crate::storage::{DocumentSink, QueueKeys, TaskQueue};
use crate::worker::engine::DedupEngine;
use crate::worker::task::{Task, TaskKind};
use crate::worker::templates::TemplateRegistry;

/// Worker role, decided once at startup and fixed for the worker's
/// lifetime. It selects which queue the worker reads from; it never
/// changes how a popped task is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Master,
    Slave,
}

impl Role {
    /// Parse the configured role flag: 1 = master, 0 = slave. Anything
    /// else is a configuration error, never a silent default.
    pub fn from_flag(flag: i64) -> Result<Role> {
        match flag {
            1 => Ok(Role::Master),
            0 => Ok(Role::Slave),
            other => Err(Error::Configuration(format!(
                "worker.role must be 0 (slave) or 1 (master), got {other}"
            ))),
        }
    }
}

/// The role-specific half of the worker. A master runs the dedup and
/// pagination engine and never writes documents; a slave writes documents
/// and never touches dedup state.
pub enum RolePipeline {
    Master(DedupEngine),
    Slave(Arc<dyn DocumentSink>),
}

impl RolePipeline {
    fn role(&self) -> Role {
        match self {
            RolePipeline::Master(_) => Role::Master,
            RolePipeline::Slave(_) => Role::Slave,
        }
    }
}

/// One crawl worker: pops raw task records from its role's input queue,
/// fetches and parses the page, and hands the result to the role
/// pipeline. Errors at the single-task granularity are logged and the
/// loop moves on; only startup problems abort the worker.
pub struct Worker {
    name: String,
    role: Role,
    keys: QueueKeys,
    queue: Arc<dyn TaskQueue>,
    templates: Arc<TemplateRegistry>,
    fetcher: Arc<dyn PageFetcher>,
    pipeline: RolePipeline,
    metrics: Arc<CounterRegistry>,
    pop_timeout: Duration,
}

impl Worker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: String,
        keys: QueueKeys,
        queue: Arc<dyn TaskQueue>,
        templates: Arc<TemplateRegistry>,
        fetcher: Arc<dyn PageFetcher>,
        pipeline: RolePipeline,
        metrics: Arc<CounterRegistry>,
        pop_timeout: Duration,
    ) -> Self {
        let role = pipeline.role();
        Self {
            name,
            role,
            keys,
            queue,
            templates,
            fetcher,
            pipeline,
            metrics,
            pop_timeout,
        }
    }

    fn input_key(&self) -> &str {
        match self.role {
            Role::Master => &self.keys.master,
            Role::Slave => &self.keys.detail,
        }
    }

    /// Run until the shutdown flag is raised.
    pub async fn run(&self, mut shutdown: watch::Receiver<Option<String>>) -> Result<()> {
        let input = self.input_key().to_string();
        info!(worker = %self.name, role = ?self.role, queue = %input, "worker loop started");

        loop {
            if shutdown.borrow().is_some() {
                break;
            }

            let popped = tokio::select! {
                res = self.queue.pop(&input, self.pop_timeout) => res,
                _ = shutdown.changed() => continue,
            };

            let payload = match popped {
                Ok(Some(payload)) => payload,
                Ok(None) => continue,
                Err(e) => {
                    warn!(worker = %self.name, error = %e, "queue pop failed");
                    self.metrics.incr(counter::LOG_WARNING);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };
            self.metrics.incr(counter::DEQUEUED);

            let task: Task = match serde_json::from_str(&payload) {
                Ok(task) => task,
                Err(e) => {
                    warn!(worker = %self.name, error = %e, "dropping malformed task record");
                    self.metrics.incr(counter::LOG_WARNING);
                    continue;
                }
            };

            if let Err(e) = self.handle_task(&task).await {
                // a single bad page must never crash the worker
                warn!(
                    worker = %self.name,
                    site_id = %task.site_id,
                    url = %task.url,
                    error = %e,
                    "task failed, continuing"
                );
                self.metrics.incr(counter::LOG_WARNING);
            }
        }

        info!(worker = %self.name, "worker loop stopped");
        Ok(())
    }

    pub(crate) async fn handle_task(&self, task: &Task) -> Result<()> {
        match (&self.pipeline, task.task_type) {
            (RolePipeline::Master(engine), TaskKind::List) => {
                let template = self.templates.resolve(&task.site_id, &task.template_id)?;
                let page = self.fetcher.fetch(&task.url).await?;
                let list = template.parse_list(&page.body)?;
                engine.process_list_page(task, &list).await
            }
            (RolePipeline::Slave(documents), TaskKind::Detail) => {
                let template = self.templates.resolve(&task.site_id, &task.template_id)?;
                let page = self.fetcher.fetch(&task.url).await?;
                let record = template.parse_detail(&page.body)?;
                documents.upsert(&task.table, &task.url, &record).await?;
                self.metrics.incr(counter::ITEM);
                Ok(())
            }
            (_, kind) => {
                warn!(
                    worker = %self.name,
                    role = ?self.role,
                    kind = ?kind,
                    url = %task.url,
                    "task kind does not match worker role, dropping"
                );
                self.metrics.incr(counter::LOG_WARNING);
                Ok(())
            }
        }
    }
}
