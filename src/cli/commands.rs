use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Map;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::cli::config::WorkerConfig;
use crate::fetch::HttpFetcher;
use crate::metrics::{CounterRegistry, InfluxSink, Reporter};
use crate::proxy::ProxyPool;
use crate::storage::{DocumentStore, QueueKeys, RedisDedup, RedisQueue, TaskQueue};
use crate::worker::{
    DedupEngine, JsonTemplate, PaginationPolicy, Role, RolePipeline, Task, TaskKind,
    TemplateRegistry, Worker,
};

fn load_config(profile: Option<&str>) -> Result<WorkerConfig> {
    match profile {
        Some(profile) => WorkerConfig::load_profile(profile)
            .context(format!("Failed to load profile: {}", profile)),
        None => WorkerConfig::load_default(),
    }
}

/// Site templates are registered here at startup. The JSON template is
/// the fallback for sites whose endpoints already serve the expected
/// shape.
fn build_templates() -> TemplateRegistry {
    let mut registry = TemplateRegistry::new();
    registry.set_fallback(Arc::new(JsonTemplate));
    registry
}

/// Start a worker and run it until a shutdown signal arrives.
pub async fn run(profile: Option<String>, role_override: Option<i64>) -> Result<()> {
    let mut config = load_config(profile.as_deref())?;
    if let Some(role) = role_override {
        config.worker.role = role;
    }

    // role is fixed for the worker's lifetime; an invalid flag is fatal
    let role = Role::from_flag(config.worker.role)?;
    info!(worker = %config.worker.name, role = ?role, "starting worker");

    let metrics = Arc::new(CounterRegistry::new());
    let queue: Arc<RedisQueue> = Arc::new(RedisQueue::connect(&config.queue.redis_url).await?);
    let keys = QueueKeys::from_settings(&config.queue, &config.worker.name);

    let pipeline = match role {
        Role::Master => {
            let dedup = Arc::new(RedisDedup::connect(&config.dedup).await?);
            let engine = DedupEngine::new(
                queue.clone(),
                dedup,
                keys.clone(),
                PaginationPolicy::from_scan_all(config.worker.scan_all),
                metrics.clone(),
            );
            RolePipeline::Master(engine)
        }
        Role::Slave => {
            let documents = Arc::new(DocumentStore::connect(&config.documents).await?);
            RolePipeline::Slave(documents)
        }
    };

    let proxy = if config.proxy.enabled {
        Some(Arc::new(ProxyPool::new(queue.clone(), &config.proxy)))
    } else {
        None
    };
    let fetcher = Arc::new(HttpFetcher::new(proxy, metrics.clone())?);

    let worker = Worker::new(
        config.worker.name.clone(),
        keys,
        queue,
        Arc::new(build_templates()),
        fetcher,
        pipeline,
        metrics.clone(),
        Duration::from_secs(config.worker.pop_timeout),
    );

    let sink = InfluxSink::new(&config.metrics)?;
    let reporter = Reporter::new(
        metrics,
        sink,
        config.worker.name.clone(),
        Duration::from_secs(config.metrics.interval),
    );

    let (stop_tx, stop_rx) = watch::channel::<Option<String>>(None);
    let mut reporter_task = tokio::spawn(reporter.run(stop_rx.clone()));
    let worker_task = tokio::spawn(async move { worker.run(stop_rx).await });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received, draining");
            let _ = stop_tx.send(Some("shutdown signal received".to_string()));
        }
        res = &mut reporter_task => {
            // the reporter only returns early when its sink is broken
            warn!("metrics reporter exited, stopping worker");
            let _ = stop_tx.send(Some("metrics reporter failed".to_string()));
            worker_task.await.context("worker task panicked")??;
            res.context("metrics reporter task panicked")??;
            return Ok(());
        }
    }

    worker_task.await.context("worker task panicked")??;
    reporter_task.await.context("metrics reporter task panicked")??;

    Ok(())
}

/// Push a seed list task onto the master queue.
pub async fn seed(
    url: String,
    site_id: String,
    template_id: String,
    table: String,
    profile: Option<String>,
) -> Result<()> {
    url::Url::parse(&url).context("seed url must be a valid absolute URL")?;

    let config = load_config(profile.as_deref())?;
    let queue = RedisQueue::connect(&config.queue.redis_url).await?;
    let keys = QueueKeys::from_settings(&config.queue, &config.worker.name);

    let task = Task {
        url,
        task_type: TaskKind::List,
        site_id,
        template_id,
        table,
        extra: Map::new(),
    };

    queue
        .push(&keys.master, &serde_json::to_string(&task)?)
        .await?;

    info!(queue = %keys.master, url = %task.url, "seed task enqueued");

    Ok(())
}

/// List all available configuration profiles
pub async fn list_profiles() -> Result<()> {
    let profiles = WorkerConfig::list_profiles()?;

    println!("Available configuration profiles:");
    for profile in profiles {
        println!("  - {}", profile);
    }

    Ok(())
}

/// Show the default configuration
pub async fn show_config() -> Result<()> {
    let config = WorkerConfig::load_default()?;
    println!("{:#?}", config);
    Ok(())
}

/// Manage a specific configuration profile
pub async fn manage_profile(profile_name: String) -> Result<()> {
    match WorkerConfig::load_profile(&profile_name) {
        Ok(config) => {
            println!("Profile: {}", profile_name);
            println!("{:#?}", config);
        }
        Err(_) => {
            warn!("Profile '{}' does not exist. Creating a default profile.", profile_name);
            let config = WorkerConfig::default();
            config.save_as_profile(&profile_name)?;
            println!("Created default profile: {}", profile_name);
        }
    }

    Ok(())
}
