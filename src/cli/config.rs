use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WorkerConfig {
    pub worker: WorkerSettings,
    pub queue: QueueSettings,
    pub dedup: DedupSettings,
    pub proxy: ProxySettings,
    pub metrics: MetricsSettings,
    pub documents: DocumentSettings,
}

/// Worker identity and role
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WorkerSettings {
    /// Worker name, substituted into the queue key templates and used as
    /// the metrics tag
    pub name: String,

    /// Role flag: 1 = master, 0 = slave. Validated at startup; any other
    /// value fails configuration.
    pub role: i64,

    /// Pagination policy: true scans every list page to the end, false
    /// stops once a page yields no new detail URLs
    pub scan_all: bool,

    /// Blocking-pop window on the input queue, in seconds
    pub pop_timeout: u64,
}

/// Shared task-queue service settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QueueSettings {
    pub redis_url: String,

    /// Master input queue template, `{name}` is the worker name
    pub master_key: String,

    /// Slave input queue template
    pub detail_key: String,
}

/// Dedup store settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DedupSettings {
    pub redis_url: String,

    /// Judge hash key template, `{site_id}` is the task's site
    pub judge_key: String,
}

/// Proxy pool settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProxySettings {
    pub enabled: bool,

    /// Queue key the external producer refills
    pub pool_key: String,

    /// Initial delay between polls of an empty pool, in seconds
    pub poll_interval: u64,

    /// Deadline for waiting on an empty pool, in seconds
    pub max_wait: u64,
}

/// Time-series sink settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MetricsSettings {
    pub influx_url: String,
    pub database: String,

    /// Reporting interval in seconds
    pub interval: u64,
}

/// Document store settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DocumentSettings {
    pub mongo_uri: String,
    pub database: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker: WorkerSettings {
                name: "spider".to_string(),
                role: 0,
                scan_all: false,
                pop_timeout: 5,
            },
            queue: QueueSettings {
                redis_url: "redis://localhost:6379/1".to_string(),
                master_key: "{name}:master_urls".to_string(),
                detail_key: "{name}:detail_urls".to_string(),
            },
            dedup: DedupSettings {
                redis_url: "redis://localhost:6379/1".to_string(),
                judge_key: "spider:judge_url:{site_id}".to_string(),
            },
            proxy: ProxySettings {
                enabled: false,
                pool_key: "IP_PROXY".to_string(),
                poll_interval: 10,
                max_wait: 600,
            },
            metrics: MetricsSettings {
                influx_url: "http://127.0.0.1:8086".to_string(),
                database: "spider".to_string(),
                interval: 60,
            },
            documents: DocumentSettings {
                mongo_uri: "mongodb://localhost:27017".to_string(),
                database: "spider".to_string(),
            },
        }
    }
}

impl WorkerConfig {
    /// Get the path to the config directory
    fn config_dir() -> PathBuf {
        let mut path = if let Some(proj_dirs) =
            directories::ProjectDirs::from("com", "fleet-crawler", "fleet-crawler")
        {
            proj_dirs.config_dir().to_path_buf()
        } else {
            PathBuf::from("./config")
        };

        // Create the workers directory if it doesn't exist
        path.push("workers");
        if !path.exists() {
            if let Err(e) = fs::create_dir_all(&path) {
                error!("Failed to create config directory: {}", e);
            }
        }

        // Move back up to the config directory
        path.pop();
        path
    }

    /// Load the default configuration
    pub fn load_default() -> Result<Self> {
        let config_dir = Self::config_dir();
        let config_path = config_dir.join("default.yaml");

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            info!("Default configuration not found. Creating...");
            let config = Self::default();
            config.save_as_default()?;
            Ok(config)
        }
    }

    /// Load a configuration profile
    pub fn load_profile(profile: &str) -> Result<Self> {
        let config_dir = Self::config_dir();
        let profile_path = config_dir.join("workers").join(format!("{}.yaml", profile));

        if profile_path.exists() {
            Self::load_from_file(&profile_path)
        } else {
            anyhow::bail!("Profile '{}' not found", profile)
        }
    }

    /// Load configuration from a file
    fn load_from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from: {}", path.display());
        let contents = fs::read_to_string(path)
            .context(format!("Failed to read configuration file: {}", path.display()))?;

        let config: Self = serde_yaml::from_str(&contents)
            .context(format!("Failed to parse configuration file: {}", path.display()))?;

        Ok(config)
    }

    /// Save the configuration as the default
    pub fn save_as_default(&self) -> Result<()> {
        let config_dir = Self::config_dir();
        let config_path = config_dir.join("default.yaml");

        self.save_to_file(&config_path)
    }

    /// Save the configuration as a profile
    pub fn save_as_profile(&self, profile: &str) -> Result<()> {
        let config_dir = Self::config_dir();
        let workers_dir = config_dir.join("workers");

        if !workers_dir.exists() {
            fs::create_dir_all(&workers_dir)
                .context(format!("Failed to create workers directory: {}", workers_dir.display()))?;
        }

        let profile_path = workers_dir.join(format!("{}.yaml", profile));
        self.save_to_file(&profile_path)
    }

    /// Save the configuration to a file
    fn save_to_file(&self, path: &Path) -> Result<()> {
        debug!("Saving configuration to: {}", path.display());

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)
                    .context(format!("Failed to create directory: {}", parent.display()))?;
            }
        }

        let contents = serde_yaml::to_string(self).context("Failed to serialize configuration")?;

        fs::write(path, contents)
            .context(format!("Failed to write configuration file: {}", path.display()))?;

        Ok(())
    }

    /// List all available profiles
    pub fn list_profiles() -> Result<Vec<String>> {
        let config_dir = Self::config_dir();
        let workers_dir = config_dir.join("workers");

        if !workers_dir.exists() {
            return Ok(vec![]);
        }

        let mut profiles = Vec::new();

        for entry in fs::read_dir(workers_dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.is_file() && path.extension().map_or(false, |ext| ext == "yaml") {
                if let Some(stem) = path.file_stem() {
                    if let Some(name) = stem.to_str() {
                        profiles.push(name.to_string());
                    }
                }
            }
        }

        Ok(profiles)
    }
}
