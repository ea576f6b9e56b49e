use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::transport::retry::RetryPolicy;

/// Main configuration structure for the response core
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ResponseConfig {
    /// Observability settings
    pub observability: ObservabilityConfig,
    /// Persistence transport settings
    pub transport: TransportConfig,
    /// Lifecycle policy settings
    pub lifecycle: LifecycleConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level, used when RUST_LOG is unset
    pub log_level: String,
    /// Emit JSON lines instead of human-readable output
    pub json_logs: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TransportConfig {
    /// Retry behaviour for transient transport failures
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LifecycleConfig {
    /// Priority given to tasks created by an assignment
    pub task_priority_policy: TaskPriorityPolicy,
}

/// How an assignment picks the new task's priority when the request has none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriorityPolicy {
    /// Copy the incident's priority.
    #[default]
    InheritFromIncident,
    /// The supervisor must choose one.
    Explicit,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: true,
            },
            transport: TransportConfig {
                retry: RetryPolicy::default(),
            },
            lifecycle: LifecycleConfig {
                task_priority_policy: TaskPriorityPolicy::default(),
            },
        }
    }
}

impl ResponseConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (disaster-response.toml, .disaster-response-rc)
    /// 3. Environment variables (prefixed with DISASTER_RESPONSE_, `__` between sections)
    pub fn load() -> Result<Self> {
        let mut files = Vec::new();
        if Path::new("disaster-response.toml").exists() {
            files.push(File::with_name("disaster-response"));
        }
        if Path::new(".disaster-response-rc").exists() {
            files.push(File::with_name(".disaster-response-rc").format(config::FileFormat::Toml));
        }
        Self::build(files, Self::environment())
    }

    /// Load defaults overlaid with a single file, then the environment.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::from(path.as_ref()).format(config::FileFormat::Toml);
        Self::build(vec![file], Self::environment())
    }

    fn environment() -> Environment {
        Environment::with_prefix("DISASTER_RESPONSE")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    fn build(
        files: Vec<File<config::FileSourceFile, config::FileFormat>>,
        env: Environment,
    ) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);
        for file in files {
            builder = builder.add_source(file);
        }
        builder = builder.add_source(env);

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<ResponseConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = ResponseConfig::load_env_file();
        ResponseConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static ResponseConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let config = config()?;
    tracing::info!(
        task_priority_policy = ?config.lifecycle.task_priority_policy,
        retry_attempts = config.transport.retry.max_attempts,
        "Configuration loaded successfully"
    );
    Ok(())
}
