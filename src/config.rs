use anyhow::Result;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure for casewarden
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CasewardenConfig {
    /// Logging settings
    pub observability: ObservabilityConfig,
    /// Transition behaviour
    pub workflow: WorkflowConfig,
    /// Grant lookup caching
    pub permissions: PermissionCacheConfig,
    /// Workspace snapshot location
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level or EnvFilter directive
    pub log_level: String,
    /// Emit JSON lines instead of compact text
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Language of user-facing validation messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Ru,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Notify the sink when a case is set to the status it already has
    pub notify_on_reapply: bool,
    /// How long a transition waits for another one on the same case
    pub lock_timeout_ms: u64,
    /// Locale for response messages
    pub locale: Locale,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            notify_on_reapply: true,
            lock_timeout_ms: 5_000,
            locale: Locale::En,
        }
    }
}

impl WorkflowConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PermissionCacheConfig {
    /// Wrap the grant lookup in a cache
    pub cache_enabled: bool,
    /// Seconds a resolved grant stays valid
    pub cache_ttl_seconds: u64,
    /// Maximum cached (actor, project) pairs
    pub cache_capacity: u64,
}

impl Default for PermissionCacheConfig {
    fn default() -> Self {
        Self {
            cache_enabled: false,
            cache_ttl_seconds: 30,
            cache_capacity: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON workspace snapshot used by the CLI
    pub state_file: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            state_file: ".casewarden/workspace.json".to_string(),
        }
    }
}

impl CasewardenConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (casewarden.toml, .casewarden-rc)
    /// 3. Environment variables (prefixed with CASEWARDEN_, sections split on `__`)
    pub fn load() -> Result<Self> {
        let mut builder = Config::builder();

        if Path::new("casewarden.toml").exists() {
            builder = builder.add_source(File::with_name("casewarden"));
        }

        if Path::new(".casewarden-rc").exists() {
            builder = builder.add_source(
                File::with_name(".casewarden-rc").format(FileFormat::Toml),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix("CASEWARDEN")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

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
static CONFIG: std::sync::LazyLock<Result<CasewardenConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = CasewardenConfig::load_env_file();
        CasewardenConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static CasewardenConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}
