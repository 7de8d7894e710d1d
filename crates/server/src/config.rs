use std::path::{Path, PathBuf};

use events::BusConfig;
use orchestrator::ExecutorConfig;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};

pub const STUDIO_DIR: &str = ".scribe-studio";
pub const CONFIG_FILE: &str = "config.toml";
pub const DEFAULT_DB_NAME: &str = "studio.db";
pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Studio configuration stored in `.scribe-studio/config.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    pub project: ProjectSection,
    pub server: ServerSection,
    pub executor: ExecutorConfig,
    pub events: EventsSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSection {
    pub name: String,
}

impl Default for ProjectSection {
    fn default() -> Self {
        Self {
            name: "my-studio".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsSection {
    /// Buffered events per subscriber before the oldest are dropped
    pub channel_capacity: usize,
    /// Events replayed to late subscribers
    pub history_limit: usize,
}

impl Default for EventsSection {
    fn default() -> Self {
        let bus = BusConfig::default();
        Self {
            channel_capacity: bus.channel_capacity,
            history_limit: bus.history_limit,
        }
    }
}

impl EventsSection {
    pub fn bus_config(&self) -> BusConfig {
        BusConfig {
            channel_capacity: self.channel_capacity,
            history_limit: self.history_limit,
            ..BusConfig::default()
        }
    }
}

impl StudioConfig {
    pub fn studio_dir(root: &Path) -> PathBuf {
        root.join(STUDIO_DIR)
    }

    pub fn database_path(root: &Path) -> PathBuf {
        Self::studio_dir(root).join(DEFAULT_DB_NAME)
    }

    /// Read config from `root/.scribe-studio/config.toml`. A missing or
    /// unreadable file yields the defaults.
    pub async fn read(root: &Path) -> Self {
        let config_path = Self::studio_dir(root).join(CONFIG_FILE);

        if !config_path.exists() {
            debug!(path = %config_path.display(), "Config file does not exist, using defaults");
            return Self::default();
        }

        match fs::read_to_string(&config_path).await {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    debug!(path = %config_path.display(), "Config loaded successfully");
                    config
                }
                Err(e) => {
                    warn!(path = %config_path.display(), error = %e, "Failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                warn!(path = %config_path.display(), error = %e, "Failed to read config file, using defaults");
                Self::default()
            }
        }
    }

    pub async fn write(&self, root: &Path) -> std::io::Result<()> {
        let config_dir = Self::studio_dir(root);
        let config_path = config_dir.join(CONFIG_FILE);

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).await?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        fs::write(&config_path, content).await?;
        debug!(path = %config_path.display(), "Config saved successfully");

        Ok(())
    }
}
