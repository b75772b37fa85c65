use crate::engine::{EngineSettings, DEFAULT_ANGER_THRESHOLD};
use crate::session::{SessionSettings, DEFAULT_PREDICTION_DELAY};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the per-user and per-project config directory
const CONFIG_DIR: &str = ".arthur";

/// Engine tunables
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub anger_threshold: Option<u32>,
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Where templates come from
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct TemplatesConfig {
    /// YAML template file; the built-in store is used when unset
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Console transport settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    #[serde(default = "default_prediction_delay_ms")]
    pub prediction_delay_ms: u64,
    #[serde(default = "default_true")]
    pub history_file: bool,
}

fn default_prediction_delay_ms() -> u64 {
    DEFAULT_PREDICTION_DELAY.as_millis() as u64
}

fn default_true() -> bool {
    true
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            prediction_delay_ms: default_prediction_delay_ms(),
            history_file: default_true(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct LoggingConfig {
    /// tracing-subscriber filter directive, e.g. "arthur=debug"
    #[serde(default)]
    pub filter: Option<String>,
}

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from default paths
    /// Priority: local (.arthur/config.local.toml) > project (.arthur/config.toml) > user (~/.arthur/config.toml)
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(CONFIG_DIR).join("config.toml");
            if user_config.exists() {
                config.merge(Self::load_from(&user_config)?);
            }
        }

        let project_config = Path::new(CONFIG_DIR).join("config.toml");
        if project_config.exists() {
            config.merge(Self::load_from(&project_config)?);
        }

        // Should be gitignored
        let local_config = Path::new(CONFIG_DIR).join("config.local.toml");
        if local_config.exists() {
            config.merge(Self::load_from(&local_config)?);
        }

        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;

        // Template paths are relative to the file that names them
        if let (Some(templates), Some(dir)) = (config.templates.path.as_mut(), path.parent()) {
            if templates.is_relative() {
                *templates = dir.join(&*templates);
            }
        }
        Ok(config)
    }

    /// Merge another config into this one (other takes priority).
    /// Optional values override only when set; transport settings are
    /// always taken from the later file.
    pub fn merge(&mut self, other: Config) {
        if other.engine.anger_threshold.is_some() {
            self.engine.anger_threshold = other.engine.anger_threshold;
        }
        if other.engine.seed.is_some() {
            self.engine.seed = other.engine.seed;
        }
        if other.templates.path.is_some() {
            self.templates.path = other.templates.path;
        }
        self.transport = other.transport;
        if other.logging.filter.is_some() {
            self.logging.filter = other.logging.filter;
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            engine: EngineSettings {
                anger_threshold: self
                    .engine
                    .anger_threshold
                    .unwrap_or(DEFAULT_ANGER_THRESHOLD),
                seed: self.engine.seed,
            },
            prediction_delay: Duration::from_millis(self.transport.prediction_delay_ms),
        }
    }

    /// REPL history location (~/.arthur/history), if enabled
    pub fn history_path(&self) -> Option<PathBuf> {
        if !self.transport.history_file {
            return None;
        }
        dirs::home_dir().map(|home| home.join(CONFIG_DIR).join("history"))
    }
}
