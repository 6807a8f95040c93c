use crate::announce::AnnouncementConfig;
use crate::app_dirs::AppDirs;
use crate::geo::DEFAULT_PACE_WINDOW;
use crate::runtime::TICK_RATE_MS;
use crate::session::SessionConfig;
use crate::simplify::SimplifyOptions;
use crate::source::TrackingOptions;
use crate::summary::SportType;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub sport: SportType,
    pub tracking: TrackingOptions,
    pub announcement: AnnouncementConfig,
    pub simplify: SimplifyOptions,
    pub pace_window: usize,
    /// Emit period when replaying a recorded route
    pub replay_interval_ms: u64,
    /// External TTS command line; `{lang}` is replaced by the language tag
    pub speech_command: Option<String>,
    /// Default `tracing` filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sport: SportType::default(),
            tracking: TrackingOptions::default(),
            announcement: AnnouncementConfig::default(),
            simplify: SimplifyOptions::default(),
            pace_window: DEFAULT_PACE_WINDOW,
            replay_interval_ms: 1000,
            speech_command: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            tracking: self.tracking,
            pace_window: self.pace_window,
            simplify: self.simplify,
            tick_ms: TICK_RATE_MS,
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("pacer_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        let Ok(bytes) = fs::read(&self.path) else {
            return Config::default();
        };
        match serde_json::from_slice::<Config>(&bytes) {
            Ok(cfg) => cfg,
            Err(err) => {
                warn!(path = %self.path.display(), %err, "ignoring unreadable config");
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).map_err(std::io::Error::from)?;
        fs::write(&self.path, data)
    }
}
