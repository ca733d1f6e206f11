//! Configuration for the Socratic client.
//!
//! Loads settings from `$SOCRATIC_CONFIG`, then `~/.config/socratic/config.toml`,
//! or uses defaults. `SOCRATIC_ENDPOINT` overrides the endpoint of whatever
//! was loaded.

use serde::{Deserialize, Serialize};
use socratic_shared::score::ScoreRates;
use socratic_shared::{
    DEFAULT_PASTE_THRESHOLD, PENALTY_PER_LINE, STREAM_IDLE_TIMEOUT_SECS, TYPING_REWARD,
    VALIDATE_TIMEOUT_SECS,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "SOCRATIC_CONFIG";

/// Environment variable overriding the mentor endpoint
pub const ENDPOINT_ENV: &str = "SOCRATIC_ENDPOINT";

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000";

/// Upper bound for `penalty_per_line` and `typing_reward`
pub const MAX_SCORE_RATE: f64 = 100.0;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocraticConfig {
    /// Base URL of the mentor backend
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Lines at which an insertion counts as a bulk paste
    #[serde(default = "default_paste_threshold")]
    pub paste_threshold: usize,

    #[serde(default = "default_penalty_per_line")]
    pub penalty_per_line: f64,

    #[serde(default = "default_typing_reward")]
    pub typing_reward: f64,

    /// Budget for one answer validation before failing open
    #[serde(default = "default_validate_timeout")]
    pub validate_timeout_secs: u64,

    /// Silence after which a streamed reply is given up
    #[serde(default = "default_stream_idle_timeout")]
    pub stream_idle_timeout_secs: u64,

    /// Target the backend's mock endpoints instead of the model-backed ones
    #[serde(default)]
    pub use_mock: bool,

    /// Where the score file lives; platform state dir when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_paste_threshold() -> usize {
    DEFAULT_PASTE_THRESHOLD
}

fn default_penalty_per_line() -> f64 {
    PENALTY_PER_LINE
}

fn default_typing_reward() -> f64 {
    TYPING_REWARD
}

fn default_validate_timeout() -> u64 {
    VALIDATE_TIMEOUT_SECS
}

fn default_stream_idle_timeout() -> u64 {
    STREAM_IDLE_TIMEOUT_SECS
}

fn valid_rate(rate: f64) -> bool {
    rate.is_finite() && (0.0..=MAX_SCORE_RATE).contains(&rate)
}

impl Default for SocraticConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            paste_threshold: default_paste_threshold(),
            penalty_per_line: default_penalty_per_line(),
            typing_reward: default_typing_reward(),
            validate_timeout_secs: default_validate_timeout(),
            stream_idle_timeout_secs: default_stream_idle_timeout(),
            use_mock: false,
            state_dir: None,
        }
    }
}

impl SocraticConfig {
    /// Default config file location: `$SOCRATIC_CONFIG`, else
    /// `<config dir>/socratic/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.is_empty() {
                return Some(PathBuf::from(path));
            }
        }
        dirs::config_dir().map(|d| d.join("socratic").join("config.toml"))
    }

    /// Load config from `explicit` or the default location, then apply the
    /// environment override. Never fails: problems fall back to defaults.
    pub fn load(explicit: Option<&Path>) -> Self {
        let path = explicit.map(Path::to_path_buf).or_else(Self::default_path);
        let mut config = match path {
            Some(path) if path.exists() => Self::load_from_path(&path).unwrap_or_else(|e| {
                warn!("Config {} unusable, using defaults: {}", path.display(), e);
                Self::default()
            }),
            Some(path) => {
                if explicit.is_some() {
                    warn!("Config {} not found, using defaults", path.display());
                } else {
                    debug!("No config at {}, using defaults", path.display());
                }
                Self::default()
            }
            None => Self::default(),
        };
        config.apply_endpoint_override(std::env::var(ENDPOINT_ENV).ok().as_deref());
        config
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: SocraticConfig = toml::from_str(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config.sanitized())
    }

    /// Replace score rates that are not finite or outside
    /// `0..=MAX_SCORE_RATE` with their defaults.
    pub fn sanitized(mut self) -> Self {
        if !valid_rate(self.penalty_per_line) {
            warn!(
                "penalty_per_line {} out of range, using {}",
                self.penalty_per_line, PENALTY_PER_LINE
            );
            self.penalty_per_line = PENALTY_PER_LINE;
        }
        if !valid_rate(self.typing_reward) {
            warn!(
                "typing_reward {} out of range, using {}",
                self.typing_reward, TYPING_REWARD
            );
            self.typing_reward = TYPING_REWARD;
        }
        self
    }

    /// Replace the endpoint when `endpoint` is a non-empty value.
    pub fn apply_endpoint_override(&mut self, endpoint: Option<&str>) {
        if let Some(url) = endpoint.map(str::trim).filter(|u| !u.is_empty()) {
            debug!("Endpoint overridden to {}", url);
            self.endpoint = url.trim_end_matches('/').to_string();
        }
    }

    pub fn score_rates(&self) -> ScoreRates {
        ScoreRates {
            penalty_per_line: self.penalty_per_line,
            typing_reward: self.typing_reward,
        }
    }

    pub fn validate_timeout(&self) -> Duration {
        Duration::from_secs(self.validate_timeout_secs)
    }

    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_idle_timeout_secs)
    }

    /// Resolved state directory: configured, else `$XDG_STATE_HOME/socratic`,
    /// else `~/.local/state/socratic`, else `./.socratic`.
    pub fn state_dir(&self) -> PathBuf {
        if let Some(dir) = &self.state_dir {
            return dir.clone();
        }
        dirs::state_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("state")))
            .map(|d| d.join("socratic"))
            .unwrap_or_else(|| PathBuf::from(".socratic"))
    }
}
