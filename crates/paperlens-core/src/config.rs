use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable that overrides `backend.base_url`.
pub const API_BASE_ENV: &str = "PAPERLENS_API_BASE_URL";

fn default_fallback_host() -> String {
    "127.0.0.1".to_string()
}

fn default_fallback_port() -> u16 {
    8002
}

fn default_connect_timeout_ms() -> u64 {
    6000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Explicit API base, e.g. `https://papers.example.org`.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Host used when no base URL is configured.
    #[serde(default = "default_fallback_host")]
    pub fallback_host: String,
    #[serde(default = "default_fallback_port")]
    pub fallback_port: u16,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            fallback_host: default_fallback_host(),
            fallback_port: default_fallback_port(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl BackendConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

fn default_preview_tick_ms() -> u64 {
    20
}

fn default_preview_step_chars() -> usize {
    2
}

fn default_reveal_tick_ms() -> u64 {
    220
}

fn default_progress_tick_ms() -> u64 {
    40
}

fn default_progress_gain() -> f64 {
    0.12
}

fn default_progress_epsilon() -> f64 {
    0.25
}

/// Timing of the three pacing processes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    #[serde(default = "default_preview_tick_ms")]
    pub preview_tick_ms: u64,
    #[serde(default = "default_preview_step_chars")]
    pub preview_step_chars: usize,
    #[serde(default = "default_reveal_tick_ms")]
    pub reveal_tick_ms: u64,
    #[serde(default = "default_progress_tick_ms")]
    pub progress_tick_ms: u64,
    /// Fraction of the remaining gap closed per progress tick.
    #[serde(default = "default_progress_gain")]
    pub progress_gain: f64,
    #[serde(default = "default_progress_epsilon")]
    pub progress_epsilon: f64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            preview_tick_ms: default_preview_tick_ms(),
            preview_step_chars: default_preview_step_chars(),
            reveal_tick_ms: default_reveal_tick_ms(),
            progress_tick_ms: default_progress_tick_ms(),
            progress_gain: default_progress_gain(),
            progress_epsilon: default_progress_epsilon(),
        }
    }
}

impl PacingConfig {
    pub fn preview_tick(&self) -> Duration {
        Duration::from_millis(self.preview_tick_ms.max(1))
    }

    pub fn reveal_tick(&self) -> Duration {
        Duration::from_millis(self.reveal_tick_ms.max(1))
    }

    pub fn progress_tick(&self) -> Duration {
        Duration::from_millis(self.progress_tick_ms.max(1))
    }
}

fn default_max_segment_chars() -> usize {
    120
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmenterConfig {
    #[serde(default = "default_max_segment_chars")]
    pub max_segment_chars: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            max_segment_chars: default_max_segment_chars(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub segmenter: SegmenterConfig,
}

impl AppConfig {
    /// Apply `PAPERLENS_API_BASE_URL` when it is set and non-blank.
    pub fn apply_env(mut self) -> Self {
        if let Ok(base) = std::env::var(API_BASE_ENV) {
            self = self.with_base_url_override(Some(base));
        }
        self
    }

    pub fn with_base_url_override(mut self, base: Option<String>) -> Self {
        if let Some(base) = base.map(|b| b.trim().to_string()).filter(|b| !b.is_empty()) {
            self.backend.base_url = Some(base);
        }
        self
    }
}

/// Load configuration from a YAML file. A missing file yields defaults.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(AppConfig::default());
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(AppConfig::default());
    }
    serde_yaml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}
