//! Player configuration
//!
//! Read from a JSON file, then overridden by `MIXLINE_*` environment
//! variables. Missing fields take their defaults.

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engine::buffer::DEFAULT_SAMPLE_RATE;
use crate::engine::fade::FadeCurve;
use crate::error::{MixlineError, Result};

pub const ENV_SAMPLE_RATE: &str = "MIXLINE_SAMPLE_RATE";
pub const ENV_FADE_CURVE: &str = "MIXLINE_FADE_CURVE";
pub const ENV_SOURCE_DIR: &str = "MIXLINE_SOURCE_DIR";
pub const ENV_REMOTE_URL: &str = "MIXLINE_REMOTE_URL";

const MIN_SAMPLE_RATE: u32 = 8000;
const MAX_SAMPLE_RATE: u32 = 192_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Output rate; every resource is decoded to it
    pub sample_rate: u32,
    pub fade_curve: FadeCurve,
    /// Keep whole-resource decodes alongside trimmed ranges
    pub cache_decoded: bool,
    pub source_dir: Option<PathBuf>,
    /// Base URL of the audio API
    pub remote_url: Option<String>,
    pub fetch_timeout_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            fade_curve: FadeCurve::Linear,
            cache_decoded: true,
            source_dir: None,
            remote_url: None,
            fetch_timeout_ms: 10_000,
        }
    }
}

impl PlayerConfig {
    /// Load from a JSON file and validate
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PlayerConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `MIXLINE_*` overrides from the process environment
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(rate) = lookup(ENV_SAMPLE_RATE) {
            self.sample_rate = rate.trim().parse().map_err(|_| MixlineError::InvalidConfig {
                reason: format!("{} must be an integer, got '{}'", ENV_SAMPLE_RATE, rate),
            })?;
        }
        if let Some(curve) = lookup(ENV_FADE_CURVE) {
            self.fade_curve = curve.parse()?;
        }
        if let Some(dir) = lookup(ENV_SOURCE_DIR) {
            self.source_dir = Some(PathBuf::from(dir));
        }
        if let Some(url) = lookup(ENV_REMOTE_URL) {
            self.remote_url = Some(url);
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&self.sample_rate) {
            return Err(MixlineError::InvalidConfig {
                reason: format!(
                    "sample_rate {} outside {}..={}",
                    self.sample_rate, MIN_SAMPLE_RATE, MAX_SAMPLE_RATE
                ),
            });
        }
        if self.fetch_timeout_ms == 0 {
            return Err(MixlineError::InvalidConfig {
                reason: "fetch_timeout_ms must be positive".to_string(),
            });
        }
        if let Some(url) = &self.remote_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(MixlineError::InvalidConfig {
                    reason: format!("remote_url '{}' is not an http(s) URL", url),
                });
            }
        }
        Ok(())
    }
}
