//! Client settings, loaded from a JSON file or defaulted.

use std::path::{Path, PathBuf};

use canvas_core::SelectionBox;
use canvas_core::nudge::{NUDGE_MULTIPLIER, NUDGE_STEP};
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// View zoom (1.0 = 100%).
    pub zoom: f32,
    /// Arrow-key nudge distance.
    pub nudge_step: f32,
    /// Nudge multiplier while shift is held.
    pub nudge_multiplier: f32,
    /// Box the local session starts with.
    pub initial_box: SelectionBox,
    /// Fallback tracing filter when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            nudge_step: NUDGE_STEP,
            nudge_multiplier: NUDGE_MULTIPLIER,
            initial_box: SelectionBox::default(),
            log_filter: "info".to_string(),
        }
    }
}

impl ClientConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        Ok(config.sanitized())
    }

    /// Replace unusable values with their defaults.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !(self.zoom.is_finite() && self.zoom > 0.0) {
            tracing::warn!(zoom = self.zoom, "invalid zoom, using default");
            self.zoom = defaults.zoom;
        }
        if !(self.nudge_step.is_finite() && self.nudge_step > 0.0) {
            tracing::warn!(step = self.nudge_step, "invalid nudge step, using default");
            self.nudge_step = defaults.nudge_step;
        }
        if !(self.nudge_multiplier.is_finite() && self.nudge_multiplier >= 1.0) {
            self.nudge_multiplier = defaults.nudge_multiplier;
        }
        let b = self.initial_box;
        if !b.is_renderable() || b.width <= 0.0 || b.height <= 0.0 {
            tracing::warn!(?b, "invalid initial box, using default");
            self.initial_box = defaults.initial_box;
        }
        self
    }
}
