#![forbid(unsafe_code)]

//! Calculator configuration as data.
//!
//! Every tunable lives in [`CalcConfig`], loadable from TOML or JSON. Every
//! section is `#[serde(default)]`, so a file only names what it changes.
//!
//! ```toml
//! [gesture]
//! touch_slop = 20.0
//! long_press_timeout_ms = 500
//!
//! [history]
//! max_entries = 200
//!
//! [session]
//! angle_unit = "deg"
//! numeral_base = "hex"
//!
//! [engine]
//! program = "calcpp-jscl"
//! args = ["--quiet"]
//! ```
//!
//! Loading functions validate the result and fail with
//! [`ConfigError::Validation`] listing every problem found.

use std::path::Path;
use std::time::Duration;

use calcpp_core::GestureConfig;
use calcpp_engine::{AngleUnit, NumeralBase};
use serde::{Deserialize, Serialize};

use crate::channel::ComputeChannel;
use crate::history::HistoryConfig;
use crate::orchestrator::Calculator;
use crate::worker_process::ProcessLoader;

// ---------------------------------------------------------------------------
// Top-level CalcConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalcConfig {
    pub gesture: GestureSection,
    pub history: HistorySection,
    pub session: SessionSection,
    pub engine: EngineSection,
}

/// Keypad gesture thresholds. Times are in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureSection {
    pub touch_slop: f64,
    pub min_swipe_time_ms: u64,
    pub max_swipe_time_ms: u64,
    pub long_press_timeout_ms: u64,
    pub repeat_initial_delay_ms: u64,
    pub repeat_min_delay_ms: u64,
    pub repeat_delay_factor: f64,
}

impl Default for GestureSection {
    fn default() -> Self {
        let g = GestureConfig::default();
        Self {
            touch_slop: g.touch_slop,
            min_swipe_time_ms: millis(g.min_swipe_time),
            max_swipe_time_ms: millis(g.max_swipe_time),
            long_press_timeout_ms: millis(g.long_press_timeout),
            repeat_initial_delay_ms: millis(g.repeat_initial_delay),
            repeat_min_delay_ms: millis(g.repeat_min_delay),
            repeat_delay_factor: g.repeat_delay_factor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySection {
    pub max_entries: usize,
}

impl Default for HistorySection {
    fn default() -> Self {
        Self {
            max_entries: HistoryConfig::default().max_entries,
        }
    }
}

/// Units a new session starts with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub angle_unit: AngleUnit,
    pub numeral_base: NumeralBase,
}

/// External engine executable. Absent `program` means the host links an
/// engine in-process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub program: Option<String>,
    pub args: Vec<String>,
}

impl EngineSection {
    /// Loader for the configured executable, if any.
    #[must_use]
    pub fn process_loader(&self) -> Option<ProcessLoader> {
        self.program
            .as_ref()
            .map(|program| ProcessLoader::new(program.clone()).args(self.args.iter().cloned()))
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// Loading and validation
// ---------------------------------------------------------------------------

impl CalcConfig {
    /// Load from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.checked()
    }

    /// Load from a TOML file on disk.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        tracing::debug!(target: "calcpp.config", path = %path.display(), "loading config");
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.checked()
    }

    /// Load from a JSON file on disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Check every parameter. An empty list means the config is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let g = &self.gesture;

        if !(g.touch_slop.is_finite() && g.touch_slop >= 0.0) {
            errors.push(format!("gesture.touch_slop must be >= 0, got {}", g.touch_slop));
        }
        if g.min_swipe_time_ms > g.max_swipe_time_ms {
            errors.push(format!(
                "gesture.min_swipe_time_ms ({}) must not exceed gesture.max_swipe_time_ms ({})",
                g.min_swipe_time_ms, g.max_swipe_time_ms
            ));
        }
        if g.repeat_min_delay_ms == 0 {
            errors.push("gesture.repeat_min_delay_ms must be > 0".into());
        }
        if g.repeat_initial_delay_ms < g.repeat_min_delay_ms {
            errors.push(format!(
                "gesture.repeat_initial_delay_ms ({}) must be >= gesture.repeat_min_delay_ms ({})",
                g.repeat_initial_delay_ms, g.repeat_min_delay_ms
            ));
        }
        if !(g.repeat_delay_factor > 0.0 && g.repeat_delay_factor <= 1.0) {
            errors.push(format!(
                "gesture.repeat_delay_factor must be in (0, 1], got {}",
                g.repeat_delay_factor
            ));
        }
        if self.history.max_entries == 0 {
            errors.push("history.max_entries must be > 0".into());
        }
        if let Some(program) = &self.engine.program
            && program.trim().is_empty()
        {
            errors.push("engine.program must not be empty".into());
        }

        errors
    }

    fn checked(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            tracing::warn!(target: "calcpp.config", problems = errors.len(), "invalid config");
            Err(ConfigError::Validation(errors))
        }
    }

    // --- conversions ---

    #[must_use]
    pub fn to_gesture_config(&self) -> GestureConfig {
        let g = &self.gesture;
        GestureConfig {
            touch_slop: g.touch_slop,
            min_swipe_time: Duration::from_millis(g.min_swipe_time_ms),
            max_swipe_time: Duration::from_millis(g.max_swipe_time_ms),
            long_press_timeout: Duration::from_millis(g.long_press_timeout_ms),
            repeat_initial_delay: Duration::from_millis(g.repeat_initial_delay_ms),
            repeat_min_delay: Duration::from_millis(g.repeat_min_delay_ms),
            repeat_delay_factor: g.repeat_delay_factor,
        }
    }

    #[must_use]
    pub fn to_history_config(&self) -> HistoryConfig {
        HistoryConfig::new(self.history.max_entries)
    }

    /// A calculator over `channel` with this config's history limit and
    /// session units.
    #[must_use]
    pub fn build_calculator(&self, channel: ComputeChannel) -> Calculator {
        Calculator::new(channel)
            .with_history(self.to_history_config())
            .with_units(self.session.angle_unit, self.session.numeral_base)
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur when loading a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("validation errors: {}", .0.join("; "))]
    Validation(Vec<String>),
}
