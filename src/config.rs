//! Timing configuration for the transition orchestrator.
//!
//! Settings are read from `bookflip.toml` and layered file → environment → CLI.
//!
//! # Configuration File Format
//!
//! ```toml
//! [timings]
//! scale_transition_duration_ms = 300
//! cover_flip_duration_ms = 400
//! minimum_wait_after_lift_ms = 1000
//! result_display_duration_ms = 1000
//!
//! [demo]
//! rotation_ms = 600
//! lift_ms = 400
//! save_delay_ms = 50
//! ```
//!
//! # Environment Overrides
//!
//! | Variable                      | Field                          |
//! |-------------------------------|--------------------------------|
//! | `BOOKFLIP_SCALE_TRANSITION_MS` | `scale_transition_duration_ms` |
//! | `BOOKFLIP_COVER_FLIP_MS`       | `cover_flip_duration_ms`       |
//! | `BOOKFLIP_MINIMUM_WAIT_MS`     | `minimum_wait_after_lift_ms`   |
//! | `BOOKFLIP_RESULT_DISPLAY_MS`   | `result_display_duration_ms`   |

use crate::phase::Dwell;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name looked up in the config directory.
pub const CONFIG_FILE: &str = "bookflip.toml";

pub const ENV_SCALE_TRANSITION: &str = "BOOKFLIP_SCALE_TRANSITION_MS";
pub const ENV_COVER_FLIP: &str = "BOOKFLIP_COVER_FLIP_MS";
pub const ENV_MINIMUM_WAIT: &str = "BOOKFLIP_MINIMUM_WAIT_MS";
pub const ENV_RESULT_DISPLAY: &str = "BOOKFLIP_RESULT_DISPLAY_MS";

/// Durations consumed by the dwell-timer edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionTimings {
    #[serde(default = "default_scale_transition")]
    pub scale_transition_duration_ms: u64,
    #[serde(default = "default_cover_flip")]
    pub cover_flip_duration_ms: u64,
    #[serde(default = "default_minimum_wait")]
    pub minimum_wait_after_lift_ms: u64,
    #[serde(default = "default_result_display")]
    pub result_display_duration_ms: u64,
}

fn default_scale_transition() -> u64 {
    300
}

fn default_cover_flip() -> u64 {
    400
}

fn default_minimum_wait() -> u64 {
    1000
}

fn default_result_display() -> u64 {
    1000
}

impl Default for TransitionTimings {
    fn default() -> Self {
        Self {
            scale_transition_duration_ms: default_scale_transition(),
            cover_flip_duration_ms: default_cover_flip(),
            minimum_wait_after_lift_ms: default_minimum_wait(),
            result_display_duration_ms: default_result_display(),
        }
    }
}

impl TransitionTimings {
    /// Every dwell set to the same duration. Handy for tests and demos.
    pub fn uniform(ms: u64) -> Self {
        Self {
            scale_transition_duration_ms: ms,
            cover_flip_duration_ms: ms,
            minimum_wait_after_lift_ms: ms,
            result_display_duration_ms: ms,
        }
    }

    pub fn scale_transition(&self) -> Duration {
        Duration::from_millis(self.scale_transition_duration_ms)
    }

    pub fn cover_flip(&self) -> Duration {
        Duration::from_millis(self.cover_flip_duration_ms)
    }

    pub fn minimum_wait(&self) -> Duration {
        Duration::from_millis(self.minimum_wait_after_lift_ms)
    }

    pub fn result_display(&self) -> Duration {
        Duration::from_millis(self.result_display_duration_ms)
    }

    /// Duration of the timer that ends a dwell edge.
    pub fn dwell(&self, dwell: Dwell) -> Duration {
        match dwell {
            Dwell::ScaleTransition => self.scale_transition(),
            Dwell::CoverFlip => self.cover_flip(),
            Dwell::MinimumWait => self.minimum_wait(),
            Dwell::ResultDisplay => self.result_display(),
        }
    }

    /// Sum of all dwell timers on the success path (scale and cover run twice).
    pub fn total_dwell(&self) -> Duration {
        self.scale_transition() * 2
            + self.cover_flip() * 2
            + self.minimum_wait()
            + self.result_display()
    }

    /// Apply overrides from any variable lookup.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let fields = [
            (ENV_SCALE_TRANSITION, &mut self.scale_transition_duration_ms),
            (ENV_COVER_FLIP, &mut self.cover_flip_duration_ms),
            (ENV_MINIMUM_WAIT, &mut self.minimum_wait_after_lift_ms),
            (ENV_RESULT_DISPLAY, &mut self.result_display_duration_ms),
        ];
        for (key, field) in fields {
            if let Some(raw) = lookup(key) {
                *field = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid value '{}' for {}", raw, key))?;
            }
        }
        Ok(())
    }

    /// Validate the timings and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let fields = [
            ("scale_transition_duration_ms", self.scale_transition_duration_ms),
            ("cover_flip_duration_ms", self.cover_flip_duration_ms),
            ("minimum_wait_after_lift_ms", self.minimum_wait_after_lift_ms),
            ("result_display_duration_ms", self.result_display_duration_ms),
        ];
        for (name, value) in fields {
            if value == 0 {
                warnings.push(format!(
                    "{} is 0: the phase will be skipped over on the next tick",
                    name
                ));
            }
        }
        if self.minimum_wait_after_lift_ms < self.cover_flip_duration_ms {
            warnings.push(format!(
                "minimum_wait_after_lift_ms ({}) is shorter than cover_flip_duration_ms ({})",
                self.minimum_wait_after_lift_ms, self.cover_flip_duration_ms
            ));
        }
        warnings
    }
}

/// CLI-level timing overrides. `None` leaves the lower layer in place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimingOverrides {
    pub scale_transition_ms: Option<u64>,
    pub cover_flip_ms: Option<u64>,
    pub minimum_wait_ms: Option<u64>,
    pub result_display_ms: Option<u64>,
}

impl TimingOverrides {
    pub fn apply_to(&self, timings: &mut TransitionTimings) {
        if let Some(ms) = self.scale_transition_ms {
            timings.scale_transition_duration_ms = ms;
        }
        if let Some(ms) = self.cover_flip_ms {
            timings.cover_flip_duration_ms = ms;
        }
        if let Some(ms) = self.minimum_wait_ms {
            timings.minimum_wait_after_lift_ms = ms;
        }
        if let Some(ms) = self.result_display_ms {
            timings.result_display_duration_ms = ms;
        }
    }
}

/// Settings for the simulated layers and save used by the demo binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoConfig {
    #[serde(default = "default_rotation")]
    pub rotation_ms: u64,
    #[serde(default = "default_lift")]
    pub lift_ms: u64,
    #[serde(default = "default_save_delay")]
    pub save_delay_ms: u64,
}

fn default_rotation() -> u64 {
    600
}

fn default_lift() -> u64 {
    400
}

fn default_save_delay() -> u64 {
    50
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            rotation_ms: default_rotation(),
            lift_ms: default_lift(),
            save_delay_ms: default_save_delay(),
        }
    }
}

impl DemoConfig {
    pub fn rotation(&self) -> Duration {
        Duration::from_millis(self.rotation_ms)
    }

    pub fn lift(&self) -> Duration {
        Duration::from_millis(self.lift_ms)
    }

    pub fn save_delay(&self) -> Duration {
        Duration::from_millis(self.save_delay_ms)
    }

    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.rotation_ms == 0 || self.lift_ms == 0 {
            warnings.push("demo rotation_ms and lift_ms should be non-zero".to_string());
        }
        warnings
    }
}

/// The complete bookflip.toml structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookflipToml {
    #[serde(default)]
    pub timings: TransitionTimings,
    #[serde(default)]
    pub demo: DemoConfig,
}

impl BookflipToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse bookflip.toml")
    }

    /// Load `bookflip.toml` from `dir`, or defaults if it does not exist.
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize bookflip.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Vec<String> {
        let mut warnings = self.timings.validate();
        warnings.extend(self.demo.validate());
        warnings
    }
}

/// Configuration merged from file, environment, and CLI.
#[derive(Debug, Clone)]
pub struct BookflipConfig {
    /// Directory the config file was looked up in
    pub config_dir: PathBuf,
    /// Parsed bookflip.toml (defaults when absent)
    pub toml: BookflipToml,
    /// CLI overrides for the timings
    pub overrides: TimingOverrides,
}

impl BookflipConfig {
    pub fn new(config_dir: PathBuf) -> Result<Self> {
        let toml = BookflipToml::load_or_default(&config_dir)?;
        Ok(Self {
            config_dir,
            toml,
            overrides: TimingOverrides::default(),
        })
    }

    pub fn with_overrides(config_dir: PathBuf, overrides: TimingOverrides) -> Result<Self> {
        let mut config = Self::new(config_dir)?;
        config.overrides = overrides;
        Ok(config)
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    /// Effective timings (file → env → CLI).
    pub fn timings(&self) -> Result<TransitionTimings> {
        self.timings_with_env(|key| std::env::var(key).ok())
    }

    pub fn timings_with_env(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<TransitionTimings> {
        let mut timings = self.toml.timings;
        timings.apply_env_from(lookup)?;
        self.overrides.apply_to(&mut timings);
        Ok(timings)
    }

    pub fn demo(&self) -> DemoConfig {
        self.toml.demo
    }
}
