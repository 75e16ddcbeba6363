//! Configuration file support for scrollshot.
//!
//! This module handles loading and validating user settings from the
//! configuration file located at `~/.config/scrollshot/config.toml`.
//! Settings include provider pacing, scroll synchronization timing, the
//! delivery ladder, and save locations.
//!
//! If no config file exists, sensible defaults are used automatically.

pub mod enums;
pub mod types;

// Re-export commonly used types at module level
pub use enums::{BusyMode, StageName};
pub use types::{CaptureConfig, DeliveryConfig, SaveConfig, ScrollConfig, SessionConfig};

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::capture::{RetryPolicy, SchedulerTuning};
use crate::delivery::{DeliveryPolicy, FileSaveConfig, download};
use crate::session::SessionOptions;
use crate::surface::ScrollTuning;

/// Main configuration structure containing all user settings.
///
/// This is the root type that gets deserialized from the TOML file. Every
/// field has a default, so a partial (or absent) file is fine.
///
/// # Example TOML
/// ```toml
/// [capture]
/// min_request_interval_ms = 700
/// capture_budget_secs = 30
///
/// [scroll]
/// settle_delay_ms = 300
///
/// [delivery]
/// stages = ["clipboard", "download"]
///
/// [save]
/// directory = "~/Pictures/Scrollshot"
///
/// [session]
/// busy = "reject"
/// ```
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    /// Provider pacing and tile scheduling
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Scroll synchronization timing
    #[serde(default)]
    pub scroll: ScrollConfig,

    /// Delivery ladder makeup and per-stage time limits
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Save location and filename settings
    #[serde(default)]
    pub save: SaveConfig,

    /// Session-level behavior
    #[serde(default)]
    pub session: SessionConfig,
}

impl Config {
    /// Validates and clamps all configuration values to acceptable ranges.
    ///
    /// Invalid values are clamped to the nearest valid value and a warning
    /// is logged, so a typo slows the capture down instead of wedging it.
    fn validate_and_clamp(&mut self) {
        if self.capture.min_request_interval_ms > 60_000 {
            log::warn!(
                "Invalid min_request_interval_ms {}, clamping to 0-60000 range",
                self.capture.min_request_interval_ms
            );
            self.capture.min_request_interval_ms = 60_000;
        }

        if self.capture.rate_limit_backoff_ms > 60_000 {
            log::warn!(
                "Invalid rate_limit_backoff_ms {}, clamping to 0-60000 range",
                self.capture.rate_limit_backoff_ms
            );
            self.capture.rate_limit_backoff_ms = 60_000;
        }

        if !(1..=600).contains(&self.capture.capture_budget_secs) {
            log::warn!(
                "Invalid capture_budget_secs {}, clamping to 1-600 range",
                self.capture.capture_budget_secs
            );
            self.capture.capture_budget_secs = self.capture.capture_budget_secs.clamp(1, 600);
        }

        if self.capture.correlation_tolerance_px > 64 {
            log::warn!(
                "Invalid correlation_tolerance_px {}, clamping to 0-64 range",
                self.capture.correlation_tolerance_px
            );
            self.capture.correlation_tolerance_px = 64;
        }

        if self.scroll.tolerance_px > 64 {
            log::warn!(
                "Invalid scroll tolerance_px {}, clamping to 0-64 range",
                self.scroll.tolerance_px
            );
            self.scroll.tolerance_px = 64;
        }

        if !(1..=1000).contains(&self.scroll.poll_interval_ms) {
            log::warn!(
                "Invalid poll_interval_ms {}, clamping to 1-1000 range",
                self.scroll.poll_interval_ms
            );
            self.scroll.poll_interval_ms = self.scroll.poll_interval_ms.clamp(1, 1000);
        }

        if !(1..=1000).contains(&self.scroll.poll_budget) {
            log::warn!(
                "Invalid poll_budget {}, clamping to 1-1000 range",
                self.scroll.poll_budget
            );
            self.scroll.poll_budget = self.scroll.poll_budget.clamp(1, 1000);
        }

        if self.scroll.settle_delay_ms > 5000 {
            log::warn!(
                "Invalid settle_delay_ms {}, clamping to 0-5000 range",
                self.scroll.settle_delay_ms
            );
            self.scroll.settle_delay_ms = 5000;
        }

        if self.delivery.stages.is_empty() {
            log::warn!("Empty delivery stages list, falling back to the default ladder");
            self.delivery.stages = DeliveryConfig::default().stages;
        }

        for (name, value) in [
            ("clipboard_timeout_secs", &mut self.delivery.clipboard_timeout_secs),
            ("isolated_timeout_secs", &mut self.delivery.isolated_timeout_secs),
            ("gesture_timeout_secs", &mut self.delivery.gesture_timeout_secs),
            ("download_timeout_secs", &mut self.delivery.download_timeout_secs),
        ] {
            if !(1..=600).contains(value) {
                log::warn!("Invalid {name} {value}, clamping to 1-600 range");
                *value = (*value).clamp(1, 600);
            }
        }

        if self.save.timestamp_format.is_empty() {
            log::warn!("Empty timestamp_format, falling back to default");
            self.save.timestamp_format = SaveConfig::default().timestamp_format;
        }

        if !self.save.format.eq_ignore_ascii_case("png") {
            log::warn!(
                "Unsupported output format '{}', falling back to 'png'",
                self.save.format
            );
            self.save.format = "png".to_string();
        }
    }

    /// Returns the path to the configuration file.
    ///
    /// The config file is located at `~/.config/scrollshot/config.toml`.
    ///
    /// # Errors
    /// Returns an error if the config directory cannot be determined (e.g., HOME not set).
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not find config directory")?
            .join("scrollshot");

        Ok(config_dir.join("config.toml"))
    }

    /// Loads configuration from file, or returns defaults if not found.
    ///
    /// All loaded values are validated and clamped to acceptable ranges.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The config directory path cannot be determined
    /// - The file exists but cannot be read
    /// - The file exists but contains invalid TOML syntax
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            info!("Config file not found, using defaults");
            debug!("Expected config at: {}", config_path.display());
            return Ok(Self::default());
        }

        let config_str = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config from {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config from {}", config_path.display()))?;

        config.validate_and_clamp();

        info!("Loaded config from {}", config_path.display());
        debug!("Config: {:?}", config);

        Ok(config)
    }

    /// Saves the current configuration to file.
    ///
    /// Serializes the config to TOML and writes it to the standard path,
    /// creating the parent directory if needed.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The config directory cannot be created
    /// - The config cannot be serialized to TOML
    /// - The file cannot be written
    #[allow(dead_code)]
    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let config_str = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&config_path, config_str)
            .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

        info!("Saved config to {}", config_path.display());
        Ok(())
    }

    /// Creates a default configuration file with documentation comments.
    ///
    /// Writes the example config from `config.example.toml` to the user's
    /// config directory (`scrollshot --init-config`).
    ///
    /// # Errors
    /// Returns an error if:
    /// - A config file already exists at the target path
    /// - The config directory cannot be created
    /// - The file cannot be written
    pub fn create_default_file() -> Result<()> {
        let config_path = Self::get_config_path()?;

        if config_path.exists() {
            return Err(anyhow::anyhow!(
                "Config file already exists at {}",
                config_path.display()
            ));
        }

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let default_config = include_str!("../../config.example.toml");
        fs::write(&config_path, default_config)?;

        info!("Created default config at {}", config_path.display());
        Ok(())
    }

    /// Engine options equivalent to this configuration.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            busy: self.session.busy.to_policy(),
            scroll: ScrollTuning {
                tolerance_px: self.scroll.tolerance_px,
                poll_interval: Duration::from_millis(self.scroll.poll_interval_ms),
                poll_budget: self.scroll.poll_budget,
                settle_delay: Duration::from_millis(self.scroll.settle_delay_ms),
            },
            retry: RetryPolicy {
                min_interval: Duration::from_millis(self.capture.min_request_interval_ms),
                rate_limit_backoff: Duration::from_millis(self.capture.rate_limit_backoff_ms),
            },
            scheduler: SchedulerTuning {
                correlation_tolerance_px: self.capture.correlation_tolerance_px,
                capture_budget: Duration::from_secs(self.capture.capture_budget_secs),
            },
            delivery: DeliveryPolicy {
                stages: self
                    .delivery
                    .stages
                    .iter()
                    .map(|stage| stage.to_stage())
                    .collect(),
                clipboard_timeout: Duration::from_secs(self.delivery.clipboard_timeout_secs),
                isolated_timeout: Duration::from_secs(self.delivery.isolated_timeout_secs),
                gesture_timeout: Duration::from_secs(self.delivery.gesture_timeout_secs),
                download_timeout: Duration::from_secs(self.delivery.download_timeout_secs),
            },
            save: FileSaveConfig {
                directory: download::expand_tilde(&self.save.directory),
                timestamp_format: self.save.timestamp_format.clone(),
                format: self.save.format.clone(),
            },
        }
    }
}
