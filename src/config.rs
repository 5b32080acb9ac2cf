// src/config.rs - Cooldown settings, store loader and file loader
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::host::SettingsStore;

/// Keys under which the host settings store keeps the cooldown options.
pub mod keys {
    pub const ENABLED: &str = "enabled";
    pub const TIME_ELAPSED: &str = "time_elapsed";
    pub const TIME_LEFT: &str = "time_left";
    pub const COMPLETION: &str = "completion";
    pub const COMPLETION_USE_GCODE: &str = "completion_use_gcode";
    pub const TEMPERATURE: &str = "temperature";
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse settings file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Cooldown settings in the units the host settings store uses: whole seconds
/// for the time thresholds, whole percent for completion.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CooldownSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Minimum print time elapsed before a trigger is considered, seconds.
    #[serde(default)]
    pub time_elapsed: u64,

    /// Maximum estimated print time remaining, seconds.
    #[serde(default = "default_time_left")]
    pub time_left: u64,

    /// Minimum completion, percent 0-100.
    #[serde(default = "default_completion")]
    pub completion: u32,

    /// Compare against the gcode-reported completion instead of the
    /// time-derived one.
    #[serde(default)]
    pub completion_use_gcode: bool,

    /// Bed target sent on trigger, degrees C. 0 turns the heater off.
    #[serde(default)]
    pub temperature: i32,
}

impl Default for CooldownSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            time_elapsed: 0,
            time_left: default_time_left(),
            completion: default_completion(),
            completion_use_gcode: false,
            temperature: 0,
        }
    }
}

impl CooldownSettings {
    /// Reads the settings from the host store, falling back to the declared
    /// defaults for absent keys. Called fresh on every periodic check so
    /// changes made mid-print take effect at the next tick.
    pub async fn load<S>(store: &S) -> Self
    where
        S: SettingsStore + ?Sized,
    {
        let defaults = Self::default();
        let settings = Self {
            enabled: store
                .get_bool(keys::ENABLED)
                .await
                .unwrap_or(defaults.enabled),
            time_elapsed: get_seconds(store, keys::TIME_ELAPSED, defaults.time_elapsed).await,
            time_left: get_seconds(store, keys::TIME_LEFT, defaults.time_left).await,
            completion: store
                .get_int(keys::COMPLETION)
                .await
                .map(|v| v.clamp(0, i64::from(u32::MAX)) as u32)
                .unwrap_or(defaults.completion),
            completion_use_gcode: store
                .get_bool(keys::COMPLETION_USE_GCODE)
                .await
                .unwrap_or(defaults.completion_use_gcode),
            temperature: store
                .get_int(keys::TEMPERATURE)
                .await
                .map(|v| v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32)
                .unwrap_or(defaults.temperature),
        };
        settings.validated()
    }

    /// Clamps out-of-range values back into the supported domain.
    fn validated(mut self) -> Self {
        if self.completion > 100 {
            tracing::warn!(
                "completion threshold {}% out of range, clamping to 100%",
                self.completion
            );
            self.completion = 100;
        }
        if self.temperature < 0 {
            tracing::warn!(
                "negative bed target {}C is not supported, using 0C",
                self.temperature
            );
            self.temperature = 0;
        }
        self
    }

    pub fn time_elapsed_threshold(&self) -> Duration {
        Duration::from_secs(self.time_elapsed)
    }

    pub fn time_left_threshold(&self) -> Duration {
        Duration::from_secs(self.time_left)
    }

    /// Completion threshold as a fraction in [0, 1].
    pub fn completion_threshold(&self) -> f64 {
        f64::from(self.completion) / 100.0
    }
}

async fn get_seconds<S>(store: &S, key: &str, default: u64) -> u64
where
    S: SettingsStore + ?Sized,
{
    match store.get_int(key).await {
        Some(v) if v >= 0 => v as u64,
        Some(v) => {
            tracing::warn!("ignoring negative value {v} for setting '{key}'");
            default
        }
        None => default,
    }
}

/// Loads settings from a TOML file, used by the simulation harness.
pub fn load_settings_file(path: impl AsRef<Path>) -> Result<CooldownSettings, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    let settings: CooldownSettings = toml::from_str(&raw)?;
    Ok(settings.validated())
}

fn default_enabled() -> bool {
    true
}

fn default_time_left() -> u64 {
    300
}

fn default_completion() -> u32 {
    90
}
