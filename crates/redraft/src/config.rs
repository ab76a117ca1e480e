use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tunable settings for the job lifecycle manager.
///
/// Durations are whole seconds, matching the settings file format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JobSettings {
    /// Maximum time a job may spend in `processing` before it is
    /// force-failed.
    #[serde(default = "default_processing_timeout")]
    pub processing_timeout_secs: u64,
    /// How long a finished job stays queryable before its record is
    /// reclaimed.
    #[serde(default = "default_cleanup_delay")]
    pub cleanup_delay_secs: u64,
    /// Capacity of the lifecycle event channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_processing_timeout() -> u64 {
    120
}

fn default_cleanup_delay() -> u64 {
    300
}

fn default_event_capacity() -> usize {
    100
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            processing_timeout_secs: default_processing_timeout(),
            cleanup_delay_secs: default_cleanup_delay(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl JobSettings {
    /// Processing allowance as a [`Duration`].
    pub fn processing_timeout(&self) -> Duration {
        Duration::from_secs(self.processing_timeout_secs)
    }

    /// Post-completion retention as a [`Duration`].
    pub fn cleanup_delay(&self) -> Duration {
        Duration::from_secs(self.cleanup_delay_secs)
    }
}

pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<JobSettings, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_settings_from_str(&content)
}

pub fn load_settings_from_str(content: &str) -> Result<JobSettings, ConfigError> {
    let settings: JobSettings = serde_yaml::from_str(content)?;

    validate_settings(&settings)?;

    Ok(settings)
}

fn validate_settings(settings: &JobSettings) -> Result<(), ConfigError> {
    if settings.processing_timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "processingTimeoutSecs must be greater than zero".to_string(),
        });
    }

    if settings.cleanup_delay_secs == 0 {
        return Err(ConfigError::Validation {
            message: "cleanupDelaySecs must be greater than zero".to_string(),
        });
    }

    if settings.event_capacity == 0 {
        return Err(ConfigError::Validation {
            message: "eventCapacity must be greater than zero".to_string(),
        });
    }

    Ok(())
}
