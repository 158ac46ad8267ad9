//! Configuration management for Floodgate.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FloodgateError, Result};

/// Main configuration for Floodgate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FloodgateConfig {
    /// Interval throttle configuration
    #[serde(default)]
    pub throttle: ThrottleConfig,

    /// Sliding window configuration
    #[serde(default)]
    pub window: WindowConfig,

    /// Simulation configuration
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Configuration for the interval throttle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Minimum interval between admissions for one identity, in milliseconds
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
        }
    }
}

impl ThrottleConfig {
    /// The minimum interval as a [`Duration`].
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

fn default_min_interval_ms() -> u64 {
    10_000
}

/// Configuration for the sliding window limiter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Window length in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Maximum admissions per identity within the window
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            max_requests: default_max_requests(),
        }
    }
}

impl WindowConfig {
    /// The window length as a [`Duration`].
    pub fn window_size(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

fn default_window_ms() -> u64 {
    10_000
}

fn default_max_requests() -> usize {
    1
}

/// Configuration for the simulation binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of synthetic identities
    #[serde(default = "default_users")]
    pub users: u32,

    /// Number of messages per series
    #[serde(default = "default_messages")]
    pub messages: u32,

    /// Lower bound of the random inter-message delay, in milliseconds
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Upper bound of the random inter-message delay, in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            users: default_users(),
            messages: default_messages(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_users() -> u32 {
    5
}

fn default_messages() -> u32 {
    10
}

fn default_min_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    1_000
}

impl FloodgateConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: FloodgateConfig = serde_yaml::from_str(&contents)
            .map_err(|e| FloodgateError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check construction-time contracts.
    pub fn validate(&self) -> Result<()> {
        if self.throttle.min_interval_ms == 0 {
            return Err(FloodgateError::Config(
                "throttle.min_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.window.window_ms == 0 {
            return Err(FloodgateError::Config(
                "window.window_ms must be greater than zero".to_string(),
            ));
        }
        if self.simulation.users == 0 {
            return Err(FloodgateError::Config(
                "simulation.users must be greater than zero".to_string(),
            ));
        }
        if self.simulation.min_delay_ms > self.simulation.max_delay_ms {
            return Err(FloodgateError::Config(
                "simulation.min_delay_ms must not exceed simulation.max_delay_ms".to_string(),
            ));
        }
        Ok(())
    }
}
