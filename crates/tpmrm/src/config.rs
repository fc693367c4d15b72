use serde::Deserialize;
use tpmrm_protocol::codes::{Handle, is_transient_handle};

use crate::error::ConfigError;

/// Tunables of the resource manager and its worker.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ResourceManagerConfig {
    /// First handle of the cyclic virtual object range.
    #[serde(default = "default_virtual_handle_first")]
    pub virtual_handle_first: Handle,
    /// Last handle of the virtual object range. The size of the range is the
    /// number of objects that can be tracked at once.
    #[serde(default = "default_virtual_handle_last")]
    pub virtual_handle_last: Handle,
    #[serde(default = "default_max_tracked_sessions")]
    pub max_tracked_sessions: usize,
    /// Sends per command, counting the first one.
    #[serde(default = "default_max_command_attempts")]
    pub max_command_attempts: usize,
    /// Handles requested per GetCapability page while flushing at startup.
    #[serde(default = "default_capability_batch")]
    pub capability_batch: u32,
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

impl ResourceManagerConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_transient_handle(self.virtual_handle_first)
            || !is_transient_handle(self.virtual_handle_last)
        {
            return Err(ConfigError::Invalid(
                "virtual handle range must lie in the transient range",
            ));
        }
        if self.virtual_handle_first > self.virtual_handle_last {
            return Err(ConfigError::Invalid("virtual handle range is inverted"));
        }
        if self.max_tracked_sessions == 0 {
            return Err(ConfigError::Invalid("max_tracked_sessions must be positive"));
        }
        if self.max_command_attempts == 0 {
            return Err(ConfigError::Invalid("max_command_attempts must be positive"));
        }
        if self.capability_batch == 0 {
            return Err(ConfigError::Invalid("capability_batch must be positive"));
        }
        if self.queue_depth == 0 {
            return Err(ConfigError::Invalid("queue_depth must be positive"));
        }
        Ok(())
    }
}

impl Default for ResourceManagerConfig {
    fn default() -> Self {
        Self {
            virtual_handle_first: default_virtual_handle_first(),
            virtual_handle_last: default_virtual_handle_last(),
            max_tracked_sessions: default_max_tracked_sessions(),
            max_command_attempts: default_max_command_attempts(),
            capability_batch: default_capability_batch(),
            queue_depth: default_queue_depth(),
        }
    }
}

fn default_virtual_handle_first() -> Handle {
    0x8080_0000
}

fn default_virtual_handle_last() -> Handle {
    0x80FF_FFFF
}

fn default_max_tracked_sessions() -> usize {
    64
}

fn default_max_command_attempts() -> usize {
    3
}

fn default_capability_batch() -> u32 {
    254
}

fn default_queue_depth() -> usize {
    64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = ResourceManagerConfig::from_toml_str("").unwrap();
        assert_eq!(config, ResourceManagerConfig::default());
        assert_eq!(config.max_command_attempts, 3);
    }

    #[test]
    fn toml_overrides_fields() {
        let config = ResourceManagerConfig::from_toml_str(
            "virtual_handle_first = 0x80000100\nvirtual_handle_last = 0x80000101\nmax_tracked_sessions = 2\n",
        )
        .unwrap();
        assert_eq!(config.virtual_handle_first, 0x8000_0100);
        assert_eq!(config.virtual_handle_last, 0x8000_0101);
        assert_eq!(config.max_tracked_sessions, 2);
        assert_eq!(config.queue_depth, 64);
    }

    #[test]
    fn rejects_bad_ranges_and_zeroes() {
        let mut config = ResourceManagerConfig {
            virtual_handle_first: 0x0200_0000,
            ..ResourceManagerConfig::default()
        };
        assert!(config.validate().is_err());

        config = ResourceManagerConfig {
            virtual_handle_first: 0x80FF_0000,
            virtual_handle_last: 0x8080_0000,
            ..ResourceManagerConfig::default()
        };
        assert!(config.validate().is_err());

        config = ResourceManagerConfig {
            max_command_attempts: 0,
            ..ResourceManagerConfig::default()
        };
        assert!(config.validate().is_err());

        assert!(matches!(
            ResourceManagerConfig::from_toml_str("queue_depth = \"deep\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
