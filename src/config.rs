//! Ambient configuration layer (SPEC_FULL §10.3): defaults for scheduling
//! and debugging that a caller may override from a `fusorch.toml`, mirroring
//! the teacher's `toml` + `serde` pairing.

use serde::{Deserialize, Serialize};

/// Name of the environment variable that enables kernel-source logging,
/// the `FUSORCH_DEBUG` analogue of the original `PYTORCH_CUDA_FUSER_DEBUG`.
pub const DEBUG_ENV_VAR: &str = "FUSORCH_DEBUG";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default block size (threads per block) used by the pointwise and
    /// reduction schedulers when no finer heuristic is supplied.
    pub default_block_size: u32,

    /// Override for the device's shared-memory-per-block budget; `None`
    /// means "ask `DeviceInfo::shared_mem_per_block`".
    pub shared_mem_override_bytes: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            default_block_size: 128,
            shared_mem_override_bytes: None,
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Whether kernel source should be logged, per `FUSORCH_DEBUG` being set
    /// to any truthy (non-zero) integer.
    pub fn debug_enabled_from_env() -> bool {
        std::env::var(DEBUG_ENV_VAR)
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .map(|v| v != 0)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_original_hardcoded_behavior() {
        let c = Config::default();
        assert_eq!(c.default_block_size, 128);
        assert!(c.shared_mem_override_bytes.is_none());
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let c = Config::from_toml_str("default_block_size = 256").unwrap();
        assert_eq!(c.default_block_size, 256);
        assert!(c.shared_mem_override_bytes.is_none());
    }
}
