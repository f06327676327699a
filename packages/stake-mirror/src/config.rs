use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use cosmwasm_std::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable holding the path of the YAML config file.
pub const CONFIG_ENV: &str = "STAKE_MIRROR_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing {0} env var")]
    MissingEnv(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// How the staking contract reports stake anchors and intervals.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnchorKind {
    /// Unix timestamps in seconds.
    #[default]
    Timestamp,
    /// Block heights. Elapsed time is estimated with an average block
    /// time, which is only good enough for display.
    BlockNumber { block_time_seconds: Decimal },
}

/// Which parts of the staking interface the deployed contract exposes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StakingCapabilities {
    pub fixed_staking: bool,
    pub flexible_staking: bool,
    /// Prefer `CalculateFixedReward` over the local projection.
    pub fixed_reward_query: bool,
}

impl Default for StakingCapabilities {
    fn default() -> Self {
        Self {
            fixed_staking: true,
            flexible_staking: true,
            fixed_reward_query: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationPolicy {
    /// Inclusion checks made before giving up with a timeout.
    pub max_polls: u32,
    pub poll_interval_ms: u64,
}

impl ConfirmationPolicy {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            max_polls: 40,
            poll_interval_ms: 1_500,
        }
    }
}

fn default_fixed_duration_days() -> u64 {
    30
}

fn default_fixed_annual_rate() -> Decimal {
    Decimal::percent(30)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DashboardConfig {
    /// Address of the staking contract.
    pub staking_contract: String,
    #[serde(default)]
    pub anchor: AnchorKind,
    /// Lock period of fixed stakes, used for maturity and the local
    /// reward projection.
    #[serde(default = "default_fixed_duration_days")]
    pub fixed_duration_days: u64,
    #[serde(default = "default_fixed_annual_rate")]
    pub fixed_annual_rate: Decimal,
    #[serde(default)]
    pub capabilities: StakingCapabilities,
    #[serde(default)]
    pub confirmation: ConfirmationPolicy,
}

impl DashboardConfig {
    pub fn new(staking_contract: impl Into<String>) -> Self {
        Self {
            staking_contract: staking_contract.into(),
            anchor: AnchorKind::default(),
            fixed_duration_days: default_fixed_duration_days(),
            fixed_annual_rate: default_fixed_annual_rate(),
            capabilities: StakingCapabilities::default(),
            confirmation: ConfirmationPolicy::default(),
        }
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: DashboardConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_yaml(&fs::read_to_string(path)?)
    }

    /// Loads the file named by the `STAKE_MIRROR_CONFIG` env var.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = env::var(CONFIG_ENV).map_err(|_| ConfigError::MissingEnv(CONFIG_ENV))?;
        Self::from_file(path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.staking_contract.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "staking_contract must not be empty".to_string(),
            ));
        }
        if self.fixed_duration_days == 0 {
            return Err(ConfigError::Invalid(
                "fixed_duration_days must be positive".to_string(),
            ));
        }
        if let AnchorKind::BlockNumber { block_time_seconds } = &self.anchor {
            if block_time_seconds.is_zero() {
                return Err(ConfigError::Invalid(
                    "block_time_seconds must be positive".to_string(),
                ));
            }
        }
        if self.confirmation.max_polls == 0 {
            return Err(ConfigError::Invalid(
                "confirmation.max_polls must be at least one".to_string(),
            ));
        }
        Ok(())
    }

    pub fn fixed_duration_seconds(&self) -> u64 {
        self.fixed_duration_days * 24 * 60 * 60
    }
}
