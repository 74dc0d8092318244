use serde::{Deserialize, Serialize};

use crate::internal::common::error::ConfigError;
use crate::internal::model::ResourceModel;
use crate::internal::partition::PartitionCatalog;
use crate::internal::partition::strategy::StrategyKind;

/// Smallest request the engine ever produces, regardless of scaling.
pub const MIN_CPUS: u32 = 1;
pub const MIN_MEMORY_GB: f64 = 2.0;
pub const MIN_TIME_HOURS: f64 = 0.5;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Administrator-defined hard maximum of each resource dimension.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ceilings {
    pub max_cpus: u32,
    pub max_memory_gb: f64,
    pub max_time_hours: f64,
}

impl Default for Ceilings {
    fn default() -> Self {
        Self {
            max_cpus: 16,
            max_memory_gb: 128.0,
            max_time_hours: 240.0,
        }
    }
}

impl Ceilings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_cpus == 0 {
            return Err(ConfigError::NonPositiveCeiling {
                name: "max_cpus",
                value: 0.0,
            });
        }
        for (name, value, floor) in [
            ("max_memory_gb", self.max_memory_gb, MIN_MEMORY_GB),
            ("max_time_hours", self.max_time_hours, MIN_TIME_HOURS),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NonPositiveCeiling { name, value });
            }
            if value < floor {
                return Err(ConfigError::CeilingBelowFloor { name, value, floor });
            }
        }
        Ok(())
    }
}

/// Everything the engine needs to make decisions. Immutable once handed to the engine.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    pub model: ResourceModel,
    pub ceilings: Ceilings,
    pub catalog: PartitionCatalog,
    pub strategy: StrategyKind,
    pub max_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: ResourceModel::default(),
            ceilings: Ceilings::default(),
            catalog: PartitionCatalog::default(),
            strategy: StrategyKind::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ceilings.validate()?;
        self.model.validate()?;
        self.catalog.validate(self.strategy)?;
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        Ok(())
    }
}
