//! Mapping of resource requests onto cluster partitions.
//!
//! The catalog assigns concrete partition names to logical roles. Which role a job ends up in
//! is decided by a [`strategy::PartitionStrategy`], chosen once when the engine configuration
//! is loaded. A role that is missing from the catalog falls back to `compute`.
pub(crate) mod options;
pub(crate) mod strategy;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use crate::internal::common::error::ConfigError;
use crate::internal::partition::strategy::StrategyKind;

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionRole {
    Compute,
    Bigmem,
    Gpu,
    Quick,
}

impl PartitionRole {
    pub const ALL: [PartitionRole; 4] = [
        PartitionRole::Compute,
        PartitionRole::Bigmem,
        PartitionRole::Gpu,
        PartitionRole::Quick,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PartitionRole::Compute => "compute",
            PartitionRole::Bigmem => "bigmem",
            PartitionRole::Gpu => "gpu",
            PartitionRole::Quick => "quick",
        }
    }

    /// Next role in the fallback chain. `compute` is the end of every chain.
    pub fn fallback(&self) -> Option<PartitionRole> {
        match self {
            PartitionRole::Compute => None,
            PartitionRole::Bigmem | PartitionRole::Gpu | PartitionRole::Quick => {
                Some(PartitionRole::Compute)
            }
        }
    }
}

impl Display for PartitionRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PartitionThresholds {
    /// Requests with more memory than this go to the `bigmem` partition.
    pub bigmem_memory_gb: f64,
    pub quick_time_hours: f64,
    pub quick_memory_gb: f64,
}

impl Default for PartitionThresholds {
    fn default() -> Self {
        Self {
            bigmem_memory_gb: 200.0,
            quick_time_hours: 1.0,
            quick_memory_gb: 16.0,
        }
    }
}

impl PartitionThresholds {
    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("bigmem_memory_gb", self.bigmem_memory_gb),
            ("quick_time_hours", self.quick_time_hours),
            ("quick_memory_gb", self.quick_memory_gb),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidThreshold { name, value });
            }
        }
        Ok(())
    }
}

/// Partitions available on the cluster, keyed by their logical role.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PartitionCatalog {
    partitions: BTreeMap<PartitionRole, String>,
    thresholds: PartitionThresholds,
    /// Partition used by the static strategy. `compute` is used when unset.
    default_partition: Option<String>,
    /// Scheduler options appended verbatim to every submission.
    custom_options: Vec<String>,
}

impl Default for PartitionCatalog {
    fn default() -> Self {
        let mut catalog = Self::empty(PartitionThresholds::default());
        for role in PartitionRole::ALL {
            catalog.set_partition(role, role.name());
        }
        catalog
    }
}

impl PartitionCatalog {
    /// Catalog without any partition.
    pub fn empty(thresholds: PartitionThresholds) -> Self {
        Self {
            partitions: BTreeMap::new(),
            thresholds,
            default_partition: None,
            custom_options: Vec::new(),
        }
    }

    pub fn with_partition<S: Into<String>>(mut self, role: PartitionRole, name: S) -> Self {
        self.set_partition(role, name);
        self
    }

    pub fn set_partition<S: Into<String>>(&mut self, role: PartitionRole, name: S) {
        self.partitions.insert(role, name.into());
    }

    pub fn remove_partition(&mut self, role: PartitionRole) -> Option<String> {
        self.partitions.remove(&role)
    }

    pub fn set_default_partition(&mut self, name: Option<String>) {
        self.default_partition = name;
    }

    pub fn set_custom_options(&mut self, options: Vec<String>) {
        self.custom_options = options;
    }

    pub fn set_thresholds(&mut self, thresholds: PartitionThresholds) {
        self.thresholds = thresholds;
    }

    #[inline]
    pub fn get(&self, role: PartitionRole) -> Option<&str> {
        self.partitions.get(&role).map(|name| name.as_str())
    }

    pub fn partitions(&self) -> impl Iterator<Item = (PartitionRole, &str)> {
        self.partitions
            .iter()
            .map(|(role, name)| (*role, name.as_str()))
    }

    /// Finds the role of a concrete partition name. When several roles share one partition,
    /// the first role in [`PartitionRole::ALL`] order wins.
    pub fn role_of(&self, name: &str) -> Option<PartitionRole> {
        self.partitions()
            .find(|(_, partition)| *partition == name)
            .map(|(role, _)| role)
    }

    #[inline]
    pub fn thresholds(&self) -> &PartitionThresholds {
        &self.thresholds
    }

    #[inline]
    pub fn custom_options(&self) -> &[String] {
        &self.custom_options
    }

    /// Partition of the static strategy.
    pub fn default_partition(&self) -> Option<&str> {
        self.default_partition
            .as_deref()
            .or_else(|| self.get(PartitionRole::Compute))
    }

    pub fn validate(&self, strategy: StrategyKind) -> Result<(), ConfigError> {
        self.thresholds.validate()?;
        if self.partitions.is_empty() {
            return Err(ConfigError::EmptyCatalog);
        }
        for (role, name) in self.partitions() {
            if name.trim().is_empty() {
                return Err(ConfigError::EmptyPartitionName(role));
            }
        }
        if let Some(default) = &self.default_partition {
            if self.role_of(default).is_none() {
                return Err(ConfigError::UnknownDefaultPartition(default.clone()));
            }
        }
        if strategy == StrategyKind::Static && self.default_partition().is_none() {
            return Err(ConfigError::MissingDefaultPartition);
        }
        Ok(())
    }
}
