use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

use crate::internal::common::error::ConfigError;

/// Resource profile of a unit of work, attached to each job by the pipeline definition.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobClass {
    Quick,
    Low,
    Medium,
    High,
    MemoryIntensive,
    Gpu,
}

impl JobClass {
    pub const ALL: [JobClass; 6] = [
        JobClass::Quick,
        JobClass::Low,
        JobClass::Medium,
        JobClass::High,
        JobClass::MemoryIntensive,
        JobClass::Gpu,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            JobClass::Quick => "quick",
            JobClass::Low => "low",
            JobClass::Medium => "medium",
            JobClass::High => "high",
            JobClass::MemoryIntensive => "memory_intensive",
            JobClass::Gpu => "gpu",
        }
    }

    /// Classes whose work splits well over samples, so their CPU and time requests grow with
    /// the number of samples.
    pub fn is_parallelizable(&self) -> bool {
        matches!(self, JobClass::Quick | JobClass::Low | JobClass::Medium)
    }

    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

impl Display for JobClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown job class `{0}`, expected one of quick, low, medium, high, memory_intensive, gpu")]
pub struct ParseJobClassError(pub String);

impl FromStr for JobClass {
    type Err = ParseJobClassError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        JobClass::ALL
            .into_iter()
            .find(|class| class.name() == normalized)
            .ok_or_else(|| ParseJobClassError(s.to_string()))
    }
}

/// Per-class multipliers applied on top of the base request.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScalingFactors {
    pub cpu: f64,
    pub memory: f64,
    pub time: f64,
}

impl Default for ScalingFactors {
    fn default() -> Self {
        Self {
            cpu: 1.0,
            memory: 1.0,
            time: 1.0,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BaseResources {
    pub cpus: u32,
    pub memory_gb: f64,
    pub time_hours: f64,
}

impl BaseResources {
    pub fn new(cpus: u32, memory_gb: f64, time_hours: f64) -> Self {
        Self {
            cpus,
            memory_gb,
            time_hours,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassModel {
    pub base: BaseResources,
    #[serde(default)]
    pub factors: ScalingFactors,
    /// Scheduler options appended verbatim to every submission of this class.
    #[serde(default)]
    pub custom_options: Vec<String>,
}

impl ClassModel {
    pub fn new(base: BaseResources) -> Self {
        Self {
            base,
            factors: ScalingFactors::default(),
            custom_options: Vec::new(),
        }
    }
}

/// Base resources and scaling factors of every job class.
///
/// Indexed by [`JobClass`], so every class always has an entry.
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceModel {
    classes: [ClassModel; 6],
}

impl Default for ResourceModel {
    fn default() -> Self {
        let class = |cpus, memory_gb, time_hours| {
            ClassModel::new(BaseResources::new(cpus, memory_gb, time_hours))
        };
        Self {
            classes: [
                class(1, 2.0, 0.5),
                class(2, 4.0, 2.0),
                class(4, 16.0, 8.0),
                class(8, 32.0, 16.0),
                class(8, 64.0, 24.0),
                class(4, 32.0, 12.0),
            ],
        }
    }
}

impl ResourceModel {
    #[inline]
    pub fn get(&self, class: JobClass) -> &ClassModel {
        &self.classes[class.index()]
    }

    pub fn set(&mut self, class: JobClass, model: ClassModel) {
        self.classes[class.index()] = model;
    }

    pub fn get_mut(&mut self, class: JobClass) -> &mut ClassModel {
        &mut self.classes[class.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (JobClass, &ClassModel)> {
        JobClass::ALL.into_iter().zip(self.classes.iter())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (class, model) in self.iter() {
            let BaseResources {
                cpus,
                memory_gb,
                time_hours,
            } = model.base;
            let invalid_base = |reason: String| ConfigError::InvalidBaseResources { class, reason };
            if cpus == 0 {
                return Err(invalid_base("cpus must be at least 1".to_string()));
            }
            if !(memory_gb.is_finite() && memory_gb > 0.0) {
                return Err(invalid_base(format!(
                    "memory must be positive, got {memory_gb}"
                )));
            }
            if !(time_hours.is_finite() && time_hours > 0.0) {
                return Err(invalid_base(format!(
                    "time must be positive, got {time_hours}"
                )));
            }

            let ScalingFactors { cpu, memory, time } = model.factors;
            for (name, value) in [("cpu", cpu), ("memory", memory), ("time", time)] {
                if !(value.is_finite() && value >= 0.0) {
                    return Err(ConfigError::InvalidScalingFactors {
                        class,
                        reason: format!("{name} factor must be a non-negative number, got {value}"),
                    });
                }
            }
        }
        Ok(())
    }
}
