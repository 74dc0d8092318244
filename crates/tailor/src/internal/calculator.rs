use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::internal::common::units::{ceil_to_minutes, clamp_value, format_walltime, sanitize};
use crate::internal::config::{Ceilings, MIN_CPUS, MIN_MEMORY_GB, MIN_TIME_HOURS};
use crate::internal::model::{BaseResources, JobClass, ResourceModel};
use crate::internal::profile::InputProfile;

/// Concrete resources requested for one attempt of a job.
///
/// A new request is created for every attempt; requests are never edited.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequest {
    cpus: u32,
    memory_gb: f64,
    time_hours: f64,
    attempt: u32,
}

impl ResourceRequest {
    pub fn new(cpus: u32, memory_gb: f64, time_hours: f64, attempt: u32) -> Self {
        Self {
            cpus,
            memory_gb,
            time_hours,
            attempt,
        }
    }

    #[inline]
    pub fn cpus(&self) -> u32 {
        self.cpus
    }

    #[inline]
    pub fn memory_gb(&self) -> f64 {
        self.memory_gb
    }

    #[inline]
    pub fn time_hours(&self) -> f64 {
        self.time_hours
    }

    #[inline]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Walltime as a scheduler time string (`HH:MM:SS`).
    pub fn walltime(&self) -> String {
        format_walltime(self.time_hours)
    }
}

impl Display for ResourceRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cpus={} mem={}G time={} (attempt {})",
            self.cpus,
            self.memory_gb,
            self.walltime(),
            self.attempt
        )
    }
}

/// Multiplier of each resource dimension.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Multipliers {
    pub cpu: f64,
    pub memory: f64,
    pub time: f64,
}

/// Scaling driven by the total input size (in GB).
pub fn size_multipliers(class: JobClass, size_gb: f64) -> Multipliers {
    let size_gb = sanitize(size_gb);
    let cpu = (1.0 + (size_gb - 50.0).max(0.0) / 100.0).min(2.0);
    let memory = match class {
        JobClass::MemoryIntensive => (size_gb * 0.5).max(2.0),
        JobClass::High => (size_gb * 0.2).max(1.5),
        JobClass::Medium => (size_gb * 0.1).max(1.2),
        JobClass::Quick | JobClass::Low | JobClass::Gpu => (size_gb * 0.05).max(1.0),
    };
    let time = if size_gb > 10.0 {
        ((size_gb / 10.0).ln() + 1.0).max(1.5)
    } else {
        1.0
    };
    Multipliers { cpu, memory, time }
}

/// Scaling driven by the number of samples; only parallelizable classes are affected.
pub fn sample_multipliers(class: JobClass, sample_count: u32) -> Multipliers {
    if !class.is_parallelizable() {
        return Multipliers {
            cpu: 1.0,
            memory: 1.0,
            time: 1.0,
        };
    }
    let samples = sample_count.max(1) as f64;
    let cpu = (1.0 + (samples - 1.0) / 10.0).min(1.5);
    let time = if samples > 1.0 {
        (samples.ln() + 1.0).max(1.2)
    } else {
        1.0
    };
    Multipliers {
        cpu,
        memory: 1.0,
        time,
    }
}

/// Combines the resource model, the input profile and the attempt number into a request.
///
/// Stateless; a single calculator can be shared between threads.
#[derive(Copy, Clone, Debug)]
pub struct ResourceCalculator<'a> {
    model: &'a ResourceModel,
    ceilings: &'a Ceilings,
}

impl<'a> ResourceCalculator<'a> {
    pub fn new(model: &'a ResourceModel, ceilings: &'a Ceilings) -> Self {
        Self { model, ceilings }
    }

    /// Computes the request of the given attempt (counted from 1).
    ///
    /// The attempt multiplier is linear and unbounded; only the final clamp to the ceilings
    /// limits the escalation.
    pub fn calculate(
        &self,
        class: JobClass,
        profile: &InputProfile,
        attempt: u32,
        base_override: Option<&BaseResources>,
    ) -> ResourceRequest {
        let attempt = attempt.max(1);
        let class_model = self.model.get(class);
        let base = base_override.unwrap_or(&class_model.base);
        let factors = &class_model.factors;

        let size = size_multipliers(class, profile.total_size_gb());
        let samples = sample_multipliers(class, profile.sample_count());
        let escalation = attempt as f64;

        let cpus = (base.cpus as f64
            * sanitize(factors.cpu)
            * size.cpu
            * samples.cpu
            * escalation)
            .ceil();
        let memory_gb = (sanitize(base.memory_gb)
            * sanitize(factors.memory)
            * size.memory
            * samples.memory
            * escalation)
            .ceil();
        let time_hours = ceil_to_minutes(
            sanitize(base.time_hours) * sanitize(factors.time) * size.time * samples.time * escalation,
        );

        let request = ResourceRequest {
            cpus: clamp_value(cpus, MIN_CPUS as f64, self.ceilings.max_cpus as f64) as u32,
            memory_gb: clamp_value(memory_gb, MIN_MEMORY_GB, self.ceilings.max_memory_gb.floor()),
            time_hours: clamp_value(time_hours, MIN_TIME_HOURS, self.ceilings.max_time_hours),
            attempt,
        };
        log::debug!(
            "Calculated request for class {class} ({} GB in {} samples): {request}",
            profile.total_size_gb(),
            profile.sample_count()
        );
        request
    }
}
