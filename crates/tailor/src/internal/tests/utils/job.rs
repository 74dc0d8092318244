use chrono::Utc;

use crate::internal::calculator::ResourceRequest;
use crate::internal::common::ids::JobId;
use crate::internal::common::units::gb_to_bytes;
use crate::internal::engine::JobSpec;
use crate::internal::model::JobClass;
use crate::internal::observation::{ExitStatus, ObservedUsage, UsageObservation};
use crate::internal::profile::InputFile;
use crate::internal::retry::classify::JobFailure;

/// Job with one input file per given size (in GB).
pub fn job(id: &str, class: JobClass, sizes_gb: &[f64]) -> JobSpec {
    let inputs = sizes_gb
        .iter()
        .enumerate()
        .map(|(i, size)| InputFile::new(format!("{id}_{i}.fastq.gz"), gb_to_bytes(*size)))
        .collect();
    JobSpec::new(id, class, inputs)
}

pub fn oom() -> JobFailure {
    JobFailure::new(Some(137), "slurmstepd: error: Detected 1 oom-kill event(s)")
}

pub fn bad_input() -> JobFailure {
    JobFailure::new(Some(1), "ERROR: database not found")
}

pub fn observation(
    job_id: &str,
    class: JobClass,
    requested: ResourceRequest,
    usage: (f64, f64, f64),
) -> UsageObservation {
    let (max_memory_gb, avg_cpu_percent, wall_clock_hours) = usage;
    UsageObservation {
        job_id: JobId::new(job_id),
        job_class: Some(class),
        attempt: requested.attempt(),
        requested,
        observed: ObservedUsage {
            max_memory_gb,
            avg_cpu_percent,
            wall_clock_hours,
        },
        exit_status: ExitStatus::Success,
        recorded_at: Utc::now(),
    }
}
