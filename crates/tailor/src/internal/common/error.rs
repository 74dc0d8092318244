use thiserror::Error;

use crate::internal::common::ids::JobId;
use crate::internal::model::JobClass;
use crate::internal::partition::PartitionRole;
use crate::internal::retry::RetryState;

#[derive(Debug, Error)]
pub enum TailorError {
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Cannot submit job {job_id}: {source}")]
    PartitionUnavailable {
        job_id: JobId,
        #[source]
        source: PartitionUnavailable,
    },
    #[error(transparent)]
    RetryError(#[from] RetryError),
}

/// Invalid engine configuration. Always fatal; no job is processed with a configuration
/// that failed validation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("ceiling `{name}` must be positive, got {value}")]
    NonPositiveCeiling { name: &'static str, value: f64 },
    #[error("ceiling `{name}` ({value}) is below the minimum request of {floor}")]
    CeilingBelowFloor {
        name: &'static str,
        value: f64,
        floor: f64,
    },
    #[error("invalid base resources of job class `{class}`: {reason}")]
    InvalidBaseResources { class: JobClass, reason: String },
    #[error("invalid scaling factors of job class `{class}`: {reason}")]
    InvalidScalingFactors { class: JobClass, reason: String },
    #[error("unknown job class `{0}`")]
    UnknownJobClass(String),
    #[error("maximum number of attempts must be at least 1")]
    ZeroAttempts,
    #[error("partition threshold `{name}` must be positive, got {value}")]
    InvalidThreshold { name: &'static str, value: f64 },
    #[error("partition name for role `{0}` is empty")]
    EmptyPartitionName(PartitionRole),
    #[error("partition catalog does not contain any partition")]
    EmptyCatalog,
    #[error("default partition `{0}` is not present in the partition catalog")]
    UnknownDefaultPartition(String),
    #[error("static partition strategy requires a default partition or a `compute` partition")]
    MissingDefaultPartition,
}

/// The job cannot be placed on any partition. Fatal for the job, never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PartitionUnavailable {
    #[error("partition role `{0}` is not configured and there is no `compute` partition to fall back to")]
    NoFallback(PartitionRole),
    #[error("partition `{0}` is not present in the partition catalog")]
    NotInCatalog(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RetryError {
    #[error("job {job_id} is already in terminal state {state}")]
    AlreadyTerminal { job_id: JobId, state: RetryState },
}
