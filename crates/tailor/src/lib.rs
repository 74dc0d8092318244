//! Resource sizing engine for cluster jobs.
//!
//! For every unit of work the engine decides how many CPUs, how much memory and how much
//! walltime to request and which partition to submit to. On failure, the per-job retry state
//! machine decides whether a resubmission with escalated resources makes sense. Observed usage
//! of finished jobs can be fed back to produce ranked sizing recommendations.
//!
//! The engine never performs I/O; it is driven by an external submission layer.

pub(crate) mod internal;

pub use crate::internal::common::ids::JobId;
pub use crate::internal::common::{Map, Set};
pub use crate::internal::engine::{
    AllocationEngine, FailureDecision, JobHandle, JobSpec, Snapshot,
};

pub type Error = internal::common::error::TailorError;
pub type Result<T> = std::result::Result<T, Error>;

pub use crate::internal::common::error::{ConfigError, PartitionUnavailable, RetryError};

pub mod units {
    pub use crate::internal::common::units::{
        BYTES_PER_GB, bytes_to_gb, format_walltime, gb_to_bytes, hours_to_duration,
    };
}

pub mod profile {
    pub use crate::internal::profile::{
        DataType, InputFile, InputProfile, SizeCategory, detect_data_type, profile_inputs,
    };
}

pub mod model {
    pub use crate::internal::model::{
        BaseResources, ClassModel, JobClass, ParseJobClassError, ResourceModel, ScalingFactors,
    };
}

pub mod config {
    pub use crate::internal::config::{
        Ceilings, DEFAULT_MAX_ATTEMPTS, EngineConfig, MIN_CPUS, MIN_MEMORY_GB, MIN_TIME_HOURS,
    };
}

pub mod resources {
    pub use crate::internal::calculator::{
        Multipliers, ResourceCalculator, ResourceRequest, sample_multipliers, size_multipliers,
    };
}

pub mod planner {
    pub use crate::internal::planner::{
        LARGE_SAMPLE_THRESHOLD_GB, ParallelPlan, ParallelStrategy, plan_batches,
        plan_parallelization,
    };
}

pub mod partition {
    pub use crate::internal::partition::options::build_cluster_options;
    pub use crate::internal::partition::strategy::{
        IntelligentStrategy, PartitionChoice, PartitionStrategy, PartitionTarget,
        SelectionWarning, StaticStrategy, StrategyKind, UserDefinedStrategy, select_partition,
    };
    pub use crate::internal::partition::{PartitionCatalog, PartitionRole, PartitionThresholds};
}

pub mod retry {
    pub use crate::internal::retry::classify::{FailureKind, JobFailure};
    pub use crate::internal::retry::{
        AttemptRecord, FailureRecord, RetryState, RetryStateMachine, TerminalOutcome,
        TerminalReport, Transition,
    };
}

pub mod observation {
    pub use crate::internal::observation::{
        ExitStatus, ObservationLog, ObservedUsage, UsageObservation,
    };
}

pub mod analysis {
    pub use crate::internal::analysis::{
        CPU_UNDERUTILIZATION_RATIO, ClassEfficiency, MEMORY_BOTTLENECK_RATIO, Recommendation,
        RecommendationKind, ResourceDimension, TIME_BOTTLENECK_RATIO, analyze, summarize,
    };
}

pub mod submission {
    pub use crate::internal::engine::{EngineWarning, SubmissionDescriptor, WarningKind};
}
