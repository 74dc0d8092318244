use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::internal::analysis::{ClassEfficiency, Recommendation, analyze, summarize};
use crate::internal::calculator::{ResourceCalculator, ResourceRequest};
use crate::internal::common::error::{ConfigError, PartitionUnavailable, TailorError};
use crate::internal::common::ids::JobId;
use crate::internal::common::units::format_walltime;
use crate::internal::config::EngineConfig;
use crate::internal::model::{BaseResources, JobClass};
use crate::internal::observation::{ObservationLog, UsageObservation};
use crate::internal::partition::PartitionRole;
use crate::internal::partition::strategy::{PartitionStrategy, SelectionWarning, select_partition};
use crate::internal::planner::{ParallelPlan, plan_batches};
use crate::internal::profile::{InputFile, InputProfile, profile_inputs};
use crate::internal::retry::classify::JobFailure;
use crate::internal::retry::{
    AttemptRecord, RetryState, RetryStateMachine, TerminalOutcome, TerminalReport, Transition,
};

/// A unit of work handed to the engine by the submission layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub id: JobId,
    pub class: JobClass,
    #[serde(default)]
    pub inputs: Vec<InputFile>,
    /// Explicit partition, used by the user-defined strategy.
    #[serde(default)]
    pub partition: Option<String>,
    /// Replaces the base resources of the job class.
    #[serde(default)]
    pub base_override: Option<BaseResources>,
}

impl JobSpec {
    pub fn new<I: Into<JobId>>(id: I, class: JobClass, inputs: Vec<InputFile>) -> Self {
        Self {
            id: id.into(),
            class,
            inputs,
            partition: None,
            base_override: None,
        }
    }
}

/// Everything the submission layer needs to place one attempt of a job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubmissionDescriptor {
    pub job_id: JobId,
    pub job_class: JobClass,
    pub request: ResourceRequest,
    pub partition: String,
    pub cluster_options: Vec<String>,
    pub warnings: Vec<SelectionWarning>,
}

impl SubmissionDescriptor {
    pub fn walltime(&self) -> String {
        format_walltime(self.request.time_hours())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WarningKind {
    PartitionFallback {
        from: PartitionRole,
        to: PartitionRole,
    },
    MissingUserPartition,
    ExhaustedRetries {
        attempts: u32,
    },
    NonRetryableFailure {
        reason: String,
    },
    SubmissionFailed {
        reason: String,
    },
}

impl From<&SelectionWarning> for WarningKind {
    fn from(warning: &SelectionWarning) -> Self {
        match warning {
            SelectionWarning::Fallback { from, to } => WarningKind::PartitionFallback {
                from: *from,
                to: *to,
            },
            SelectionWarning::MissingUserPartition => WarningKind::MissingUserPartition,
        }
    }
}

impl Display for WarningKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            WarningKind::PartitionFallback { from, to } => write!(
                f,
                "partition role `{from}` is not configured, falling back to `{to}`"
            ),
            WarningKind::MissingUserPartition => f.write_str(
                "no partition was given for a user-defined selection, choosing one from the request",
            ),
            WarningKind::ExhaustedRetries { attempts } => {
                write!(f, "retries exhausted after {attempts} attempt(s)")
            }
            WarningKind::NonRetryableFailure { reason } => {
                write!(f, "failure cannot be fixed by more resources: {reason}")
            }
            WarningKind::SubmissionFailed { reason } => {
                write!(f, "next attempt cannot be submitted: {reason}")
            }
        }
    }
}

/// Operator-facing warning of a single job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineWarning {
    pub job_id: JobId,
    pub kind: WarningKind,
    pub message: String,
}

impl EngineWarning {
    pub fn new(job_id: JobId, kind: WarningKind) -> Self {
        let message = kind.to_string();
        Self {
            job_id,
            kind,
            message,
        }
    }
}

/// Validated configuration together with the partition strategy built from it.
#[derive(Debug)]
pub struct Snapshot {
    config: EngineConfig,
    strategy: Box<dyn PartitionStrategy>,
}

impl Snapshot {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let strategy = config.strategy.build();
        Ok(Self { config, strategy })
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline]
    pub fn strategy(&self) -> &dyn PartitionStrategy {
        self.strategy.as_ref()
    }

    pub fn calculator(&self) -> ResourceCalculator<'_> {
        ResourceCalculator::new(&self.config.model, &self.config.ceilings)
    }

    /// Calculates the request of the given attempt and places it on a partition.
    pub fn describe(
        &self,
        job_id: &JobId,
        class: JobClass,
        profile: &InputProfile,
        attempt: u32,
        base_override: Option<&BaseResources>,
        user_partition: Option<&str>,
    ) -> Result<SubmissionDescriptor, PartitionUnavailable> {
        let request = self
            .calculator()
            .calculate(class, profile, attempt, base_override);
        let choice = select_partition(
            self.strategy(),
            class,
            &request,
            user_partition,
            &self.config.catalog,
            &self.config.model.get(class).custom_options,
        )?;
        Ok(SubmissionDescriptor {
            job_id: job_id.clone(),
            job_class: class,
            request,
            partition: choice.partition,
            cluster_options: choice.cluster_options,
            warnings: choice.warnings,
        })
    }
}

/// State of one running job. Pins the configuration snapshot the job was started with.
#[derive(Debug)]
pub struct JobHandle {
    job_id: JobId,
    class: JobClass,
    profile: InputProfile,
    partition: Option<String>,
    base_override: Option<BaseResources>,
    snapshot: Arc<Snapshot>,
    machine: RetryStateMachine,
}

impl JobHandle {
    #[inline]
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    #[inline]
    pub fn class(&self) -> JobClass {
        self.class
    }

    #[inline]
    pub fn profile(&self) -> &InputProfile {
        &self.profile
    }

    #[inline]
    pub fn state(&self) -> RetryState {
        self.machine.state()
    }

    pub fn history(&self) -> &[AttemptRecord] {
        self.machine.history()
    }

    pub fn snapshot(&self) -> &Arc<Snapshot> {
        &self.snapshot
    }
}

#[derive(Debug)]
pub enum FailureDecision {
    Resubmit(SubmissionDescriptor),
    Finished(TerminalReport),
}

/// Entry point of the submission layer.
///
/// All methods take `&self`; the engine is meant to be shared between the threads that
/// dispatch jobs.
#[derive(Debug)]
pub struct AllocationEngine {
    snapshot: RwLock<Arc<Snapshot>>,
    observations: ObservationLog,
    warnings: Mutex<Vec<EngineWarning>>,
}

impl AllocationEngine {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            snapshot: RwLock::new(Arc::new(Snapshot::new(config)?)),
            observations: ObservationLog::new(),
            warnings: Mutex::new(Vec::new()),
        })
    }

    /// Current configuration snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the configuration. Jobs that are already running keep their snapshot.
    pub fn reload(&self, config: EngineConfig) -> Result<(), ConfigError> {
        let snapshot = Arc::new(Snapshot::new(config)?);
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
        log::info!("Engine configuration reloaded");
        Ok(())
    }

    fn emit(&self, job_id: &JobId, kind: WarningKind) {
        let warning = EngineWarning::new(job_id.clone(), kind);
        log::warn!("Job {}: {}", warning.job_id, warning.message);
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(warning);
    }

    fn emit_selection_warnings(&self, descriptor: &SubmissionDescriptor) {
        for warning in &descriptor.warnings {
            self.emit(&descriptor.job_id, warning.into());
        }
    }

    fn emit_terminal_warning(&self, report: &TerminalReport) {
        let kind = match &report.outcome {
            TerminalOutcome::ExhaustedRetries => WarningKind::ExhaustedRetries {
                attempts: report.attempts(),
            },
            TerminalOutcome::NonRetryableFailure { reason } => WarningKind::NonRetryableFailure {
                reason: reason.clone(),
            },
            TerminalOutcome::SubmissionFailed { reason } => WarningKind::SubmissionFailed {
                reason: reason.clone(),
            },
            TerminalOutcome::Succeeded | TerminalOutcome::Canceled => return,
        };
        self.emit(&report.job_id, kind);
    }

    /// Profiles the inputs of a job and produces the descriptor of its first attempt.
    pub fn start_job(&self, spec: JobSpec) -> crate::Result<(JobHandle, SubmissionDescriptor)> {
        let profile = profile_inputs(&spec.inputs);
        self.start_profiled_job(spec, profile)
    }

    /// Same as [`AllocationEngine::start_job`] for a caller that has already profiled the
    /// inputs of the job.
    pub fn start_profiled_job(
        &self,
        spec: JobSpec,
        profile: InputProfile,
    ) -> crate::Result<(JobHandle, SubmissionDescriptor)> {
        let snapshot = self.snapshot();
        let descriptor = snapshot
            .describe(
                &spec.id,
                spec.class,
                &profile,
                1,
                spec.base_override.as_ref(),
                spec.partition.as_deref(),
            )
            .map_err(|source| TailorError::PartitionUnavailable {
                job_id: spec.id.clone(),
                source,
            })?;
        self.emit_selection_warnings(&descriptor);
        log::debug!(
            "Job {} starts on {} with {}",
            spec.id,
            descriptor.partition,
            descriptor.request
        );

        let first = AttemptRecord::new(descriptor.request, descriptor.partition.clone());
        let machine =
            RetryStateMachine::start(spec.id.clone(), snapshot.config().max_attempts, first);
        let handle = JobHandle {
            job_id: spec.id,
            class: spec.class,
            profile,
            partition: spec.partition,
            base_override: spec.base_override,
            snapshot,
            machine,
        };
        Ok((handle, descriptor))
    }

    /// Reports a failed attempt. Either returns the descriptor of the next attempt or the
    /// terminal report of the job.
    pub fn job_failed(
        &self,
        handle: &mut JobHandle,
        failure: &JobFailure,
    ) -> crate::Result<FailureDecision> {
        let transition = handle.machine.on_failure(failure, |attempt| {
            let descriptor = handle.snapshot.describe(
                &handle.job_id,
                handle.class,
                &handle.profile,
                attempt,
                handle.base_override.as_ref(),
                handle.partition.as_deref(),
            )?;
            let record = AttemptRecord::new(descriptor.request, descriptor.partition.clone());
            Ok((record, descriptor))
        })?;
        Ok(match transition {
            Transition::Retry(descriptor) => {
                self.emit_selection_warnings(&descriptor);
                FailureDecision::Resubmit(descriptor)
            }
            Transition::Terminal(report) => {
                self.emit_terminal_warning(&report);
                FailureDecision::Finished(report)
            }
        })
    }

    pub fn job_succeeded(&self, handle: &mut JobHandle) -> crate::Result<TerminalReport> {
        Ok(handle.machine.on_success()?)
    }

    /// Cancels a job. Its observations, past and future, are excluded from the analysis.
    pub fn cancel_job(&self, handle: &mut JobHandle) -> crate::Result<TerminalReport> {
        let report = handle.machine.cancel()?;
        self.observations.mark_canceled(handle.job_id.clone());
        Ok(report)
    }

    pub fn record_observation(&self, observation: UsageObservation) {
        self.observations.append(observation);
    }

    pub fn observations(&self) -> &ObservationLog {
        &self.observations
    }

    pub fn recommendations(&self) -> Vec<Recommendation> {
        analyze(self.observations.snapshot())
    }

    pub fn efficiency_summary(&self) -> Vec<ClassEfficiency> {
        summarize(self.observations.snapshot())
    }

    /// Takes all warnings emitted since the last call.
    pub fn drain_warnings(&self) -> Vec<EngineWarning> {
        std::mem::take(&mut *self.warnings.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Parallelization plan of a batch of jobs, grouped by job class.
    pub fn plan<'a, I>(&self, jobs: I, max_forks: u32) -> BTreeMap<JobClass, ParallelPlan>
    where
        I: IntoIterator<Item = (JobClass, &'a InputProfile)>,
    {
        plan_batches(jobs, max_forks)
    }
}
