//! Per-job retry state machine.
//!
//! Every job owns one machine. It starts in `Attempt(1)` and moves forward only through
//! [`RetryStateMachine::on_failure`], [`RetryStateMachine::on_success`] and
//! [`RetryStateMachine::cancel`]. Once terminal, every further transition is rejected, so the
//! terminal report of a job is produced exactly once.
pub(crate) mod classify;

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::internal::calculator::ResourceRequest;
use crate::internal::common::error::{PartitionUnavailable, RetryError};
use crate::internal::common::ids::JobId;
use crate::internal::retry::classify::{FailureKind, JobFailure};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryState {
    Attempt(u32),
    Succeeded,
    ExhaustedRetries,
    SubmissionFailed,
    Canceled,
}

impl RetryState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RetryState::Attempt(_))
    }
}

impl Display for RetryState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryState::Attempt(n) => write!(f, "attempt {n}"),
            RetryState::Succeeded => f.write_str("succeeded"),
            RetryState::ExhaustedRetries => f.write_str("exhausted retries"),
            RetryState::SubmissionFailed => f.write_str("submission failed"),
            RetryState::Canceled => f.write_str("canceled"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub exit_code: Option<i32>,
    pub kind: FailureKind,
    pub message: String,
}

impl FailureRecord {
    fn new(failure: &JobFailure, kind: FailureKind) -> Self {
        Self {
            exit_code: failure.exit_code,
            kind,
            message: failure.message.to_string(),
        }
    }
}

/// One submitted attempt of a job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub request: ResourceRequest,
    pub partition: String,
    pub failure: Option<FailureRecord>,
}

impl AttemptRecord {
    pub fn new(request: ResourceRequest, partition: String) -> Self {
        Self {
            attempt: request.attempt(),
            request,
            partition,
            failure: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TerminalOutcome {
    Succeeded,
    /// The retry budget was used up by retryable failures.
    ExhaustedRetries,
    /// A failure that more resources cannot fix.
    NonRetryableFailure { reason: String },
    /// The next attempt could not be placed on any partition.
    SubmissionFailed { reason: String },
    Canceled,
}

impl Display for TerminalOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminalOutcome::Succeeded => f.write_str("succeeded"),
            TerminalOutcome::ExhaustedRetries => f.write_str("exhausted retries"),
            TerminalOutcome::NonRetryableFailure { reason } => {
                write!(f, "non-retryable failure ({reason})")
            }
            TerminalOutcome::SubmissionFailed { reason } => {
                write!(f, "submission failed ({reason})")
            }
            TerminalOutcome::Canceled => f.write_str("canceled"),
        }
    }
}

/// Final result of a job together with the full escalation history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TerminalReport {
    pub job_id: JobId,
    pub outcome: TerminalOutcome,
    pub history: Vec<AttemptRecord>,
}

impl TerminalReport {
    pub fn attempts(&self) -> u32 {
        self.history.len() as u32
    }
}

#[derive(Debug)]
pub enum Transition<T> {
    Retry(T),
    Terminal(TerminalReport),
}

#[derive(Debug)]
pub struct RetryStateMachine {
    job_id: JobId,
    max_attempts: u32,
    state: RetryState,
    history: Vec<AttemptRecord>,
}

impl RetryStateMachine {
    /// Starts the machine with the record of the first submitted attempt.
    pub fn start(job_id: JobId, max_attempts: u32, first: AttemptRecord) -> Self {
        Self {
            job_id,
            max_attempts: max_attempts.max(1),
            state: RetryState::Attempt(1),
            history: vec![first],
        }
    }

    #[inline]
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    #[inline]
    pub fn state(&self) -> RetryState {
        self.state
    }

    #[inline]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn history(&self) -> &[AttemptRecord] {
        &self.history
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    fn current_attempt(&self) -> Result<u32, RetryError> {
        match self.state {
            RetryState::Attempt(n) => Ok(n),
            state => Err(RetryError::AlreadyTerminal {
                job_id: self.job_id.clone(),
                state,
            }),
        }
    }

    fn finish(&mut self, state: RetryState, outcome: TerminalOutcome) -> TerminalReport {
        self.state = state;
        log::debug!("Job {} finished: {outcome}", self.job_id);
        TerminalReport {
            job_id: self.job_id.clone(),
            outcome,
            history: self.history.clone(),
        }
    }

    /// Handles the failure of the current attempt.
    ///
    /// For a retryable failure within the attempt budget, `next_attempt` is called with the
    /// number of the next attempt and must produce its record (usually by recalculating the
    /// request from scratch). Its error ends the job as failed-to-submit.
    pub fn on_failure<T, F>(
        &mut self,
        failure: &JobFailure,
        next_attempt: F,
    ) -> Result<Transition<T>, RetryError>
    where
        F: FnOnce(u32) -> Result<(AttemptRecord, T), PartitionUnavailable>,
    {
        let attempt = self.current_attempt()?;
        let kind = failure.classify();
        if let Some(record) = self.history.last_mut() {
            record.failure = Some(FailureRecord::new(failure, kind));
        }

        if !kind.is_retryable() {
            let reason = failure.to_string();
            return Ok(Transition::Terminal(self.finish(
                RetryState::ExhaustedRetries,
                TerminalOutcome::NonRetryableFailure { reason },
            )));
        }
        if attempt >= self.max_attempts {
            return Ok(Transition::Terminal(
                self.finish(RetryState::ExhaustedRetries, TerminalOutcome::ExhaustedRetries),
            ));
        }

        let next = attempt + 1;
        match next_attempt(next) {
            Ok((record, value)) => {
                log::debug!(
                    "Job {} failed ({kind}) in attempt {attempt}, retrying with {}",
                    self.job_id,
                    record.request
                );
                self.history.push(record);
                self.state = RetryState::Attempt(next);
                Ok(Transition::Retry(value))
            }
            Err(error) => Ok(Transition::Terminal(self.finish(
                RetryState::SubmissionFailed,
                TerminalOutcome::SubmissionFailed {
                    reason: error.to_string(),
                },
            ))),
        }
    }

    pub fn on_success(&mut self) -> Result<TerminalReport, RetryError> {
        self.current_attempt()?;
        Ok(self.finish(RetryState::Succeeded, TerminalOutcome::Succeeded))
    }

    /// The job was canceled by the submission layer; no further attempt is produced.
    pub fn cancel(&mut self) -> Result<TerminalReport, RetryError> {
        self.current_attempt()?;
        Ok(self.finish(RetryState::Canceled, TerminalOutcome::Canceled))
    }
}
