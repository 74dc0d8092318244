use bstr::{BString, ByteSlice};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Exit code of a process killed by SIGKILL, which is what the OOM killer sends.
const EXIT_OOM_KILLED: i32 = 137;
/// Exit code of a PBS/SGE job killed after exceeding its walltime.
const EXIT_WALLTIME_KILLED: i32 = 140;
/// Exit code of a process terminated by SIGTERM, sent by Slurm at the time limit.
const EXIT_TERMINATED: i32 = 143;

const OUT_OF_MEMORY_PATTERNS: &[&str] = &[
    "out of memory",
    "out-of-memory",
    "oom-kill",
    "oom_kill",
    "oom killer",
    "outofmemory",
    "memory limit",
    "exceeded memory",
    "cannot allocate memory",
    "std::bad_alloc",
];

const TIME_LIMIT_PATTERNS: &[&str] = &[
    "time limit",
    "timelimit",
    "walltime",
    "wall time",
    "timed out",
    "time out",
    "deadline exceeded",
];

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    OutOfMemory,
    TimeLimit,
    Other,
}

impl FailureKind {
    /// Only failures caused by too small allocations can be fixed by asking for more.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureKind::OutOfMemory | FailureKind::TimeLimit)
    }
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            FailureKind::OutOfMemory => "out of memory",
            FailureKind::TimeLimit => "time limit exceeded",
            FailureKind::Other => "other",
        })
    }
}

/// Failure of a single attempt as reported by the submission layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobFailure {
    pub exit_code: Option<i32>,
    /// Scheduler or job output; not necessarily valid UTF-8.
    pub message: BString,
}

impl JobFailure {
    pub fn new<M: Into<BString>>(exit_code: Option<i32>, message: M) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn from_message<M: Into<BString>>(message: M) -> Self {
        Self::new(None, message)
    }

    /// Failure of a job that was killed by the scheduler at its time limit.
    pub fn timeout() -> Self {
        Self::from_message("job exceeded its time limit")
    }

    /// The exit code wins over the message when both are known.
    pub fn classify(&self) -> FailureKind {
        match self.exit_code {
            Some(EXIT_OOM_KILLED) => return FailureKind::OutOfMemory,
            Some(EXIT_WALLTIME_KILLED | EXIT_TERMINATED) => return FailureKind::TimeLimit,
            _ => {}
        }
        let message = self.message.to_lowercase();
        if OUT_OF_MEMORY_PATTERNS
            .iter()
            .any(|pattern| message.contains_str(pattern))
        {
            FailureKind::OutOfMemory
        } else if TIME_LIMIT_PATTERNS
            .iter()
            .any(|pattern| message.contains_str(pattern))
        {
            FailureKind::TimeLimit
        } else {
            FailureKind::Other
        }
    }
}

impl Display for JobFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.exit_code {
            Some(code) => write!(f, "exit code {code}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}
