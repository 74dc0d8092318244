use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::internal::calculator::ResourceRequest;
use crate::internal::common::data_structures::Set;
use crate::internal::common::ids::JobId;
use crate::internal::model::JobClass;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    Success,
    Failure,
    Timeout,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObservedUsage {
    pub max_memory_gb: f64,
    pub avg_cpu_percent: f64,
    pub wall_clock_hours: f64,
}

/// Resources actually used by one finished attempt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UsageObservation {
    pub job_id: JobId,
    #[serde(default)]
    pub job_class: Option<JobClass>,
    pub attempt: u32,
    pub requested: ResourceRequest,
    pub observed: ObservedUsage,
    pub exit_status: ExitStatus,
    #[serde(default = "Utc::now")]
    pub recorded_at: DateTime<Utc>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Append-only log of usage observations, shared by all jobs.
///
/// Locks are held only to push or to clone the `Arc`s of a snapshot, so analysis never blocks
/// writers for longer than a copy of the pointers.
#[derive(Default, Debug)]
pub struct ObservationLog {
    entries: Mutex<Vec<Arc<UsageObservation>>>,
    canceled: Mutex<Set<JobId>>,
}

impl ObservationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, observation: UsageObservation) {
        lock(&self.entries).push(Arc::new(observation));
    }

    /// Observations of a canceled job are excluded from every later snapshot.
    pub fn mark_canceled(&self, job_id: JobId) {
        lock(&self.canceled).insert(job_id);
    }

    pub fn is_canceled(&self, job_id: &JobId) -> bool {
        lock(&self.canceled).contains(job_id)
    }

    /// Point-in-time copy of the log in append order.
    pub fn snapshot(&self) -> Vec<Arc<UsageObservation>> {
        let canceled = lock(&self.canceled).clone();
        let entries = lock(&self.entries).clone();
        if canceled.is_empty() {
            return entries;
        }
        entries
            .into_iter()
            .filter(|observation| !canceled.contains(&observation.job_id))
            .collect()
    }

    /// Number of appended observations, including those of canceled jobs.
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::{ExitStatus, ObservationLog, ObservedUsage, UsageObservation};
    use crate::internal::calculator::ResourceRequest;
    use crate::internal::common::ids::JobId;
    use crate::internal::model::JobClass;
    use chrono::Utc;
    use std::sync::Arc;

    fn observation(job_id: &str, attempt: u32) -> UsageObservation {
        UsageObservation {
            job_id: JobId::new(job_id),
            job_class: Some(JobClass::Low),
            attempt,
            requested: ResourceRequest::new(2, 4.0, 2.0, attempt),
            observed: ObservedUsage {
                max_memory_gb: 1.0,
                avg_cpu_percent: 80.0,
                wall_clock_hours: 1.0,
            },
            exit_status: ExitStatus::Success,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_snapshot_keeps_append_order() {
        let log = ObservationLog::new();
        log.append(observation("a", 1));
        log.append(observation("b", 1));
        log.append(observation("a", 2));
        let snapshot = log.snapshot();
        assert_eq!(
            snapshot
                .iter()
                .map(|o| (o.job_id.as_str(), o.attempt))
                .collect::<Vec<_>>(),
            vec![("a", 1), ("b", 1), ("a", 2)]
        );
    }

    #[test]
    fn test_snapshot_is_point_in_time() {
        let log = ObservationLog::new();
        log.append(observation("a", 1));
        let snapshot = log.snapshot();
        log.append(observation("b", 1));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_canceled_jobs_are_excluded() {
        let log = ObservationLog::new();
        log.append(observation("a", 1));
        log.append(observation("b", 1));
        log.mark_canceled(JobId::new("a"));
        log.append(observation("a", 2));
        let snapshot = log.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].job_id.as_str(), "b");
        assert!(log.is_canceled(&JobId::new("a")));
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_concurrent_appends() {
        let log = Arc::new(ObservationLog::new());
        std::thread::scope(|scope| {
            for worker in 0..8 {
                let log = log.clone();
                scope.spawn(move || {
                    for i in 0..100 {
                        log.append(observation(&format!("job-{worker}-{i}"), 1));
                    }
                });
            }
        });
        assert_eq!(log.snapshot().len(), 800);
    }

    #[test]
    fn test_deserialize_without_optional_fields() {
        let observation: UsageObservation = serde_json::from_str(
            r#"{"job_id": "x", "attempt": 1,
                "requested": {"cpus": 4, "memory_gb": 8.0, "time_hours": 1.0, "attempt": 1},
                "observed": {"max_memory_gb": 7.9, "avg_cpu_percent": 20.0, "wall_clock_hours": 0.2},
                "exit_status": "timeout"}"#,
        )
        .unwrap();
        assert_eq!(observation.job_class, None);
        assert_eq!(observation.exit_status, ExitStatus::Timeout);
        assert_eq!(observation.requested.cpus(), 4);
    }
}
