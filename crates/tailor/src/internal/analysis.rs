use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use crate::internal::common::data_structures::{Map, Set};
use crate::internal::common::ids::JobId;
use crate::internal::common::units::ceil_to_minutes;
use crate::internal::model::JobClass;
use crate::internal::observation::{ExitStatus, UsageObservation};

/// Peak memory above this share of the request is a memory bottleneck.
pub const MEMORY_BOTTLENECK_RATIO: f64 = 0.95;
/// Average CPU utilization below this share of the requested CPUs is underutilization.
pub const CPU_UNDERUTILIZATION_RATIO: f64 = 0.3;
/// Walltime above this share of the request is a time bottleneck.
pub const TIME_BOTTLENECK_RATIO: f64 = 0.9;

const HEADROOM: f64 = 1.2;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceDimension {
    Memory,
    Time,
    Cpu,
}

impl Display for ResourceDimension {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ResourceDimension::Memory => "memory",
            ResourceDimension::Time => "time",
            ResourceDimension::Cpu => "cpu",
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    MemoryBottleneck,
    TimeBottleneck,
    CpuUnderutilization,
}

impl RecommendationKind {
    pub fn priority(&self) -> u8 {
        match self {
            RecommendationKind::MemoryBottleneck => 3,
            RecommendationKind::TimeBottleneck => 2,
            RecommendationKind::CpuUnderutilization => 1,
        }
    }

    pub fn dimension(&self) -> ResourceDimension {
        match self {
            RecommendationKind::MemoryBottleneck => ResourceDimension::Memory,
            RecommendationKind::TimeBottleneck => ResourceDimension::Time,
            RecommendationKind::CpuUnderutilization => ResourceDimension::Cpu,
        }
    }
}

impl Display for RecommendationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RecommendationKind::MemoryBottleneck => "memory bottleneck",
            RecommendationKind::TimeBottleneck => "time bottleneck",
            RecommendationKind::CpuUnderutilization => "cpu underutilization",
        })
    }
}

/// Advisory sizing change for one resource dimension of one job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub job_id: JobId,
    pub job_class: Option<JobClass>,
    pub attempt: u32,
    pub kind: RecommendationKind,
    pub priority: u8,
    /// Observed value divided by the requested value.
    pub ratio: f64,
    /// Distance of the ratio past its threshold.
    pub severity: f64,
    pub requested: f64,
    pub suggested: f64,
    pub message: String,
}

impl Recommendation {
    #[inline]
    pub fn dimension(&self) -> ResourceDimension {
        self.kind.dimension()
    }
}

fn recommendation(
    observation: &UsageObservation,
    kind: RecommendationKind,
    ratio: f64,
    severity: f64,
    requested: f64,
    suggested: f64,
) -> Recommendation {
    let message = match kind {
        RecommendationKind::MemoryBottleneck => format!(
            "peak memory reached {:.0}% of the {requested} GB request, increase memory to {suggested} GB",
            ratio * 100.0
        ),
        RecommendationKind::TimeBottleneck => format!(
            "runtime reached {:.0}% of the {requested} h request, increase walltime to {suggested} h",
            ratio * 100.0
        ),
        RecommendationKind::CpuUnderutilization => format!(
            "only {:.0}% of {requested} CPUs were used, reduce CPUs to {suggested} or run more samples in parallel",
            ratio * 100.0
        ),
    };
    Recommendation {
        job_id: observation.job_id.clone(),
        job_class: observation.job_class,
        attempt: observation.attempt,
        kind,
        priority: kind.priority(),
        ratio,
        severity,
        requested,
        suggested,
        message,
    }
}

fn inspect(observation: &UsageObservation, out: &mut Vec<Recommendation>) {
    let requested = &observation.requested;
    let observed = &observation.observed;

    if requested.memory_gb() > 0.0 {
        let ratio = observed.max_memory_gb / requested.memory_gb();
        if ratio > MEMORY_BOTTLENECK_RATIO {
            out.push(recommendation(
                observation,
                RecommendationKind::MemoryBottleneck,
                ratio,
                ratio - MEMORY_BOTTLENECK_RATIO,
                requested.memory_gb(),
                (observed.max_memory_gb * HEADROOM).ceil(),
            ));
        }
    }
    if requested.time_hours() > 0.0 {
        let ratio = observed.wall_clock_hours / requested.time_hours();
        if ratio > TIME_BOTTLENECK_RATIO {
            out.push(recommendation(
                observation,
                RecommendationKind::TimeBottleneck,
                ratio,
                ratio - TIME_BOTTLENECK_RATIO,
                requested.time_hours(),
                ceil_to_minutes(observed.wall_clock_hours * HEADROOM),
            ));
        }
    }
    if requested.cpus() > 1 && observed.avg_cpu_percent.is_finite() {
        let utilization = observed.avg_cpu_percent.max(0.0) / 100.0;
        if utilization < CPU_UNDERUTILIZATION_RATIO {
            let cpus = requested.cpus() as f64;
            out.push(recommendation(
                observation,
                RecommendationKind::CpuUnderutilization,
                utilization,
                CPU_UNDERUTILIZATION_RATIO - utilization,
                cpus,
                (cpus * utilization).ceil().max(1.0),
            ));
        }
    }
}

/// Produces the ranked recommendations of a set of observations.
///
/// Only the most severe recommendation of every job and resource dimension is kept. The
/// result is ordered by priority, then by severity, then by job id.
pub fn analyze<I>(observations: I) -> Vec<Recommendation>
where
    I: IntoIterator,
    I::Item: Borrow<UsageObservation>,
{
    let mut found = Vec::new();
    for observation in observations {
        inspect(observation.borrow(), &mut found);
    }

    let mut strongest: Map<(JobId, ResourceDimension), Recommendation> = Map::default();
    for rec in found {
        let key = (rec.job_id.clone(), rec.dimension());
        match strongest.get_mut(&key) {
            Some(existing) => {
                if rec.severity > existing.severity {
                    *existing = rec;
                }
            }
            None => {
                strongest.insert(key, rec);
            }
        }
    }

    let mut recommendations: Vec<_> = strongest.into_values().collect();
    recommendations.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| b.severity.total_cmp(&a.severity))
            .then_with(|| a.job_id.cmp(&b.job_id))
    });
    log::debug!("Analysis produced {} recommendations", recommendations.len());
    recommendations
}

/// Usage efficiency of one job class. Utilizations are means of observed/requested ratios.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassEfficiency {
    pub job_class: Option<JobClass>,
    pub jobs: usize,
    pub observations: usize,
    pub failures: usize,
    pub timeouts: usize,
    pub mean_memory_utilization: Option<f64>,
    pub mean_cpu_utilization: Option<f64>,
    pub mean_time_utilization: Option<f64>,
}

#[derive(Default)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn add(&mut self, value: f64) {
        if value.is_finite() {
            self.sum += value;
            self.count += 1;
        }
    }

    fn get(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

#[derive(Default)]
struct ClassAccumulator {
    jobs: Set<JobId>,
    observations: usize,
    failures: usize,
    timeouts: usize,
    memory: Mean,
    cpu: Mean,
    time: Mean,
}

/// Per-class efficiency summary, ordered by job class. Observations without a class are
/// summarized together and come first.
pub fn summarize<I>(observations: I) -> Vec<ClassEfficiency>
where
    I: IntoIterator,
    I::Item: Borrow<UsageObservation>,
{
    let mut classes: BTreeMap<Option<JobClass>, ClassAccumulator> = BTreeMap::new();
    for observation in observations {
        let observation = observation.borrow();
        let acc = classes.entry(observation.job_class).or_default();
        acc.jobs.insert(observation.job_id.clone());
        acc.observations += 1;
        match observation.exit_status {
            ExitStatus::Success => {}
            ExitStatus::Failure => acc.failures += 1,
            ExitStatus::Timeout => acc.timeouts += 1,
        }
        let requested = &observation.requested;
        if requested.memory_gb() > 0.0 {
            acc.memory
                .add(observation.observed.max_memory_gb / requested.memory_gb());
        }
        if requested.time_hours() > 0.0 {
            acc.time
                .add(observation.observed.wall_clock_hours / requested.time_hours());
        }
        acc.cpu.add(observation.observed.avg_cpu_percent / 100.0);
    }
    classes
        .into_iter()
        .map(|(job_class, acc)| ClassEfficiency {
            job_class,
            jobs: acc.jobs.len(),
            observations: acc.observations,
            failures: acc.failures,
            timeouts: acc.timeouts,
            mean_memory_utilization: acc.memory.get(),
            mean_cpu_utilization: acc.cpu.get(),
            mean_time_utilization: acc.time.get(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{RecommendationKind, analyze, summarize};
    use crate::internal::calculator::ResourceRequest;
    use crate::internal::common::ids::JobId;
    use crate::internal::model::JobClass;
    use crate::internal::observation::{ExitStatus, ObservedUsage, UsageObservation};
    use chrono::Utc;

    fn observation(
        job_id: &str,
        requested: ResourceRequest,
        memory_gb: f64,
        cpu_percent: f64,
        hours: f64,
    ) -> UsageObservation {
        UsageObservation {
            job_id: JobId::new(job_id),
            job_class: Some(JobClass::Medium),
            attempt: requested.attempt(),
            requested,
            observed: ObservedUsage {
                max_memory_gb: memory_gb,
                avg_cpu_percent: cpu_percent,
                wall_clock_hours: hours,
            },
            exit_status: ExitStatus::Success,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_memory_bottleneck() {
        let obs = observation("a", ResourceRequest::new(1, 10.0, 10.0, 1), 9.8, 100.0, 1.0);
        let recs = analyze([&obs]);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].kind, RecommendationKind::MemoryBottleneck);
        assert_eq!(recs[0].priority, 3);
        assert_eq!(recs[0].suggested, 12.0);
    }

    #[test]
    fn test_time_bottleneck() {
        let obs = observation("a", ResourceRequest::new(1, 10.0, 2.0, 1), 1.0, 100.0, 1.9);
        let recs = analyze([&obs]);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].kind, RecommendationKind::TimeBottleneck);
        // 1.9 h * 1.2 = 2.28 h -> 137 minutes
        assert_eq!((recs[0].suggested * 60.0).round(), 137.0);
    }

    #[test]
    fn test_cpu_underutilization() {
        let obs = observation("a", ResourceRequest::new(8, 10.0, 10.0, 1), 1.0, 20.0, 1.0);
        let recs = analyze([&obs]);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].kind, RecommendationKind::CpuUnderutilization);
        assert_eq!(recs[0].suggested, 2.0);

        // A single CPU job is never underutilized
        let obs = observation("b", ResourceRequest::new(1, 10.0, 10.0, 1), 1.0, 1.0, 1.0);
        assert!(analyze([&obs]).is_empty());
    }

    #[test]
    fn test_missing_cpu_reading_is_not_underutilization() {
        let obs = observation("a", ResourceRequest::new(8, 10.0, 10.0, 1), 1.0, f64::NAN, 1.0);
        assert!(analyze([&obs]).is_empty());
    }

    #[test]
    fn test_thresholds_are_exclusive() {
        let obs = observation("a", ResourceRequest::new(2, 100.0, 10.0, 1), 95.0, 30.0, 9.0);
        assert!(analyze([&obs]).is_empty());
    }

    #[test]
    fn test_ranking() {
        let observations = vec![
            observation("cpu", ResourceRequest::new(8, 10.0, 10.0, 1), 1.0, 5.0, 1.0),
            observation("time", ResourceRequest::new(1, 10.0, 1.0, 1), 1.0, 100.0, 1.0),
            observation("mem-low", ResourceRequest::new(1, 10.0, 10.0, 1), 9.6, 100.0, 1.0),
            observation("mem-high", ResourceRequest::new(1, 10.0, 10.0, 1), 10.0, 100.0, 1.0),
        ];
        let recs = analyze(&observations);
        assert_eq!(
            recs.iter().map(|r| r.job_id.as_str()).collect::<Vec<_>>(),
            vec!["mem-high", "mem-low", "time", "cpu"]
        );
    }

    #[test]
    fn test_dedup_keeps_most_severe() {
        let observations = vec![
            observation("a", ResourceRequest::new(1, 10.0, 10.0, 1), 9.6, 100.0, 1.0),
            observation("a", ResourceRequest::new(1, 20.0, 10.0, 2), 20.0, 100.0, 1.0),
            observation("b", ResourceRequest::new(1, 10.0, 10.0, 1), 9.7, 100.0, 1.0),
        ];
        let recs = analyze(&observations);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].job_id.as_str(), "a");
        assert_eq!(recs[0].attempt, 2);
        assert_eq!(recs[1].job_id.as_str(), "b");
    }

    #[test]
    fn test_non_positive_request_is_skipped() {
        let obs = observation("a", ResourceRequest::new(1, 0.0, 0.0, 1), 5.0, 100.0, 5.0);
        assert!(analyze([&obs]).is_empty());
    }

    #[test]
    fn test_summarize() {
        let mut failed = observation("a", ResourceRequest::new(2, 10.0, 10.0, 1), 10.0, 50.0, 2.5);
        failed.exit_status = ExitStatus::Failure;
        let mut gpu = observation("c", ResourceRequest::new(2, 10.0, 10.0, 1), 2.0, 50.0, 10.0);
        gpu.job_class = Some(JobClass::Gpu);
        gpu.exit_status = ExitStatus::Timeout;
        let observations = vec![
            failed,
            observation("a", ResourceRequest::new(2, 20.0, 10.0, 2), 10.0, 100.0, 5.0),
            gpu,
        ];
        let summary = summarize(&observations);
        assert_eq!(summary.len(), 2);

        let medium = &summary[0];
        assert_eq!(medium.job_class, Some(JobClass::Medium));
        assert_eq!(medium.jobs, 1);
        assert_eq!(medium.observations, 2);
        assert_eq!(medium.failures, 1);
        assert_eq!(medium.mean_memory_utilization, Some(0.75));
        assert_eq!(medium.mean_cpu_utilization, Some(0.75));
        assert_eq!(medium.mean_time_utilization, Some(0.375));

        assert_eq!(summary[1].job_class, Some(JobClass::Gpu));
        assert_eq!(summary[1].timeouts, 1);
    }
}
