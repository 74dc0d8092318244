use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use crate::internal::common::units::bytes_to_gb;
use crate::internal::model::JobClass;
use crate::internal::profile::InputProfile;

/// Samples larger than this (on average) halve the number of concurrent forks.
pub const LARGE_SAMPLE_THRESHOLD_GB: f64 = 10.0;

const LARGE_SAMPLES_TAG: &str = "large_samples_detected";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParallelStrategy {
    HighParallelization,
    MemoryConservative,
    CpuBalanced,
    GpuExclusive,
    Balanced,
}

impl ParallelStrategy {
    pub fn for_class(class: JobClass) -> Self {
        match class {
            JobClass::Quick | JobClass::Low => ParallelStrategy::HighParallelization,
            JobClass::MemoryIntensive => ParallelStrategy::MemoryConservative,
            JobClass::High => ParallelStrategy::CpuBalanced,
            JobClass::Gpu => ParallelStrategy::GpuExclusive,
            JobClass::Medium => ParallelStrategy::Balanced,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            ParallelStrategy::HighParallelization => "high_parallelization",
            ParallelStrategy::MemoryConservative => "memory_conservative",
            ParallelStrategy::CpuBalanced => "cpu_balanced",
            ParallelStrategy::GpuExclusive => "gpu_exclusive",
            ParallelStrategy::Balanced => "balanced",
        }
    }

    fn base_forks(&self, samples: u32, max_forks: u32) -> u32 {
        match self {
            ParallelStrategy::HighParallelization => samples.min(max_forks),
            ParallelStrategy::MemoryConservative => (max_forks / 4).max(1).min(samples),
            ParallelStrategy::CpuBalanced | ParallelStrategy::Balanced => {
                (max_forks / 2).max(2).min(samples)
            }
            ParallelStrategy::GpuExclusive => 1,
        }
    }
}

impl Display for ParallelStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParallelPlan {
    pub optimal_forks: u32,
    pub batch_size: u32,
    pub strategy: ParallelStrategy,
    pub large_samples_detected: bool,
}

impl ParallelPlan {
    pub fn tags(&self) -> Vec<&'static str> {
        let mut tags = vec![self.strategy.tag()];
        if self.large_samples_detected {
            tags.push(LARGE_SAMPLES_TAG);
        }
        tags
    }
}

/// Computes the concurrency of a group of same-class samples.
///
/// The returned number of forks is always within `1..=min(sample_count, max_forks)`; zero
/// counts are treated as one.
pub fn plan_parallelization(
    class: JobClass,
    sample_count: u32,
    total_size_bytes: u64,
    max_forks: u32,
) -> ParallelPlan {
    let samples = sample_count.max(1);
    let max_forks = max_forks.max(1);
    let strategy = ParallelStrategy::for_class(class);

    let mut forks = strategy.base_forks(samples, max_forks);
    let avg_sample_gb = bytes_to_gb(total_size_bytes / samples as u64);
    let large_samples_detected = avg_sample_gb > LARGE_SAMPLE_THRESHOLD_GB;
    if large_samples_detected {
        forks /= 2;
    }
    let forks = forks.clamp(1, samples.min(max_forks));

    let batch_size = if samples <= forks {
        1
    } else {
        let batch_size = samples.div_ceil(forks);
        match class {
            JobClass::MemoryIntensive => batch_size.min(2),
            JobClass::Quick => batch_size.saturating_mul(2).min(10),
            _ => batch_size,
        }
    };

    log::debug!(
        "Parallelization of {samples} {class} samples ({avg_sample_gb:.1} GB each): \
         forks={forks} batch={batch_size} strategy={strategy}"
    );
    ParallelPlan {
        optimal_forks: forks,
        batch_size,
        strategy,
        large_samples_detected,
    }
}

/// Groups jobs by their class and plans each group. Every job counts as one sample of its
/// group; the group size is the sum of the job input sizes.
pub fn plan_batches<'a, I>(jobs: I, max_forks: u32) -> BTreeMap<JobClass, ParallelPlan>
where
    I: IntoIterator<Item = (JobClass, &'a InputProfile)>,
{
    let mut groups: BTreeMap<JobClass, (u32, u64)> = BTreeMap::new();
    for (class, profile) in jobs {
        let (count, size) = groups.entry(class).or_default();
        *count = count.saturating_add(1);
        *size = size.saturating_add(profile.total_size_bytes());
    }
    groups
        .into_iter()
        .map(|(class, (count, size))| {
            (
                class,
                plan_parallelization(class, count, size, max_forks),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{ParallelStrategy, plan_batches, plan_parallelization};
    use crate::internal::common::units::BYTES_PER_GB;
    use crate::internal::model::JobClass;
    use crate::internal::profile::InputProfile;

    #[test]
    fn test_gpu_is_exclusive() {
        for max_forks in [1, 4, 16, 128] {
            let plan = plan_parallelization(JobClass::Gpu, 50, 50 * BYTES_PER_GB, max_forks);
            assert_eq!(plan.optimal_forks, 1);
            assert_eq!(plan.strategy, ParallelStrategy::GpuExclusive);
        }
    }

    #[test]
    fn test_high_parallelization() {
        let plan = plan_parallelization(JobClass::Quick, 8, BYTES_PER_GB, 16);
        assert_eq!(plan.optimal_forks, 8);
        assert_eq!(plan.batch_size, 1);
        assert_eq!(plan.tags(), vec!["high_parallelization"]);
    }

    #[test]
    fn test_single_batch_when_forks_cover_samples() {
        for class in JobClass::ALL {
            let plan = plan_parallelization(class, 4, 0, 8);
            assert!(plan.optimal_forks <= 4);
            if plan.optimal_forks == 4 {
                assert_eq!(plan.batch_size, 1, "{class}");
            }
        }
        let plan = plan_parallelization(JobClass::Quick, 4, 0, 8);
        assert_eq!(plan.optimal_forks, 4);
        assert_eq!(plan.batch_size, 1);
    }

    #[test]
    fn test_quick_batch_boost() {
        // 40 samples over 8 forks -> 5 per batch, doubled and capped at 10
        let plan = plan_parallelization(JobClass::Quick, 40, BYTES_PER_GB, 8);
        assert_eq!(plan.optimal_forks, 8);
        assert_eq!(plan.batch_size, 10);

        let plan = plan_parallelization(JobClass::Quick, 12, BYTES_PER_GB, 8);
        assert_eq!(plan.batch_size, 4);
    }

    #[test]
    fn test_memory_conservative() {
        let plan = plan_parallelization(JobClass::MemoryIntensive, 20, BYTES_PER_GB, 16);
        assert_eq!(plan.optimal_forks, 4);
        assert_eq!(plan.batch_size, 2);
        assert_eq!(plan.strategy.tag(), "memory_conservative");

        let plan = plan_parallelization(JobClass::MemoryIntensive, 20, BYTES_PER_GB, 2);
        assert_eq!(plan.optimal_forks, 1);
    }

    #[test]
    fn test_balanced_minimum_two_forks() {
        let plan = plan_parallelization(JobClass::Medium, 10, BYTES_PER_GB, 2);
        assert_eq!(plan.optimal_forks, 2);
        assert_eq!(plan.batch_size, 5);
        let plan = plan_parallelization(JobClass::High, 10, BYTES_PER_GB, 12);
        assert_eq!(plan.optimal_forks, 6);
        assert_eq!(plan.strategy, ParallelStrategy::CpuBalanced);
    }

    #[test]
    fn test_large_samples_halve_forks() {
        let plan = plan_parallelization(JobClass::Low, 8, 8 * 20 * BYTES_PER_GB, 16);
        assert!(plan.large_samples_detected);
        assert_eq!(plan.optimal_forks, 4);
        assert_eq!(plan.batch_size, 2);
        assert_eq!(
            plan.tags(),
            vec!["high_parallelization", "large_samples_detected"]
        );

        let plan = plan_parallelization(JobClass::Gpu, 1, 100 * BYTES_PER_GB, 16);
        assert!(plan.large_samples_detected);
        assert_eq!(plan.optimal_forks, 1);
    }

    #[test]
    fn test_forks_never_exceed_samples() {
        let plan = plan_parallelization(JobClass::Medium, 1, 0, 64);
        assert_eq!(plan.optimal_forks, 1);
        let plan = plan_parallelization(JobClass::High, 3, 0, 1);
        assert_eq!(plan.optimal_forks, 1);
        assert_eq!(plan.batch_size, 3);
    }

    #[test]
    fn test_zero_inputs() {
        let plan = plan_parallelization(JobClass::Low, 0, 0, 0);
        assert_eq!(plan.optimal_forks, 1);
        assert_eq!(plan.batch_size, 1);
    }

    #[test]
    fn test_plan_batches_groups_by_class() {
        let small = InputProfile::from_totals(BYTES_PER_GB, 2);
        let large = InputProfile::from_totals(30 * BYTES_PER_GB, 1);
        let jobs = vec![
            (JobClass::Quick, &small),
            (JobClass::Quick, &small),
            (JobClass::Quick, &small),
            (JobClass::Gpu, &large),
        ];
        let plans = plan_batches(jobs, 8);
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[&JobClass::Quick].optimal_forks, 3);
        assert_eq!(plans[&JobClass::Gpu].optimal_forks, 1);
        assert!(plans[&JobClass::Gpu].large_samples_detected);
    }
}
