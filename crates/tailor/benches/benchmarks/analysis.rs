use chrono::Utc;
use criterion::{BatchSize, BenchmarkId, Criterion};
use std::hint::black_box;

use tailor::JobId;
use tailor::analysis::{analyze, summarize};
use tailor::model::JobClass;
use tailor::observation::{ExitStatus, ObservationLog, ObservedUsage, UsageObservation};
use tailor::resources::ResourceRequest;

fn create_observation(index: usize) -> UsageObservation {
    let class = JobClass::ALL[index % JobClass::ALL.len()];
    let requested = ResourceRequest::new(8, 32.0, 4.0, 1);
    UsageObservation {
        job_id: JobId::new(format!("job-{}", index % 1000)),
        job_class: Some(class),
        attempt: 1,
        requested,
        observed: ObservedUsage {
            max_memory_gb: (index % 40) as f64,
            avg_cpu_percent: (index % 100) as f64,
            wall_clock_hours: (index % 5) as f64,
        },
        exit_status: ExitStatus::Success,
        recorded_at: Utc::now(),
    }
}

fn create_log(count: usize) -> ObservationLog {
    let log = ObservationLog::new();
    for index in 0..count {
        log.append(create_observation(index));
    }
    log
}

fn bench_analyze(c: &mut Criterion) {
    for count in [100, 10_000, 100_000] {
        let log = create_log(count);
        c.bench_with_input(BenchmarkId::new("analyze", count), &log, |b, log| {
            b.iter(|| black_box(analyze(log.snapshot())));
        });
        c.bench_with_input(BenchmarkId::new("summarize", count), &log, |b, log| {
            b.iter(|| black_box(summarize(log.snapshot())));
        });
    }
}

fn bench_append(c: &mut Criterion) {
    for count in [10, 1_000] {
        c.bench_with_input(
            BenchmarkId::new("append observations", count),
            &count,
            |b, &count| {
                b.iter_batched_ref(
                    || (ObservationLog::new(), (0..count).map(create_observation).collect::<Vec<_>>()),
                    |(log, observations)| {
                        for observation in observations.drain(..) {
                            log.append(observation);
                        }
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }
}

pub fn benchmark(c: &mut Criterion) {
    bench_analyze(c);
    bench_append(c);
}
