use criterion::{BenchmarkId, Criterion};
use std::hint::black_box;

use tailor::config::EngineConfig;
use tailor::model::JobClass;
use tailor::partition::{PartitionRole, StrategyKind, select_partition};
use tailor::profile::{InputFile, InputProfile};
use tailor::units::BYTES_PER_GB;
use tailor::{AllocationEngine, JobSpec, Snapshot};

fn bench_calculate_and_select(c: &mut Criterion) {
    let snapshot = Snapshot::new(EngineConfig::default()).unwrap();
    let strategy = StrategyKind::Intelligent.build();
    for size_gb in [1, 100, 1_000] {
        let profile = InputProfile::from_totals(size_gb * BYTES_PER_GB, 4);
        c.bench_with_input(
            BenchmarkId::new("calculate and select", size_gb),
            &profile,
            |b, profile| {
                b.iter(|| {
                    for class in JobClass::ALL {
                        let request = snapshot.calculator().calculate(class, profile, 2, None);
                        let choice = select_partition(
                            strategy.as_ref(),
                            class,
                            &request,
                            None,
                            &snapshot.config().catalog,
                            &[],
                        )
                        .unwrap();
                        black_box(choice);
                    }
                });
            },
        );
    }
}

fn bench_fallback(c: &mut Criterion) {
    let mut config = EngineConfig::default();
    config.catalog.remove_partition(PartitionRole::Bigmem);
    config.catalog.remove_partition(PartitionRole::Gpu);
    let snapshot = Snapshot::new(config).unwrap();
    let profile = InputProfile::from_totals(500 * BYTES_PER_GB, 1);
    c.bench_function("select with fallback", |b| {
        b.iter(|| {
            let request =
                snapshot
                    .calculator()
                    .calculate(JobClass::MemoryIntensive, &profile, 1, None);
            black_box(
                select_partition(
                    snapshot.strategy(),
                    JobClass::MemoryIntensive,
                    &request,
                    None,
                    &snapshot.config().catalog,
                    &[],
                )
                .unwrap(),
            );
        });
    });
}

fn bench_start_job(c: &mut Criterion) {
    let engine = AllocationEngine::new(EngineConfig::default()).unwrap();
    for file_count in [1, 100, 10_000] {
        let spec = JobSpec::new(
            "job",
            JobClass::Medium,
            (0..file_count)
                .map(|i| InputFile::new(format!("sample_{i}.fastq.gz"), BYTES_PER_GB))
                .collect(),
        );
        c.bench_with_input(
            BenchmarkId::new("start job", file_count),
            &spec,
            |b, spec| {
                b.iter(|| black_box(engine.start_job(spec.clone()).unwrap()));
            },
        );
    }
}

pub fn benchmark(c: &mut Criterion) {
    bench_calculate_and_select(c);
    bench_fallback(c);
    bench_start_job(c);
}
