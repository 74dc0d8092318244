use crate::internal::common::error::{PartitionUnavailable, RetryError, TailorError};
use crate::internal::common::ids::JobId;
use crate::internal::common::units::BYTES_PER_GB;
use crate::internal::engine::{AllocationEngine, FailureDecision, SubmissionDescriptor, WarningKind};
use crate::internal::model::JobClass;
use crate::internal::partition::strategy::{SelectionWarning, StrategyKind};
use crate::internal::partition::PartitionRole;
use crate::internal::profile::InputProfile;
use crate::internal::retry::{RetryState, TerminalOutcome, TerminalReport};
use crate::internal::tests::utils::config::{TestConfigBuilder, test_engine};
use crate::internal::tests::utils::job::{bad_input, job, observation, oom};
use crate::internal::tests::utils::{enable_test_logging, sorted_vec};
use std::sync::Arc;

fn expect_resubmit(decision: FailureDecision) -> SubmissionDescriptor {
    match decision {
        FailureDecision::Resubmit(descriptor) => descriptor,
        FailureDecision::Finished(report) => panic!("Expected resubmit, got {report:?}"),
    }
}

fn expect_finished(decision: FailureDecision) -> TerminalReport {
    match decision {
        FailureDecision::Finished(report) => report,
        FailureDecision::Resubmit(descriptor) => panic!("Expected finish, got {descriptor:?}"),
    }
}

#[test]
fn test_memory_intensive_large_input_goes_to_bigmem() {
    enable_test_logging();
    let engine = test_engine();
    let (_, descriptor) = engine
        .start_job(job("asm", JobClass::MemoryIntensive, &[120.0]))
        .unwrap();
    assert_eq!(descriptor.request.memory_gb(), 1000.0);
    assert_eq!(descriptor.request.cpus(), 14);
    assert_eq!(descriptor.request.time_hours(), 72.0);
    assert_eq!(descriptor.partition, "bigmem");
    assert_eq!(descriptor.walltime(), "72:00:00");
    assert_eq!(
        descriptor.cluster_options,
        vec!["--mem=1000G", "--cpus-per-task=14", "--constraint=bigmem"]
    );
    assert!(engine.drain_warnings().is_empty());
}

#[test]
fn test_start_with_precomputed_profile() {
    let engine = test_engine();
    let spec = job("asm", JobClass::MemoryIntensive, &[]);
    let profile = InputProfile::from_totals(120 * BYTES_PER_GB, 1);
    let (handle, descriptor) = engine.start_profiled_job(spec, profile.clone()).unwrap();
    assert_eq!(handle.profile(), &profile);
    assert_eq!(descriptor.request.memory_gb(), 1000.0);
    assert_eq!(descriptor.partition, "bigmem");
}

#[test]
fn test_fractional_memory_ceiling_requests_whole_gb() {
    let engine = TestConfigBuilder::default().max_memory_gb(100.5).engine();
    let (_, descriptor) = engine
        .start_job(job("asm", JobClass::MemoryIntensive, &[120.0]))
        .unwrap();
    assert_eq!(descriptor.request.memory_gb(), 100.0);
    assert_eq!(
        descriptor.cluster_options,
        vec!["--mem=100G", "--cpus-per-task=14", "--constraint=bigmem"]
    );
}

#[test]
fn test_small_quick_job_goes_to_quick() {
    let engine = test_engine();
    let (handle, descriptor) = engine
        .start_job(job("qc", JobClass::Quick, &[0.5]))
        .unwrap();
    assert_eq!(descriptor.partition, "quick");
    assert_eq!(descriptor.request.cpus(), 1);
    assert_eq!(descriptor.request.memory_gb(), 2.0);
    assert_eq!(handle.state(), RetryState::Attempt(1));
    assert_eq!(handle.profile().sample_count(), 1);
}

#[test]
fn test_missing_bigmem_falls_back_with_one_warning() {
    let engine = TestConfigBuilder::default()
        .roles(vec![
            PartitionRole::Compute,
            PartitionRole::Gpu,
            PartitionRole::Quick,
        ])
        .engine();
    let (_, descriptor) = engine
        .start_job(job("asm", JobClass::MemoryIntensive, &[1.0]))
        .unwrap();
    assert_eq!(descriptor.partition, "compute");
    assert_eq!(
        descriptor.warnings,
        vec![SelectionWarning::Fallback {
            from: PartitionRole::Bigmem,
            to: PartitionRole::Compute
        }]
    );

    let warnings = engine.drain_warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].job_id, JobId::new("asm"));
    assert_eq!(
        warnings[0].kind,
        WarningKind::PartitionFallback {
            from: PartitionRole::Bigmem,
            to: PartitionRole::Compute
        }
    );
    assert!(engine.drain_warnings().is_empty());
}

#[test]
fn test_oom_failure_escalates_resources() {
    let engine = test_engine();
    let (mut handle, first) = engine
        .start_job(job("annot", JobClass::High, &[4.0]))
        .unwrap();
    let second = expect_resubmit(engine.job_failed(&mut handle, &oom()).unwrap());
    assert_eq!(second.request.attempt(), 2);
    assert!(second.request.memory_gb() > first.request.memory_gb());
    assert!(second.request.cpus() > first.request.cpus());
    assert!(second.request.time_hours() > first.request.time_hours());
    assert_eq!(handle.state(), RetryState::Attempt(2));
    assert_eq!(handle.history().len(), 2);
}

#[test]
fn test_non_retryable_failure_finishes_immediately() {
    let engine = test_engine();
    let (mut handle, _) = engine
        .start_job(job("classify", JobClass::Medium, &[2.0]))
        .unwrap();
    let report = expect_finished(engine.job_failed(&mut handle, &bad_input()).unwrap());
    assert!(matches!(
        report.outcome,
        TerminalOutcome::NonRetryableFailure { .. }
    ));
    assert_eq!(report.attempts(), 1);
    assert_eq!(handle.state(), RetryState::ExhaustedRetries);

    let warnings = engine.drain_warnings();
    assert_eq!(warnings.len(), 1);
    assert!(matches!(
        warnings[0].kind,
        WarningKind::NonRetryableFailure { .. }
    ));
}

#[test]
fn test_retries_are_exhausted() {
    let engine = TestConfigBuilder::default().max_attempts(2).engine();
    let (mut handle, _) = engine
        .start_job(job("annot", JobClass::Low, &[1.0]))
        .unwrap();
    expect_resubmit(engine.job_failed(&mut handle, &oom()).unwrap());
    let report = expect_finished(engine.job_failed(&mut handle, &oom()).unwrap());
    assert_eq!(report.outcome, TerminalOutcome::ExhaustedRetries);
    assert_eq!(
        report.history.iter().map(|r| r.attempt).collect::<Vec<_>>(),
        vec![1, 2]
    );
    assert_eq!(
        engine.drain_warnings()[0].kind,
        WarningKind::ExhaustedRetries { attempts: 2 }
    );

    match engine.job_failed(&mut handle, &oom()) {
        Err(TailorError::RetryError(RetryError::AlreadyTerminal { state, .. })) => {
            assert_eq!(state, RetryState::ExhaustedRetries)
        }
        other => panic!("Unexpected result {other:?}"),
    }
}

#[test]
fn test_successful_job() {
    let engine = test_engine();
    let (mut handle, _) = engine
        .start_job(job("trim", JobClass::Low, &[1.0, 1.0]))
        .unwrap();
    expect_resubmit(engine.job_failed(&mut handle, &oom()).unwrap());
    let report = engine.job_succeeded(&mut handle).unwrap();
    assert_eq!(report.outcome, TerminalOutcome::Succeeded);
    assert_eq!(report.attempts(), 2);
    assert!(engine.job_succeeded(&mut handle).is_err());
}

#[test]
fn test_no_compute_partition_fails_submission() {
    let engine = TestConfigBuilder::default()
        .roles(vec![PartitionRole::Gpu])
        .engine();
    match engine.start_job(job("trim", JobClass::Medium, &[1.0])) {
        Err(TailorError::PartitionUnavailable { job_id, source }) => {
            assert_eq!(job_id, JobId::new("trim"));
            assert_eq!(
                source,
                PartitionUnavailable::NoFallback(PartitionRole::Compute)
            );
        }
        other => panic!("Unexpected result {other:?}"),
    }
    // Sibling jobs are not affected
    assert!(
        engine
            .start_job(job("gpu", JobClass::Gpu, &[1.0]))
            .is_ok()
    );
}

#[test]
fn test_escalation_leaving_partition_ends_as_submission_failure() {
    let engine = TestConfigBuilder::default()
        .roles(vec![PartitionRole::Quick])
        .engine();
    let (mut handle, first) = engine
        .start_job(job("qc", JobClass::Quick, &[0.1]))
        .unwrap();
    assert_eq!(first.partition, "quick");
    // Second attempt still fits the quick thresholds (1 h)
    let second = expect_resubmit(engine.job_failed(&mut handle, &oom()).unwrap());
    assert_eq!(second.partition, "quick");
    let report = expect_finished(engine.job_failed(&mut handle, &oom()).unwrap());
    assert!(matches!(
        report.outcome,
        TerminalOutcome::SubmissionFailed { .. }
    ));
    assert_eq!(handle.state(), RetryState::SubmissionFailed);
    assert_eq!(report.attempts(), 2);
}

#[test]
fn test_cancel_excludes_job_from_analysis() {
    let engine = test_engine();
    let (mut canceled, canceled_desc) = engine
        .start_job(job("a", JobClass::Medium, &[1.0]))
        .unwrap();
    let (_, kept_desc) = engine
        .start_job(job("b", JobClass::Medium, &[1.0]))
        .unwrap();

    // Both jobs used all of their memory
    let usage = |desc: &SubmissionDescriptor| (desc.request.memory_gb(), 100.0, 0.1);
    engine.record_observation(observation(
        "a",
        JobClass::Medium,
        canceled_desc.request,
        usage(&canceled_desc),
    ));
    engine.record_observation(observation(
        "b",
        JobClass::Medium,
        kept_desc.request,
        usage(&kept_desc),
    ));
    assert_eq!(engine.recommendations().len(), 2);

    let report = engine.cancel_job(&mut canceled).unwrap();
    assert_eq!(report.outcome, TerminalOutcome::Canceled);
    assert!(engine.job_failed(&mut canceled, &oom()).is_err());

    let recommendations = engine.recommendations();
    assert_eq!(recommendations.len(), 1);
    assert_eq!(recommendations[0].job_id, JobId::new("b"));
    assert_eq!(engine.observations().len(), 2);
}

#[test]
fn test_reload_does_not_affect_running_jobs() {
    let engine = test_engine();
    let (mut running, first) = engine
        .start_job(job("annot", JobClass::High, &[2.0]))
        .unwrap();
    assert_eq!(first.request.memory_gb(), 48.0);

    engine
        .reload(TestConfigBuilder::default().max_memory_gb(64.0).build())
        .unwrap();
    assert!(!Arc::ptr_eq(running.snapshot(), &engine.snapshot()));

    // The running job keeps the ceilings it was started with
    let second = expect_resubmit(engine.job_failed(&mut running, &oom()).unwrap());
    assert_eq!(second.request.memory_gb(), 96.0);

    let (mut fresh, _) = engine
        .start_job(job("annot2", JobClass::High, &[2.0]))
        .unwrap();
    let second = expect_resubmit(engine.job_failed(&mut fresh, &oom()).unwrap());
    assert_eq!(second.request.memory_gb(), 64.0);
}

#[test]
fn test_invalid_reload_keeps_configuration() {
    let engine = test_engine();
    let before = engine.snapshot();
    assert!(
        engine
            .reload(TestConfigBuilder::default().max_attempts(0).build())
            .is_err()
    );
    assert!(Arc::ptr_eq(&before, &engine.snapshot()));
}

#[test]
fn test_static_strategy() {
    let engine = TestConfigBuilder::default()
        .strategy(StrategyKind::Static)
        .default_partition("quick")
        .engine();
    for (id, class, size) in [
        ("a", JobClass::MemoryIntensive, 300.0),
        ("b", JobClass::Gpu, 1.0),
        ("c", JobClass::High, 50.0),
    ] {
        let (_, descriptor) = engine.start_job(job(id, class, &[size])).unwrap();
        assert_eq!(descriptor.partition, "quick");
    }
}

#[test]
fn test_user_defined_strategy() {
    let engine = TestConfigBuilder::default()
        .strategy(StrategyKind::UserDefined)
        .engine();

    let mut spec = job("a", JobClass::Low, &[1.0]);
    spec.partition = Some("gpu".to_string());
    let (_, descriptor) = engine.start_job(spec).unwrap();
    assert_eq!(descriptor.partition, "gpu");

    let mut spec = job("b", JobClass::Low, &[1.0]);
    spec.partition = Some("debug".to_string());
    assert!(matches!(
        engine.start_job(spec),
        Err(TailorError::PartitionUnavailable {
            source: PartitionUnavailable::NotInCatalog(_),
            ..
        })
    ));

    let (_, descriptor) = engine
        .start_job(job("c", JobClass::Quick, &[0.1]))
        .unwrap();
    assert_eq!(descriptor.partition, "quick");
    let warnings = engine.drain_warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].kind, WarningKind::MissingUserPartition);
}

#[test]
fn test_custom_options_are_last() {
    let mut config = TestConfigBuilder::default()
        .custom_options(vec!["--account=proj42".to_string()])
        .build();
    config
        .model
        .get_mut(JobClass::Gpu)
        .custom_options
        .push("--qos=gpu".to_string());
    let engine = AllocationEngine::new(config).unwrap();
    let (_, descriptor) = engine
        .start_job(job("vs", JobClass::Gpu, &[1.0]))
        .unwrap();
    assert_eq!(
        descriptor.cluster_options,
        vec![
            "--mem=32G",
            "--cpus-per-task=4",
            "--gres=gpu:1",
            "--account=proj42",
            "--qos=gpu"
        ]
    );
}

#[test]
fn test_base_override() {
    let engine = test_engine();
    let mut spec = job("a", JobClass::Medium, &[0.5]);
    spec.base_override = Some(crate::internal::model::BaseResources::new(2, 3.0, 1.0));
    let (_, descriptor) = engine.start_job(spec).unwrap();
    assert_eq!(descriptor.request.cpus(), 2);
    // 3 GB * 1.2 (medium minimum memory multiplier)
    assert_eq!(descriptor.request.memory_gb(), 4.0);
}

#[test]
fn test_efficiency_summary() {
    let engine = test_engine();
    for (id, class) in [("a", JobClass::Low), ("b", JobClass::Low), ("c", JobClass::Gpu)] {
        let (_, descriptor) = engine.start_job(job(id, class, &[1.0])).unwrap();
        engine.record_observation(observation(id, class, descriptor.request, (1.0, 50.0, 0.5)));
    }
    let summary = engine.efficiency_summary();
    assert_eq!(
        summary
            .iter()
            .map(|s| (s.job_class, s.jobs))
            .collect::<Vec<_>>(),
        vec![(Some(JobClass::Low), 2), (Some(JobClass::Gpu), 1)]
    );
}

#[test]
fn test_engine_is_shared_between_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<AllocationEngine>();

    let engine = test_engine();
    let ids = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..8)
            .map(|worker| {
                let engine = &engine;
                scope.spawn(move || {
                    let mut ids = Vec::new();
                    for i in 0..25 {
                        let id = format!("job-{worker}-{i}");
                        let (mut handle, descriptor) = engine
                            .start_job(job(&id, JobClass::Low, &[1.0]))
                            .unwrap();
                        engine.record_observation(observation(
                            &id,
                            JobClass::Low,
                            descriptor.request,
                            (1.0, 50.0, 0.5),
                        ));
                        engine.job_succeeded(&mut handle).unwrap();
                        ids.push(id);
                    }
                    ids
                })
            })
            .collect();
        workers
            .into_iter()
            .flat_map(|worker| worker.join().unwrap())
            .collect::<Vec<_>>()
    });
    assert_eq!(ids.len(), 200);
    assert_eq!(engine.observations().len(), 200);

    let mut expected: Vec<String> = (0..8)
        .flat_map(|w| (0..25).map(move |i| format!("job-{w}-{i}")))
        .collect();
    expected.sort();
    let recorded = sorted_vec(
        engine
            .observations()
            .snapshot()
            .iter()
            .map(|o| o.job_id.as_str().to_string())
            .collect(),
    );
    assert_eq!(recorded, expected);
}
