use clap::Parser;

use tailor::model::JobClass;
use tailor::profile::InputFile;
use tailor::retry::{JobFailure, TerminalReport};
use tailor::submission::EngineWarning;
use tailor::{AllocationEngine, FailureDecision, JobSpec};

use crate::client::globalsettings::GlobalSettings;
use crate::common::utils::ArgSize;
use crate::config::load_config;

const DEFAULT_FAILURE_MESSAGE: &str = "out of memory";

#[derive(Parser)]
pub struct EscalateOpts {
    /// Job class of the simulated job
    #[arg(long)]
    pub class: JobClass,

    /// Total input size, e.g. `120G`
    #[arg(long, default_value = "0")]
    pub size: ArgSize,

    /// Number of input samples the size is split into
    #[arg(long, default_value_t = 1)]
    pub samples: u32,

    /// Partition of the job, used by the user-defined strategy
    #[arg(long)]
    pub partition: Option<String>,

    /// Failure message reported by every attempt.
    /// Defaults to an out-of-memory failure when no exit code is given either.
    #[arg(long)]
    pub failure: Option<String>,

    /// Exit code reported by every attempt
    #[arg(long, allow_negative_numbers(true))]
    pub exit_code: Option<i32>,
}

/// Splits `size` into `samples` inputs. The first sample takes the remainder.
fn simulated_inputs(size: u64, samples: u32) -> Vec<InputFile> {
    let samples = samples.max(1);
    let share = size / samples as u64;
    let remainder = size % samples as u64;
    (0..samples)
        .map(|index| {
            let size = if index == 0 { share + remainder } else { share };
            InputFile::new(format!("sample-{index}"), size)
        })
        .collect()
}

fn simulated_failure(message: Option<String>, exit_code: Option<i32>) -> JobFailure {
    match (message, exit_code) {
        (None, None) => JobFailure::from_message(DEFAULT_FAILURE_MESSAGE),
        (message, exit_code) => JobFailure::new(exit_code, message.unwrap_or_default()),
    }
}

/// Runs a job through the retry state machine, failing every attempt the same way.
pub fn simulate_escalation(
    engine: &AllocationEngine,
    spec: JobSpec,
    failure: &JobFailure,
) -> crate::Result<(TerminalReport, Vec<EngineWarning>)> {
    let (mut handle, descriptor) = engine.start_job(spec)?;
    log::debug!(
        "Attempt 1 of job {} requests {}",
        handle.job_id(),
        descriptor.request
    );
    loop {
        match engine.job_failed(&mut handle, failure)? {
            FailureDecision::Resubmit(descriptor) => {
                log::debug!(
                    "Attempt {} of job {} requests {}",
                    descriptor.request.attempt(),
                    handle.job_id(),
                    descriptor.request
                );
            }
            FailureDecision::Finished(report) => {
                return Ok((report, engine.drain_warnings()));
            }
        }
    }
}

pub fn command_escalate(gsettings: &GlobalSettings, opts: EscalateOpts) -> anyhow::Result<()> {
    let config = load_config(gsettings.config_path())?.config;
    let engine = AllocationEngine::new(config)?;

    let mut spec = JobSpec::new(
        "simulated",
        opts.class,
        simulated_inputs(opts.size.unpack(), opts.samples),
    );
    spec.partition = opts.partition;
    let failure = simulated_failure(opts.failure, opts.exit_code);

    let (report, warnings) = simulate_escalation(&engine, spec, &failure)?;
    gsettings.printer().print_escalation(&report, &warnings);
    Ok(())
}
