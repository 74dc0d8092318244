use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;

use tailor::model::JobClass;
use tailor::planner::ParallelPlan;
use tailor::profile::{InputProfile, profile_inputs};
use tailor::submission::{EngineWarning, SubmissionDescriptor};
use tailor::{AllocationEngine, JobId, JobSpec};

use crate::client::globalsettings::GlobalSettings;
use crate::config::load_config;
use crate::input::manifest::load_manifest;

pub const DEFAULT_MAX_FORKS: u32 = 8;

#[derive(Parser)]
pub struct PlanOpts {
    /// Job manifest (`.json` or `.toml`)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub manifest: PathBuf,

    /// Maximum number of concurrently running instances of one job class
    #[arg(long, default_value_t = DEFAULT_MAX_FORKS)]
    pub max_forks: u32,
}

#[derive(Serialize, Debug)]
pub struct PlannedJob {
    pub descriptor: SubmissionDescriptor,
    pub profile: InputProfile,
}

/// A job that cannot be placed on any partition.
#[derive(Serialize, Debug)]
pub struct UnplacedJob {
    pub job_id: JobId,
    pub job_class: JobClass,
    pub reason: String,
}

#[derive(Serialize, Debug, Default)]
pub struct PlanReport {
    pub jobs: Vec<PlannedJob>,
    pub unplaced: Vec<UnplacedJob>,
    pub parallel_plans: BTreeMap<JobClass, ParallelPlan>,
    pub warnings: Vec<EngineWarning>,
}

/// Computes the first attempt of every job. A job that cannot be placed does not stop
/// the planning of the others.
pub fn plan_jobs(engine: &AllocationEngine, specs: Vec<JobSpec>, max_forks: u32) -> PlanReport {
    let mut report = PlanReport::default();
    let mut profiles = Vec::with_capacity(specs.len());
    for spec in specs {
        let profile = profile_inputs(&spec.inputs);
        profiles.push((spec.class, profile.clone()));
        let (job_id, job_class) = (spec.id.clone(), spec.class);
        match engine.start_profiled_job(spec, profile) {
            Ok((handle, descriptor)) => report.jobs.push(PlannedJob {
                descriptor,
                profile: handle.profile().clone(),
            }),
            Err(error) => {
                log::error!("{error}");
                report.unplaced.push(UnplacedJob {
                    job_id,
                    job_class,
                    reason: error.to_string(),
                });
            }
        }
    }
    report.parallel_plans = engine.plan(
        profiles.iter().map(|(class, profile)| (*class, profile)),
        max_forks,
    );
    report.warnings = engine.drain_warnings();
    report
}

pub fn command_plan(gsettings: &GlobalSettings, opts: PlanOpts) -> anyhow::Result<()> {
    let config = load_config(gsettings.config_path())?.config;
    let engine = AllocationEngine::new(config)?;
    let specs = load_manifest(&opts.manifest)?;
    let report = plan_jobs(&engine, specs, opts.max_forks);
    gsettings.printer().print_plan(&report);
    Ok(())
}
