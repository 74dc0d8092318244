use std::path::PathBuf;

use clap::Parser;

use tailor::AllocationEngine;
use tailor::analysis::{ClassEfficiency, Recommendation};
use tailor::observation::UsageObservation;

use crate::client::globalsettings::GlobalSettings;
use crate::config::load_config;
use crate::input::observations::load_observations;

#[derive(Parser)]
pub struct AnalyzeOpts {
    /// Observation log with one JSON observation per line
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub observations: PathBuf,

    /// Show only the first N recommendations
    #[arg(long)]
    pub limit: Option<usize>,
}

pub fn analyze_observations(
    engine: &AllocationEngine,
    observations: Vec<UsageObservation>,
    limit: Option<usize>,
) -> (Vec<Recommendation>, Vec<ClassEfficiency>) {
    for observation in observations {
        engine.record_observation(observation);
    }
    let mut recommendations = engine.recommendations();
    if let Some(limit) = limit {
        recommendations.truncate(limit);
    }
    (recommendations, engine.efficiency_summary())
}

pub fn command_analyze(gsettings: &GlobalSettings, opts: AnalyzeOpts) -> anyhow::Result<()> {
    let config = load_config(gsettings.config_path())?.config;
    let engine = AllocationEngine::new(config)?;
    let observations = load_observations(&opts.observations)?;
    let (recommendations, summary) = analyze_observations(&engine, observations, opts.limit);
    gsettings
        .printer()
        .print_analysis(&recommendations, &summary);
    Ok(())
}
