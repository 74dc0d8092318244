use std::path::Path;

use tailor::analysis::{ClassEfficiency, Recommendation};
use tailor::config::EngineConfig;
use tailor::retry::TerminalReport;
use tailor::submission::EngineWarning;

use crate::client::commands::plan::PlanReport;

#[allow(clippy::upper_case_acronyms)]
#[derive(clap::ValueEnum, Clone)]
pub enum Outputs {
    CLI,
    JSON,
}

pub trait Output {
    // Planning
    fn print_plan(&self, report: &PlanReport);

    // Retries
    fn print_escalation(&self, report: &TerminalReport, warnings: &[EngineWarning]);

    // Analysis
    fn print_analysis(&self, recommendations: &[Recommendation], summary: &[ClassEfficiency]);

    // Configuration
    fn print_config(&self, path: Option<&Path>, config: &EngineConfig);
    fn print_config_check(&self, path: Option<&Path>, config: &EngineConfig);

    // Errors
    fn print_error(&self, error: anyhow::Error);
}
