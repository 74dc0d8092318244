use std::path::Path;

use anyhow::Error;
use serde_json::{Value, json};

use tailor::analysis::{ClassEfficiency, Recommendation};
use tailor::config::EngineConfig;
use tailor::retry::TerminalReport;
use tailor::submission::EngineWarning;

use crate::client::commands::plan::PlanReport;
use crate::client::output::outputs::Output;
use crate::config::ConfigFile;

#[derive(Default)]
pub struct JsonOutput;

impl JsonOutput {
    fn print(&self, data: Value) {
        println!("{data:#}");
    }
}

impl Output for JsonOutput {
    fn print_plan(&self, report: &PlanReport) {
        self.print(json!(report));
    }

    fn print_escalation(&self, report: &TerminalReport, warnings: &[EngineWarning]) {
        self.print(json!({
            "report": report,
            "warnings": warnings,
        }));
    }

    fn print_analysis(&self, recommendations: &[Recommendation], summary: &[ClassEfficiency]) {
        self.print(json!({
            "recommendations": recommendations,
            "summary": summary,
        }));
    }

    fn print_config(&self, path: Option<&Path>, config: &EngineConfig) {
        self.print(json!({
            "source": path,
            "config": ConfigFile::from_engine_config(config),
        }));
    }

    fn print_config_check(&self, path: Option<&Path>, _config: &EngineConfig) {
        self.print(json!({
            "source": path,
            "valid": true,
        }));
    }

    fn print_error(&self, error: Error) {
        self.print(json!({
            "error": format!("{error:?}"),
        }));
    }
}
