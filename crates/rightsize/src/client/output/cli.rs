use cli_table::format::{Justify, Separator};
use cli_table::{Cell, CellStruct, Color, ColorChoice, Style, Table, TableStruct, print_stdout};

use std::path::Path;

use anyhow::Error;
use colored::Colorize;
use itertools::Itertools;

use tailor::analysis::{ClassEfficiency, Recommendation, ResourceDimension};
use tailor::config::EngineConfig;
use tailor::partition::PartitionCatalog;
use tailor::retry::{AttemptRecord, TerminalOutcome, TerminalReport};
use tailor::submission::{EngineWarning, SubmissionDescriptor};

use crate::client::commands::plan::PlanReport;
use crate::client::output::outputs::Output;
use crate::common::format::{human_gb, human_hours, human_ratio, human_size};
use crate::common::utils::str::pluralize;

pub struct CliOutput {
    color_policy: ColorChoice,
}

impl CliOutput {
    pub fn new(color_policy: ColorChoice) -> CliOutput {
        CliOutput { color_policy }
    }

    fn print_vertical_table(&self, rows: Vec<Vec<CellStruct>>) {
        let table = rows.table().separator(
            Separator::builder()
                .column(Some(Default::default()))
                .build(),
        );
        self.print_table(table);
    }

    fn print_horizontal_table(&self, rows: Vec<Vec<CellStruct>>, header: Vec<CellStruct>) {
        let table = rows
            .table()
            .separator(
                Separator::builder()
                    .title(Some(Default::default()))
                    .column(Some(Default::default()))
                    .build(),
            )
            .title(header);
        self.print_table(table);
    }

    fn print_table(&self, table: TableStruct) {
        let table = table.color_choice(self.color_policy);
        if let Err(e) = print_stdout(table) {
            log::error!("Cannot print table to stdout: {:?}", e);
        }
    }

    fn print_warnings(&self, warnings: &[EngineWarning]) {
        if warnings.is_empty() {
            return;
        }
        println!(
            "{}",
            format!(
                "{} {}",
                warnings.len(),
                pluralize("warning", warnings.len())
            )
            .yellow()
        );
        let rows: Vec<_> = warnings
            .iter()
            .map(|warning| {
                vec![
                    warning.job_id.as_str().cell(),
                    warning
                        .message
                        .as_str()
                        .cell()
                        .foreground_color(Some(Color::Yellow)),
                ]
            })
            .collect();
        let header = vec!["Job".cell().bold(true), "Warning".cell().bold(true)];
        self.print_horizontal_table(rows, header);
    }
}

fn descriptor_row(descriptor: &SubmissionDescriptor, inputs: String) -> Vec<CellStruct> {
    vec![
        descriptor.job_id.as_str().cell(),
        descriptor.job_class.cell(),
        descriptor.partition.as_str().cell(),
        descriptor.request.cpus().cell().justify(Justify::Right),
        human_gb(descriptor.request.memory_gb())
            .cell()
            .justify(Justify::Right),
        descriptor.walltime().cell().justify(Justify::Right),
        inputs.cell(),
        descriptor.cluster_options.iter().join(" ").cell(),
    ]
}

fn inputs_summary(sample_count: u32, total_size_bytes: u64) -> String {
    format!(
        "{sample_count} {}, {}",
        pluralize("sample", sample_count as usize),
        human_size(total_size_bytes)
    )
}

fn failure_summary(attempt: &AttemptRecord) -> String {
    match &attempt.failure {
        Some(failure) => match failure.exit_code {
            Some(code) => format!("{} (exit code {code})", failure.kind),
            None => failure.kind.to_string(),
        },
        None => String::new(),
    }
}

fn outcome_cell(outcome: &TerminalOutcome) -> CellStruct {
    let color = match outcome {
        TerminalOutcome::Succeeded => Color::Green,
        TerminalOutcome::Canceled => Color::Magenta,
        TerminalOutcome::ExhaustedRetries
        | TerminalOutcome::NonRetryableFailure { .. }
        | TerminalOutcome::SubmissionFailed { .. } => Color::Red,
    };
    outcome.to_string().cell().foreground_color(Some(color))
}

/// Formats a requested or suggested value in the unit of its dimension.
fn dimension_value(dimension: ResourceDimension, value: f64) -> String {
    match dimension {
        ResourceDimension::Memory => human_gb(value),
        ResourceDimension::Time => human_hours(value),
        ResourceDimension::Cpu => format!("{value:.0}"),
    }
}

fn partitions_summary(catalog: &PartitionCatalog) -> String {
    catalog
        .partitions()
        .map(|(role, name)| format!("{role}={name}"))
        .join(", ")
}

fn options_summary(options: &[String]) -> String {
    if options.is_empty() {
        "None".to_string()
    } else {
        options.join(" ")
    }
}

fn config_source(path: Option<&Path>) -> String {
    match path {
        Some(path) => path.display().to_string(),
        None => "built-in defaults".to_string(),
    }
}

impl Output for CliOutput {
    fn print_plan(&self, report: &PlanReport) {
        let rows: Vec<_> = report
            .jobs
            .iter()
            .map(|job| {
                descriptor_row(
                    &job.descriptor,
                    inputs_summary(job.profile.sample_count(), job.profile.total_size_bytes()),
                )
            })
            .collect();
        let header = vec![
            "Job".cell().bold(true),
            "Class".cell().bold(true),
            "Partition".cell().bold(true),
            "CPUs".cell().bold(true),
            "Memory".cell().bold(true),
            "Walltime".cell().bold(true),
            "Inputs".cell().bold(true),
            "Cluster options".cell().bold(true),
        ];
        self.print_horizontal_table(rows, header);

        if !report.unplaced.is_empty() {
            println!(
                "{}",
                format!(
                    "{} {} cannot be placed on any partition",
                    report.unplaced.len(),
                    pluralize("job", report.unplaced.len())
                )
                .red()
            );
            let rows: Vec<_> = report
                .unplaced
                .iter()
                .map(|job| {
                    vec![
                        job.job_id.as_str().cell(),
                        job.job_class.cell(),
                        job.reason.as_str().cell().foreground_color(Some(Color::Red)),
                    ]
                })
                .collect();
            let header = vec![
                "Job".cell().bold(true),
                "Class".cell().bold(true),
                "Reason".cell().bold(true),
            ];
            self.print_horizontal_table(rows, header);
        }

        if !report.parallel_plans.is_empty() {
            let rows: Vec<_> = report
                .parallel_plans
                .iter()
                .map(|(class, plan)| {
                    vec![
                        class.cell(),
                        plan.strategy.cell(),
                        plan.optimal_forks.cell().justify(Justify::Right),
                        plan.batch_size.cell().justify(Justify::Right),
                        plan.tags().join(", ").cell(),
                    ]
                })
                .collect();
            let header = vec![
                "Class".cell().bold(true),
                "Strategy".cell().bold(true),
                "Forks".cell().bold(true),
                "Batch size".cell().bold(true),
                "Tags".cell().bold(true),
            ];
            self.print_horizontal_table(rows, header);
        }

        self.print_warnings(&report.warnings);
    }

    fn print_escalation(&self, report: &TerminalReport, warnings: &[EngineWarning]) {
        let rows: Vec<_> = report
            .history
            .iter()
            .map(|attempt| {
                vec![
                    attempt.attempt.cell().justify(Justify::Right),
                    attempt.partition.as_str().cell(),
                    attempt.request.cpus().cell().justify(Justify::Right),
                    human_gb(attempt.request.memory_gb())
                        .cell()
                        .justify(Justify::Right),
                    attempt.request.walltime().cell().justify(Justify::Right),
                    failure_summary(attempt).cell(),
                ]
            })
            .collect();
        let header = vec![
            "Attempt".cell().bold(true),
            "Partition".cell().bold(true),
            "CPUs".cell().bold(true),
            "Memory".cell().bold(true),
            "Walltime".cell().bold(true),
            "Failure".cell().bold(true),
        ];
        self.print_horizontal_table(rows, header);

        self.print_vertical_table(vec![
            vec![
                "Job".cell().bold(true),
                report.job_id.as_str().cell(),
            ],
            vec!["Outcome".cell().bold(true), outcome_cell(&report.outcome)],
            vec![
                "Attempts".cell().bold(true),
                report.attempts().cell(),
            ],
        ]);
        self.print_warnings(warnings);
    }

    fn print_analysis(&self, recommendations: &[Recommendation], summary: &[ClassEfficiency]) {
        if recommendations.is_empty() {
            println!("{}", "No sizing recommendations".green());
        } else {
            let rows: Vec<_> = recommendations
                .iter()
                .map(|recommendation| {
                    let dimension = recommendation.dimension();
                    let color = match dimension {
                        ResourceDimension::Memory => Color::Red,
                        ResourceDimension::Time => Color::Yellow,
                        ResourceDimension::Cpu => Color::Cyan,
                    };
                    vec![
                        recommendation.priority.cell().justify(Justify::Right),
                        recommendation.job_id.as_str().cell(),
                        recommendation
                            .job_class
                            .map(|class| class.to_string())
                            .unwrap_or_else(|| "N/A".to_string())
                            .cell(),
                        recommendation.attempt.cell().justify(Justify::Right),
                        recommendation
                            .kind
                            .cell()
                            .foreground_color(Some(color)),
                        human_ratio(Some(recommendation.ratio))
                            .cell()
                            .justify(Justify::Right),
                        dimension_value(dimension, recommendation.requested)
                            .cell()
                            .justify(Justify::Right),
                        dimension_value(dimension, recommendation.suggested)
                            .cell()
                            .justify(Justify::Right),
                    ]
                })
                .collect();
            let header = vec![
                "Priority".cell().bold(true),
                "Job".cell().bold(true),
                "Class".cell().bold(true),
                "Attempt".cell().bold(true),
                "Finding".cell().bold(true),
                "Used".cell().bold(true),
                "Requested".cell().bold(true),
                "Suggested".cell().bold(true),
            ];
            self.print_horizontal_table(rows, header);
        }

        if summary.is_empty() {
            return;
        }
        let rows: Vec<_> = summary
            .iter()
            .map(|class| {
                vec![
                    class
                        .job_class
                        .map(|class| class.to_string())
                        .unwrap_or_else(|| "unknown".to_string())
                        .cell(),
                    class.jobs.cell().justify(Justify::Right),
                    class.observations.cell().justify(Justify::Right),
                    class.failures.cell().justify(Justify::Right),
                    class.timeouts.cell().justify(Justify::Right),
                    human_ratio(class.mean_memory_utilization)
                        .cell()
                        .justify(Justify::Right),
                    human_ratio(class.mean_cpu_utilization)
                        .cell()
                        .justify(Justify::Right),
                    human_ratio(class.mean_time_utilization)
                        .cell()
                        .justify(Justify::Right),
                ]
            })
            .collect();
        let header = vec![
            "Class".cell().bold(true),
            "Jobs".cell().bold(true),
            "Observations".cell().bold(true),
            "Failures".cell().bold(true),
            "Timeouts".cell().bold(true),
            "Memory usage".cell().bold(true),
            "CPU usage".cell().bold(true),
            "Time usage".cell().bold(true),
        ];
        self.print_horizontal_table(rows, header);
    }

    fn print_config(&self, path: Option<&Path>, config: &EngineConfig) {
        let catalog = &config.catalog;
        let thresholds = catalog.thresholds();
        let rows = vec![
            vec!["Source".cell().bold(true), config_source(path).cell()],
            vec!["Strategy".cell().bold(true), config.strategy.cell()],
            vec![
                "Max attempts".cell().bold(true),
                config.max_attempts.cell(),
            ],
            vec![
                "Max CPUs".cell().bold(true),
                config.ceilings.max_cpus.cell(),
            ],
            vec![
                "Max memory".cell().bold(true),
                human_gb(config.ceilings.max_memory_gb).cell(),
            ],
            vec![
                "Max time".cell().bold(true),
                human_hours(config.ceilings.max_time_hours).cell(),
            ],
            vec![
                "Partitions".cell().bold(true),
                partitions_summary(catalog).cell(),
            ],
            vec![
                "Default partition".cell().bold(true),
                catalog.default_partition().unwrap_or("None").cell(),
            ],
            vec![
                "Cluster options".cell().bold(true),
                options_summary(catalog.custom_options()).cell(),
            ],
            vec![
                "Bigmem threshold".cell().bold(true),
                human_gb(thresholds.bigmem_memory_gb).cell(),
            ],
            vec![
                "Quick thresholds".cell().bold(true),
                format!(
                    "{}, {}",
                    human_hours(thresholds.quick_time_hours),
                    human_gb(thresholds.quick_memory_gb)
                )
                .cell(),
            ],
        ];
        self.print_vertical_table(rows);

        let rows: Vec<_> = config
            .model
            .iter()
            .map(|(class, model)| {
                vec![
                    class.cell(),
                    model.base.cpus.cell().justify(Justify::Right),
                    human_gb(model.base.memory_gb)
                        .cell()
                        .justify(Justify::Right),
                    human_hours(model.base.time_hours)
                        .cell()
                        .justify(Justify::Right),
                    format!(
                        "{} / {} / {}",
                        model.factors.cpu, model.factors.memory, model.factors.time
                    )
                    .cell(),
                    options_summary(&model.custom_options).cell(),
                ]
            })
            .collect();
        let header = vec![
            "Class".cell().bold(true),
            "CPUs".cell().bold(true),
            "Memory".cell().bold(true),
            "Time".cell().bold(true),
            "Factors (cpu / mem / time)".cell().bold(true),
            "Cluster options".cell().bold(true),
        ];
        self.print_horizontal_table(rows, header);
    }

    fn print_config_check(&self, path: Option<&Path>, config: &EngineConfig) {
        let partitions = config.catalog.partitions().count();
        println!(
            "{} ({}, {} {}, {} strategy)",
            "Configuration is valid".green(),
            config_source(path),
            partitions,
            pluralize("partition", partitions),
            config.strategy
        );
    }

    fn print_error(&self, error: Error) {
        eprintln!("{:?}", error);
    }
}
