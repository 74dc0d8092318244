use std::io::{self, IsTerminal};

use clap::{CommandFactory, FromArgMatches};
use clap_complete::generate;
use cli_table::ColorChoice;

use rightsize::client::commands::analyze::command_analyze;
use rightsize::client::commands::config::command_config;
use rightsize::client::commands::escalate::command_escalate;
use rightsize::client::commands::plan::command_plan;
use rightsize::client::globalsettings::GlobalSettings;
use rightsize::client::output::cli::CliOutput;
use rightsize::client::output::json::JsonOutput;
use rightsize::client::output::outputs::{Output, Outputs};
use rightsize::common::cli::{
    ColorPolicy, CommonOpts, GenerateCompletionOpts, RootOptions, SubCommand,
};
use rightsize::common::setup::setup_logging;

fn make_global_settings(opts: CommonOpts) -> GlobalSettings {
    let color_policy = match opts.colors {
        ColorPolicy::Always => ColorChoice::AlwaysAnsi,
        ColorPolicy::Auto => {
            if io::stdout().is_terminal() {
                ColorChoice::Auto
            } else {
                ColorChoice::Never
            }
        }
        ColorPolicy::Never => ColorChoice::Never,
    };

    // Create Printer
    let printer: Box<dyn Output> = match opts.output_mode {
        Outputs::CLI => {
            // Set colored public for CLI
            match color_policy {
                ColorChoice::Always | ColorChoice::AlwaysAnsi => {
                    colored::control::set_override(true)
                }
                ColorChoice::Never => colored::control::set_override(false),
                _ => {}
            }

            Box::new(CliOutput::new(color_policy))
        }
        Outputs::JSON => Box::<JsonOutput>::default(),
    };

    GlobalSettings::new(opts.config, printer)
}

fn generate_completion(opts: GenerateCompletionOpts) -> anyhow::Result<()> {
    let generator = opts.shell;

    let mut app = RootOptions::command();
    eprintln!("Generating completion file for {generator}...");
    generate(generator, &mut app, "rightsize".to_string(), &mut io::stdout());
    Ok(())
}

fn main() -> rightsize::Result<()> {
    let matches = RootOptions::command().get_matches();
    let top_opts = match RootOptions::from_arg_matches(&matches) {
        Ok(opts) => opts,
        Err(error) => error.exit(),
    };

    setup_logging(top_opts.common.debug);

    let gsettings = make_global_settings(top_opts.common);

    let result = match top_opts.subcmd {
        SubCommand::Plan(opts) => command_plan(&gsettings, opts),
        SubCommand::Escalate(opts) => command_escalate(&gsettings, opts),
        SubCommand::Analyze(opts) => command_analyze(&gsettings, opts),
        SubCommand::Config(opts) => command_config(&gsettings, opts),
        SubCommand::GenerateCompletion(opts) => generate_completion(opts),
    };

    if let Err(e) = result {
        gsettings.printer().print_error(e);
        std::process::exit(1);
    }

    Ok(())
}
