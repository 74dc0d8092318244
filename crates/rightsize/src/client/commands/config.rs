use clap::Parser;

use crate::client::globalsettings::GlobalSettings;
use crate::config::load_config;

#[derive(Parser)]
pub struct ConfigOpts {
    #[clap(subcommand)]
    pub subcmd: ConfigCommand,
}

#[derive(Parser)]
pub enum ConfigCommand {
    /// Validate the configuration
    Check,
    /// Print the effective configuration, including built-in defaults
    Show,
}

pub fn command_config(gsettings: &GlobalSettings, opts: ConfigOpts) -> anyhow::Result<()> {
    let loaded = load_config(gsettings.config_path())?;
    match opts.subcmd {
        ConfigCommand::Check => gsettings
            .printer()
            .print_config_check(loaded.path.as_deref(), &loaded.config),
        ConfigCommand::Show => gsettings
            .printer()
            .print_config(loaded.path.as_deref(), &loaded.config),
    }
    Ok(())
}
