//! Command handlers -- one module per mode of operation

pub mod check;
pub mod run;
pub mod signals;

use std::path::Path;

use tea_core::config::TeaConfig;

use crate::cli::Cli;
use crate::error::CliError;
use crate::output::OutputWriter;

/// Dispatch to the selected mode and return the process exit code.
pub async fn dispatch(cli: Cli) -> Result<i32, CliError> {
    let writer = OutputWriter::new(cli.output);

    if cli.list_signals {
        signals::execute(&writer)?;
        return Ok(0);
    }

    let rules = cli
        .rules
        .as_deref()
        .ok_or_else(|| CliError::Config("--rules is required".to_owned()))?;
    let config = load_config(rules, &cli).await?;

    if cli.check {
        check::execute(rules, &config, &writer)?;
        return Ok(0);
    }

    run::execute(config, &cli).await
}

/// Load the rules file, then layer env and command-line overrides on top.
///
/// Precedence: command line > `TEA_*` environment > file > defaults.
pub async fn load_config(path: &Path, cli: &Cli) -> Result<TeaConfig, CliError> {
    let mut config = TeaConfig::from_file(path).await?;
    config.apply_env_overrides();
    apply_cli_overrides(&mut config, cli);
    config.validate()?;
    Ok(config)
}

fn apply_cli_overrides(config: &mut TeaConfig, cli: &Cli) {
    if let Some(topology) = cli.topology() {
        config.pipeline.topology = topology;
    }
    if let Some(size) = cli.line_buffer_size {
        config.pipeline.line_buffer_size = size;
    }
    if let Some(path) = &cli.pid_file {
        config.pipeline.pid_file = path.display().to_string();
    }
    if cli.no_stdbuf {
        config.pipeline.stdbuf = false;
    }
    if let Some(color) = cli.color {
        config.pipeline.color = color;
    }
    if let Some(level) = &cli.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.general.log_format = format.clone();
    }
}
