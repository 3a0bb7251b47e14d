//! Default mode: supervise the command and relay its output through the rule chain

use std::io::IsTerminal;
use std::sync::Arc;

use tokio::process::{ChildStderr, ChildStdout, Command};
use tracing::{debug, info, warn};

use tea_core::config::TeaConfig;
use tea_core::types::ColorMode;
use tea_pipeline::{
    AnsiRenderer, ChildStreams, LinePipelineBuilder, OutputSinks, PipelineError, PlainRenderer,
    ProcessSupervisor, RuleSet, StyleRenderer,
};

use crate::cli::Cli;
use crate::error::CliError;
use crate::logging::init_tracing;
use crate::pid_file::{remove_pid_file, write_pid_file};

/// Program used to force line buffering on the child's stdio.
const STDBUF: &str = "stdbuf";

/// Run the command given after `--` and return tea's exit code.
pub async fn execute(config: TeaConfig, cli: &Cli) -> Result<i32, CliError> {
    init_tracing(&config.general)?;
    tea_core::metrics::describe_all();

    let (program, args) = cli
        .command
        .split_first()
        .ok_or_else(|| CliError::Config("no command given after --".to_owned()))?;

    let rule_set = RuleSet::compile(&config)?;
    info!(
        rules = rule_set.len(),
        topology = %config.pipeline.topology,
        "rule chain compiled"
    );

    let renderer = renderer_for(config.pipeline.color);
    let (supervisor, streams) =
        spawn_child(program, args, config.pipeline.stdbuf, rule_set.needs_input())?;

    let pid_file = config.pid_file();
    if let Some(path) = &pid_file {
        write_pid_file(path, supervisor.pid())?;
    }

    let pipeline = LinePipelineBuilder::new(rule_set, Arc::new(supervisor.handle()))
        .renderer(renderer)
        .build()?;

    let stats = match pipeline.run(streams, OutputSinks::stdio()).await {
        Ok(stats) => stats,
        Err(e) => {
            // dropping the supervisor kills the child
            if let Some(path) = &pid_file {
                remove_pid_file(path);
            }
            return Err(e.into());
        }
    };
    debug!(?stats, "pipeline finished");

    let outcome = supervisor.wait().await;
    if let Some(path) = &pid_file {
        remove_pid_file(path);
    }

    Ok(outcome?.code())
}

/// Pick the style renderer and set the global `colored` policy.
fn renderer_for(mode: ColorMode) -> Arc<dyn StyleRenderer> {
    let enabled = match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => std::io::stdout().is_terminal(),
    };
    colored::control::set_override(enabled);

    if enabled {
        Arc::new(AnsiRenderer)
    } else {
        Arc::new(PlainRenderer)
    }
}

fn build_command(program: &str, args: &[String], stdbuf: bool) -> Command {
    let mut command = if stdbuf {
        let mut command = Command::new(STDBUF);
        command.args(["-oL", "-eL", program]);
        command
    } else {
        Command::new(program)
    };
    command.args(args).kill_on_drop(true);
    command
}

/// Spawn the child, falling back to a direct spawn when `stdbuf` is not installed.
fn spawn_child(
    program: &str,
    args: &[String],
    stdbuf: bool,
    needs_input: bool,
) -> Result<(ProcessSupervisor, ChildStreams<ChildStdout, ChildStderr>), CliError> {
    match ProcessSupervisor::spawn(build_command(program, args, stdbuf), needs_input) {
        Err(PipelineError::Spawn { program: wrapper, source })
            if stdbuf && wrapper == STDBUF && source.kind() == std::io::ErrorKind::NotFound =>
        {
            warn!("stdbuf not found, child output may be block buffered");
            ProcessSupervisor::spawn(build_command(program, args, false), needs_input)
                .map_err(CliError::from)
        }
        other => other.map_err(CliError::from),
    }
}
