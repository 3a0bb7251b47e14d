//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use tea_core::types::{ColorMode, Topology};

/// tea -- run a command and rewrite its output line by line.
///
/// Every line the command writes to stdout or stderr is passed through the
/// rule chain defined in the rules file before it reaches the terminal.
#[derive(Parser, Debug)]
#[command(name = "tea", version, about, long_about = None)]
pub struct Cli {
    /// Path to the tea.toml rules file.
    #[arg(short, long, required_unless_present = "list_signals")]
    pub rules: Option<PathBuf>,

    /// Evaluate stdout and stderr lines with one shared rule chain.
    #[arg(long, conflicts_with = "share_streams")]
    pub share_commands: bool,

    /// Merge stderr into stdout and evaluate with one shared rule chain.
    #[arg(long)]
    pub share_streams: bool,

    /// Maximum line length in bytes.
    #[arg(long, value_name = "BYTES")]
    pub line_buffer_size: Option<usize>,

    /// Write the child's pid to this file while it runs.
    #[arg(long = "pid", value_name = "FILE")]
    pub pid_file: Option<PathBuf>,

    /// Do not wrap the command in `stdbuf -oL -eL`.
    #[arg(long)]
    pub no_stdbuf: bool,

    /// When to emit ANSI styles (auto, always, never).
    #[arg(long, value_name = "WHEN")]
    pub color: Option<ColorMode>,

    /// Override log level (trace, debug, info, warn, error, off).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (pretty, compact, json).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Print the known signal names and numbers, then exit.
    #[arg(short, long, conflicts_with_all = ["check", "command"])]
    pub list_signals: bool,

    /// Validate the rules file and print the compiled chain, then exit.
    #[arg(long, conflicts_with = "command")]
    pub check: bool,

    /// Output format for --check and --list-signals.
    #[arg(long, default_value = "text")]
    pub output: OutputFormat,

    /// Command to run, given after `--`.
    #[arg(
        last = true,
        value_name = "PROGRAM",
        required_unless_present_any = ["list_signals", "check"]
    )]
    pub command: Vec<String>,
}

impl Cli {
    /// Topology selected on the command line, if any.
    pub fn topology(&self) -> Option<Topology> {
        if self.share_streams {
            Some(Topology::SharedStreams)
        } else if self.share_commands {
            Some(Topology::SharedCommands)
        } else {
            None
        }
    }
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}
