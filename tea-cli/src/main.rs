//! tea -- run a command and rewrite its output line by line.

mod cli;
mod commands;
mod error;
mod logging;
mod output;
mod pid_file;

use clap::Parser;

use crate::cli::Cli;

fn main() {
    let code = run();
    std::process::exit(code);
}

/// Runs inside the tokio runtime; the runtime is dropped before the process exits.
#[tokio::main]
async fn run() -> i32 {
    let cli = Cli::parse();

    match commands::dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("tea: {e}");
            e.exit_code()
        }
    }
}
