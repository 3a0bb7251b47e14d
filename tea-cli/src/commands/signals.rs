//! `tea --list-signals` handler

use std::io::Write;

use serde::Serialize;

use tea_pipeline::Signal;

use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute `--list-signals`.
pub fn execute(writer: &OutputWriter) -> Result<(), CliError> {
    writer.render(&SignalList::collect())
}

#[derive(Debug, Serialize)]
pub struct SignalList {
    pub signals: Vec<SignalEntry>,
}

#[derive(Debug, Serialize)]
pub struct SignalEntry {
    pub name: String,
    pub number: i32,
}

impl SignalList {
    fn collect() -> Self {
        let signals = Signal::all()
            .into_iter()
            .map(|(name, number)| SignalEntry {
                name: format!("SIG{name}"),
                number,
            })
            .collect();
        Self { signals }
    }
}

impl Render for SignalList {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        for signal in &self.signals {
            writeln!(w, "{} = {}", signal.name, signal.number)?;
        }
        Ok(())
    }
}
