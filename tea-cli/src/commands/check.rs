//! `tea --check` handler: compile the rule chain and print it

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use tea_core::config::TeaConfig;
use tea_pipeline::RuleSet;
use tea_pipeline::rule::Rule;

use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute `--check`.
///
/// The report is printed in both the valid and the invalid case; an invalid
/// chain additionally returns a configuration error so tea exits with 2.
pub fn execute(path: &Path, config: &TeaConfig, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %path.display(), rules = config.rules.len(), "checking rule chain");

    match RuleSet::compile(config) {
        Ok(rule_set) => {
            writer.render(&ChainReport::valid(path, config, &rule_set))?;
            Ok(())
        }
        Err(e) => {
            let err = CliError::from(e);
            writer.render(&ChainReport::invalid(path, config, err.to_string()))?;
            Err(err)
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChainReport {
    pub path: String,
    pub valid: bool,
    pub topology: String,
    pub line_buffer_size: usize,
    pub rules: Vec<RuleEntry>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RuleEntry {
    pub ordinal: usize,
    pub name: Option<String>,
    pub state: String,
    pub streams: String,
    #[serde(rename = "match")]
    pub match_mode: String,
    pub negate: bool,
    pub patterns: Vec<String>,
    pub actions: Vec<String>,
}

impl ChainReport {
    fn valid(path: &Path, config: &TeaConfig, rule_set: &RuleSet) -> Self {
        Self {
            path: path.display().to_string(),
            valid: true,
            topology: config.pipeline.topology.to_string(),
            line_buffer_size: config.pipeline.line_buffer_size,
            rules: rule_set.rules().iter().map(RuleEntry::from).collect(),
            error: None,
        }
    }

    fn invalid(path: &Path, config: &TeaConfig, error: String) -> Self {
        Self {
            path: path.display().to_string(),
            valid: false,
            topology: config.pipeline.topology.to_string(),
            line_buffer_size: config.pipeline.line_buffer_size,
            rules: Vec::new(),
            error: Some(error),
        }
    }
}

impl From<&Rule> for RuleEntry {
    fn from(rule: &Rule) -> Self {
        let condition = &rule.condition;
        Self {
            ordinal: rule.ordinal + 1,
            name: rule.name.clone(),
            state: rule.initial_state().as_str().to_owned(),
            streams: condition.sources.as_str().to_owned(),
            match_mode: format!("{:?}", condition.match_mode).to_lowercase(),
            negate: condition.negate,
            patterns: condition
                .patterns
                .iter()
                .map(|re| re.as_str().to_owned())
                .collect(),
            actions: rule.actions.describe(),
        }
    }
}

impl Render for ChainReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Rule chain: {}", self.path.bold())?;

        if let Some(error) = &self.error {
            writeln!(w, "  {} {}", "invalid:".red().bold(), error)?;
            return Ok(());
        }

        writeln!(
            w,
            "  {} rules, topology {}, line buffer {} bytes",
            self.rules.len().to_string().bold(),
            self.topology,
            self.line_buffer_size
        )?;
        writeln!(w)?;
        writeln!(
            w,
            "{:<4} {:<16} {:<14} {:<7} Condition",
            "#", "Name", "State", "Streams"
        )?;
        writeln!(w, "{}", "-".repeat(72))?;

        for rule in &self.rules {
            let state = match rule.state.as_str() {
                "enabled" => rule.state.green(),
                "disabled" => rule.state.yellow(),
                _ => rule.state.cyan(),
            };
            let condition = if rule.patterns.is_empty() {
                "(every line)".to_owned()
            } else {
                let joiner = format!(" {} ", rule.match_mode);
                rule.patterns.join(&joiner)
            };
            let negate = if rule.negate { "not " } else { "" };

            writeln!(
                w,
                "{:<4} {:<16} {:<14} {:<7} {}{}",
                rule.ordinal,
                rule.name.as_deref().unwrap_or("-"),
                state,
                rule.streams,
                negate,
                condition
            )?;
            if !rule.actions.is_empty() {
                writeln!(w, "     -> {}", rule.actions.join("; "))?;
            }
        }

        Ok(())
    }
}
