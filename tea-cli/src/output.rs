//! Output formatting abstraction for text vs JSON rendering
//!
//! Reports printed by `--check` and `--list-signals` flow through [`OutputWriter`],
//! which handles format switching. Relayed child output never goes through here.

use std::io::Write;

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Writes CLI reports in the selected format.
///
/// Handlers call `writer.render(&payload)` where `payload`
/// implements both `Serialize` (for JSON) and `Render` (for text).
pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    /// Create a new output writer with the specified format.
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Render a payload to stdout.
    pub fn render<T: Render + Serialize>(&self, payload: &T) -> Result<(), CliError> {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        self.render_to(payload, &mut handle)
    }

    /// Render a payload to an arbitrary writer.
    ///
    /// `Text` delegates to `Render::render_text()`, `Json` pretty-prints via `serde_json`.
    pub fn render_to<T: Render + Serialize>(
        &self,
        payload: &T,
        w: &mut dyn Write,
    ) -> Result<(), CliError> {
        match self.format {
            OutputFormat::Text => payload.render_text(w)?,
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut *w, payload)?;
                writeln!(w)?;
            }
        }
        w.flush()?;
        Ok(())
    }
}

/// Trait for human-readable text rendering.
///
/// Implemented by every CLI report alongside `serde::Serialize`.
pub trait Render {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Payload {
        name: String,
        count: u32,
        note: Option<String>,
    }

    impl Render for Payload {
        fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
            writeln!(w, "{} = {}", self.name, self.count)
        }
    }

    fn payload() -> Payload {
        Payload {
            name: "TERM".to_owned(),
            count: 15,
            note: None,
        }
    }

    #[test]
    fn test_render_text_format() {
        let mut buffer = Vec::new();
        OutputWriter::new(OutputFormat::Text)
            .render_to(&payload(), &mut buffer)
            .expect("text rendering should succeed");

        assert_eq!(String::from_utf8(buffer).expect("valid UTF-8"), "TERM = 15\n");
    }

    #[test]
    fn test_render_json_format() {
        let mut buffer = Vec::new();
        OutputWriter::new(OutputFormat::Json)
            .render_to(&payload(), &mut buffer)
            .expect("json rendering should succeed");

        let output = String::from_utf8(buffer).expect("valid UTF-8");
        assert!(output.ends_with("}\n"), "json output ends with a newline");
        assert!(output.contains('\n'), "pretty JSON should contain newlines");

        let parsed: serde_json::Value =
            serde_json::from_str(&output).expect("should parse back to JSON");
        assert_eq!(parsed["name"].as_str(), Some("TERM"));
        assert_eq!(parsed["count"].as_u64(), Some(15));
        assert!(parsed["note"].is_null(), "None should be null in JSON");
    }
}
