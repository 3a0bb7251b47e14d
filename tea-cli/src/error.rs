//! CLI-specific error types and exit code mapping

use tea_core::error::TeaError;
use tea_pipeline::PipelineError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to the process exit code tea uses
/// when it fails before or while relaying the child's output.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading, validation or rule compilation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// The child process could not be started.
    #[error("{0}")]
    Spawn(String),

    /// The line pipeline failed while running.
    #[error("{0}")]
    Pipeline(String),

    /// The pid file could not be created.
    #[error("pid file error: {0}")]
    PidFile(String),

    /// Logging could not be initialized.
    #[error("logging error: {0}")]
    Logging(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                                   |
    /// |------|-------------------------------------------|
    /// | 1    | Pipeline, pid file or output failure      |
    /// | 2    | Configuration error                       |
    /// | 3    | Child process could not be spawned        |
    /// | 10   | IO error                                  |
    ///
    /// On success tea exits with the child's own (or the rule-fixed) code.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Spawn(_) => 3,
            Self::Io(_) => 10,
            Self::Pipeline(_) | Self::PidFile(_) | Self::Logging(_) | Self::JsonSerialize(_) => 1,
        }
    }
}

impl From<TeaError> for CliError {
    fn from(e: TeaError) -> Self {
        match e {
            TeaError::Config(config) => Self::Config(config.to_string()),
            TeaError::Io(io) => Self::Io(io),
            other => Self::Pipeline(other.to_string()),
        }
    }
}

impl From<PipelineError> for CliError {
    fn from(e: PipelineError) -> Self {
        match e {
            e if e.is_config_error() => Self::Config(e.to_string()),
            e @ PipelineError::Spawn { .. } => Self::Spawn(e.to_string()),
            e => Self::Pipeline(e.to_string()),
        }
    }
}
