//! Pid file bookkeeping for the supervised child.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;

use tracing::{info, warn};

use crate::error::CliError;

/// Write the child's pid to a file.
///
/// # Security
///
/// - Uses `create_new(true)` so an existing file is never overwritten
/// - Verifies the created file is a regular file
/// - Restricts permissions to 0o600 on unix
pub fn write_pid_file(path: &Path, pid: u32) -> Result<(), CliError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let existing = fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_owned());
            return Err(CliError::PidFile(format!(
                "{} already exists with pid {}",
                path.display(),
                existing.trim()
            )));
        }
        Err(e) => {
            return Err(CliError::PidFile(format!(
                "failed to create {}: {e}",
                path.display()
            )));
        }
    };

    if !file.metadata()?.is_file() {
        let _ = fs::remove_file(path);
        return Err(CliError::PidFile(format!(
            "{} is not a regular file",
            path.display()
        )));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }

    writeln!(file, "{pid}")?;

    info!(pid, path = %path.display(), "pid file written");
    Ok(())
}

/// Remove the pid file at shutdown.
///
/// Logs a warning but does not fail if the file cannot be removed.
pub fn remove_pid_file(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!(path = %path.display(), error = %e, "failed to remove pid file");
    } else {
        info!(path = %path.display(), "pid file removed");
    }
}
