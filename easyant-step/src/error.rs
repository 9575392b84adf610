//! Step-level error definitions.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that are fatal to a build step.
///
/// Every variant is caught at the step boundary and converted into a
/// failure result plus a log entry; none of them escape past `perform`.
#[derive(Debug, Error)]
pub enum StepError {
    /// The named installation resolved, but no executable exists at the
    /// computed location on the execution node.
    #[error("Can't retrieve the EasyAnt executable at {path}")]
    ExecutableNotFound { path: PathBuf },

    /// Neither the module root nor the workspace root contains the
    /// requested build module or build script.
    #[error("Unable to find build module or build script at {attempted}")]
    BuildFileNotFound { attempted: PathBuf },

    /// The subprocess could not be started, or its output pipe (or the log
    /// sink behind it) failed mid-stream.
    #[error("command execution failed: {0}")]
    Launch(#[from] std::io::Error),
}

/// Result type for step operations.
pub type Result<T> = std::result::Result<T, StepError>;
