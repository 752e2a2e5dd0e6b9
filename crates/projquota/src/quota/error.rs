use core::time::Duration;
use std::{io, process::ExitStatus};

/// Failure of a single quota tool invocation.
///
/// `command` is the rendered command line, for diagnostics only; the tool is
/// never run through a shell.
#[derive(thiserror::Error, Debug)]
pub enum QuotaToolError {
    /// The tool ran and exited unsuccessfully.
    #[error("`{command}` failed ({status}): {stderr}")]
    Failed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    /// The tool could not be started or its output could not be collected.
    #[error("`{command}` could not be run: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// The tool did not finish in time and was killed.
    #[error("`{command}` timed out after {}s", .after.as_secs_f64())]
    Timeout { command: String, after: Duration },
}

impl QuotaToolError {
    /// Diagnostic output captured from the tool, if it ran to completion.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::Failed { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}
