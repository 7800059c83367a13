//! Execution errors and the uniform outcome they collapse into.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why an execution did not succeed.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("unsupported action kind: {0}")]
    UnsupportedKind(String),
    #[error("command blocked by safety policy: {pattern}")]
    SafetyBlocked { pattern: String },
    #[error("timeout")]
    Timeout,
    #[error("command exited with code {0}")]
    NonZeroExit(i32),
    #[error("command terminated by signal")]
    Terminated,
    #[error("HTTP request failed with status {0}")]
    HttpStatus(u16),
    #[error("malformed action content: {0}")]
    MalformedConfig(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("executable not found: {0}")]
    ExecutableNotFound(String),
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ExecutionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_builder() {
            Self::MalformedConfig(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// A strategy that ran to completion.
///
/// The action may still have failed (non-zero exit, non-2xx status); in that
/// case `failure` is set and `output` still carries what was captured.
#[derive(Debug)]
pub struct Completed {
    pub output: String,
    pub failure: Option<ExecutionError>,
}

impl Completed {
    /// A completed run that succeeded.
    #[must_use]
    pub const fn success(output: String) -> Self {
        Self {
            output,
            failure: None,
        }
    }

    /// A completed run whose action reported failure.
    #[must_use]
    pub const fn failure(output: String, failure: ExecutionError) -> Self {
        Self {
            output,
            failure: Some(failure),
        }
    }
}

/// Result of one execution as reported to callers and the execution log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub output: String,
    pub success: bool,
    pub error_message: String,
}

impl ExecutionOutcome {
    /// Outcome for an error that stopped the strategy, with empty output.
    #[must_use]
    pub fn rejected(error: &ExecutionError) -> Self {
        Self {
            output: String::new(),
            success: false,
            error_message: error.to_string(),
        }
    }
}

impl From<Result<Completed, ExecutionError>> for ExecutionOutcome {
    fn from(result: Result<Completed, ExecutionError>) -> Self {
        match result {
            Ok(Completed {
                output,
                failure: None,
            }) => Self {
                output,
                success: true,
                error_message: String::new(),
            },
            Ok(Completed {
                output,
                failure: Some(failure),
            }) => Self {
                output,
                success: false,
                error_message: failure.to_string(),
            },
            Err(e) => Self::rejected(&e),
        }
    }
}
