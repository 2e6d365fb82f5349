/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Process operation result
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Process-related errors with serialization support
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ProcessError {
    #[error("Invalid argument: {0}")]
    #[diagnostic(
        code(process::invalid_argument),
        help("Check the argument list, environment and redirect endpoints of the configuration.")
    )]
    InvalidArgument(String),

    #[error("Process is already configured")]
    #[diagnostic(
        code(process::already_configured),
        help("A Process instance spawns at most once. Create a new instance for another child.")
    )]
    AlreadyConfigured,

    #[error("System error {code}: {message}")]
    #[diagnostic(
        code(process::system_error),
        help("An operating system call failed. The code is the native errno / GetLastError value.")
    )]
    SystemError { code: i32, message: String },

    #[error("Process has not completed")]
    #[diagnostic(
        code(process::not_complete),
        help("Call join() or poll is_alive() until is_complete() returns true.")
    )]
    NotComplete,

    #[error("Unsupported on this platform: {0}")]
    #[diagnostic(
        code(process::unsupported),
        help("The current platform backend does not implement this feature.")
    )]
    Unsupported(String),

    #[error("Invalid process state: {0}")]
    #[diagnostic(
        code(process::invalid_state),
        help("Operation cannot be performed in current process state.")
    )]
    InvalidState(String),
}

impl ProcessError {
    /// Build a `SystemError` from a raw OS error code
    pub fn from_os_code(code: i32) -> Self {
        io::Error::from_raw_os_error(code).into()
    }

    /// Build a `SystemError` from the calling thread's last OS error
    pub fn last_os_error() -> Self {
        io::Error::last_os_error().into()
    }

    /// Native error code, if this wraps an OS failure
    pub fn os_code(&self) -> Option<i32> {
        match self {
            ProcessError::SystemError { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<io::Error> for ProcessError {
    fn from(err: io::Error) -> Self {
        ProcessError::SystemError {
            code: err.raw_os_error().unwrap_or(-1),
            message: err.to_string(),
        }
    }
}

#[cfg(unix)]
impl From<nix::errno::Errno> for ProcessError {
    fn from(errno: nix::errno::Errno) -> Self {
        ProcessError::SystemError {
            code: errno as i32,
            message: errno.desc().to_string(),
        }
    }
}
