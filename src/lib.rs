/*!
 * OS Foundation Library
 * Child process execution, standard stream wiring, and current-process access
 */

pub mod core;
pub mod current;
pub mod io;
pub mod monitoring;
pub mod process;

// Re-exports
pub use crate::core::errors::{ProcessError, ProcessResult};
pub use crate::core::types::{ExitCode, NativePid, INVALID_PID};
pub use io::{Access, Stream};
pub use monitoring::init_tracing;
pub use process::{
    IoOption, Process, ProcessConfig, ProcessSpec, ProcessState, StdStream, SyntheticExitCodes,
};
