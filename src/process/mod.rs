/*!
 * Process Module
 * Child process configuration, spawning, and lifecycle supervision
 */

pub mod cmdline;
pub mod lifecycle;
pub mod platform;
pub mod traits;
pub mod types;
mod validation;

// Re-export for convenience
pub use lifecycle::Process;
pub use platform::Backend;
pub use traits::{PlatformProcess, Spawned, StdioEndpoints, Termination};
pub use types::{IoOption, ProcessConfig, ProcessSpec, ProcessState, StdStream, SyntheticExitCodes};
pub(crate) use validation::validate_env_name;
