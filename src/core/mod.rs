/*!
 * Core Module
 * Fundamental types, limits, guards and error handling
 */

pub mod errors;
pub mod guard;
pub mod limits;
pub mod types;

// Re-export for convenience
pub use errors::*;
pub use guard::{Guard, GuardDrop, GuardError, GuardMetadata, GuardResult, SpawnTransaction};
pub use types::*;
