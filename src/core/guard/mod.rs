/*!
 * RAII Resource Guards
 *
 * Scoped OS resources with guaranteed release.
 *
 * ## Design Principles
 *
 * 1. **Release exactly once**: `release()` is idempotent-checked, Drop only
 *    releases what is still active
 * 2. **Commit to keep**: acquisition scopes roll back unless explicitly committed
 * 3. **Never panic on drop**: failures are logged instead
 *
 * ## Guard Types
 *
 * - **SpawnTransaction**: rollback actions for one `Process::start` attempt
 * - Platform spawn objects (`posix_spawn_file_actions_t`, `posix_spawnattr_t`)
 *   implement [`Guard`] in their backend modules
 *
 * ## Example
 *
 * ```ignore
 * let mut tx = SpawnTransaction::new("spawn");
 * tx.defer("reap intermediary", move || reap(pid));
 * // ... more fallible work ...
 * tx.commit(); // Or auto-rollback on drop
 * ```
 */

mod traits;
mod transaction;

pub use traits::{Guard, GuardDrop};
pub use transaction::{SpawnTransaction, TransactionState};

use crate::core::types::NativePid;

/// Result type for guard operations
pub type GuardResult<T> = Result<T, GuardError>;

/// Errors that can occur during guard operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum GuardError {
    #[error("Resource already released")]
    AlreadyReleased,

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

/// Guard metadata for observability
#[derive(Debug, Clone)]
pub struct GuardMetadata {
    pub resource_type: &'static str,
    pub creation_time: std::time::Instant,
    pub pid: Option<NativePid>,
}

impl GuardMetadata {
    #[inline]
    pub fn new(resource_type: &'static str) -> Self {
        Self {
            resource_type,
            creation_time: std::time::Instant::now(),
            pid: None,
        }
    }

    #[inline]
    pub fn lifetime_micros(&self) -> u64 {
        self.creation_time.elapsed().as_micros() as u64
    }
}
