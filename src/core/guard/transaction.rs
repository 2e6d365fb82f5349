/*!
 * Transaction Guards
 *
 * All-or-nothing scope for one spawn attempt. Rollback actions registered
 * while acquiring OS resources run in reverse order unless the scope is
 * committed.
 */

use super::traits::{log_release_failure, Guard, GuardDrop};
use super::{GuardError, GuardMetadata, GuardResult};
use crate::core::types::NativePid;

type RollbackFn = Box<dyn FnOnce() -> Result<(), String> + Send>;

/// Transaction state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Resources are being acquired
    Active,
    /// Attempt succeeded, rollback actions discarded
    Committed,
    /// Rollback actions ran
    RolledBack,
}

/// Rollback scope for a spawn attempt
///
/// # Example
///
/// ```ignore
/// let mut tx = SpawnTransaction::new("posix_spawn");
/// let child = fork_intermediary()?;
/// tx.defer("reap intermediary", move || reap(child));
///
/// let pid = read_reported_pid()?; // Failure here reaps the intermediary
/// tx.commit();
/// ```
pub struct SpawnTransaction {
    state: TransactionState,
    actions: Vec<(&'static str, RollbackFn)>,
    metadata: GuardMetadata,
}

impl SpawnTransaction {
    /// Begin a new transaction
    pub fn new(resource_type: &'static str) -> Self {
        Self {
            state: TransactionState::Active,
            actions: Vec::new(),
            metadata: GuardMetadata::new(resource_type),
        }
    }

    /// Tag the transaction with the pid it is about to produce
    pub fn set_pid(&mut self, pid: NativePid) {
        self.metadata.pid = Some(pid);
    }

    /// Register an action that undoes an acquisition
    pub fn defer<F>(&mut self, name: &'static str, action: F)
    where
        F: FnOnce() -> Result<(), String> + Send + 'static,
    {
        self.actions.push((name, Box::new(action)));
    }

    /// Number of pending rollback actions
    pub fn pending(&self) -> usize {
        self.actions.len()
    }

    /// Get current transaction state
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Keep everything that was acquired
    pub fn commit(mut self) {
        self.actions.clear();
        self.state = TransactionState::Committed;
        tracing::trace!(
            resource = self.metadata.resource_type,
            pid = ?self.metadata.pid,
            lifetime_micros = self.metadata.lifetime_micros(),
            "Spawn transaction committed"
        );
    }

    /// Run rollback actions now
    pub fn rollback(mut self) -> GuardResult<()> {
        self.release()
    }

    fn run_rollback(&mut self) -> GuardResult<()> {
        let mut failures = Vec::new();
        while let Some((name, action)) = self.actions.pop() {
            if let Err(e) = action() {
                failures.push(format!("{}: {}", name, e));
            }
        }
        self.state = TransactionState::RolledBack;

        if failures.is_empty() {
            Ok(())
        } else {
            Err(GuardError::OperationFailed(failures.join("; ")))
        }
    }
}

impl Guard for SpawnTransaction {
    fn resource_type(&self) -> &'static str {
        self.metadata.resource_type
    }

    fn metadata(&self) -> &GuardMetadata {
        &self.metadata
    }

    fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    fn release(&mut self) -> GuardResult<()> {
        if self.state != TransactionState::Active {
            return Err(GuardError::InvalidTransition {
                from: format!("{:?}", self.state),
                to: "RolledBack".to_string(),
            });
        }

        tracing::debug!(
            resource = self.metadata.resource_type,
            pid = ?self.metadata.pid,
            actions = self.actions.len(),
            "Rolling back spawn transaction"
        );
        self.run_rollback()
    }
}

impl GuardDrop for SpawnTransaction {
    fn on_drop(&mut self) {
        if self.is_active() {
            if let Err(e) = self.release() {
                log_release_failure(&self.metadata, &e);
            }
        }
    }
}

impl Drop for SpawnTransaction {
    fn drop(&mut self) {
        self.on_drop();
    }
}
