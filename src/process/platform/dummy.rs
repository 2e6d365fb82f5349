/*!
 * Dummy Backend
 * Used on targets without OS process support
 */

use crate::core::errors::{ProcessError, ProcessResult};
use crate::core::types::{ExitCode, NativePid};
use crate::process::traits::{PlatformProcess, Spawned, Termination};
use crate::process::types::ProcessConfig;

fn unsupported<T>(operation: &str) -> ProcessResult<T> {
    Err(ProcessError::Unsupported(format!(
        "{} requires a POSIX or Windows target",
        operation
    )))
}

/// Never constructed; every spawn fails with `Unsupported`
#[derive(Debug)]
pub struct DummyProcess {
    _private: (),
}

impl PlatformProcess for DummyProcess {
    fn spawn(_config: &ProcessConfig<'_>) -> ProcessResult<Spawned<Self>> {
        unsupported("process spawning")
    }

    fn pid(&self) -> NativePid {
        0
    }

    fn is_background(&self) -> bool {
        false
    }

    fn poll(&mut self) -> ProcessResult<Option<ExitCode>> {
        unsupported("process polling")
    }

    fn wait(&mut self) -> ProcessResult<ExitCode> {
        unsupported("process waiting")
    }

    fn terminate(&mut self, _force: bool) -> ProcessResult<Termination> {
        unsupported("process termination")
    }
}
