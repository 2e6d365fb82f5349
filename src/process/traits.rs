/*!
 * Process Traits
 * Platform backend abstraction for spawning and supervising one child
 */

use super::types::{ProcessConfig, StdStream};
use crate::core::errors::ProcessResult;
use crate::core::types::{ExitCode, NativePid};
use crate::io::Stream;

/// Parent-side ends of `Create` pipes produced by a spawn
#[derive(Debug, Default)]
pub struct StdioEndpoints {
    pub stdin: Option<Stream>,
    pub stdout: Option<Stream>,
    pub stderr: Option<Stream>,
}

impl StdioEndpoints {
    pub fn set(&mut self, stream: StdStream, endpoint: Stream) {
        match stream {
            StdStream::Stdin => self.stdin = Some(endpoint),
            StdStream::Stdout => self.stdout = Some(endpoint),
            StdStream::Stderr => self.stderr = Some(endpoint),
        }
    }

    pub fn count(&self) -> usize {
        [&self.stdin, &self.stdout, &self.stderr]
            .iter()
            .filter(|s| s.is_some())
            .count()
    }
}

/// Successful spawn: the native identity plus its parent-side endpoints
#[derive(Debug)]
pub struct Spawned<P> {
    pub process: P,
    pub stdio: StdioEndpoints,
}

/// Outcome of a termination request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The request was delivered
    Signalled,
    /// The child no longer existed; treated as killed
    AlreadyGone,
}

/// Native process control, one implementation per OS family
///
/// Implementations own the native process identity exclusively and release
/// it on drop without terminating the child.
pub trait PlatformProcess: Send + Sized {
    /// Spawn a child described by an already validated configuration
    ///
    /// On error every OS resource acquired during the attempt is released.
    fn spawn(config: &ProcessConfig<'_>) -> ProcessResult<Spawned<Self>>;

    /// Native process id
    fn pid(&self) -> NativePid;

    /// Spawned in detached (background) mode
    fn is_background(&self) -> bool;

    /// Non-blocking status check, `Some(code)` once termination is observed
    fn poll(&mut self) -> ProcessResult<Option<ExitCode>>;

    /// Block until termination is observed
    fn wait(&mut self) -> ProcessResult<ExitCode>;

    /// Request termination, forcefully where the platform distinguishes
    fn terminate(&mut self, force: bool) -> ProcessResult<Termination>;
}
