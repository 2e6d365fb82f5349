/*!
 * Process Lifecycle
 * Unconfigured → Running → Complete state machine over a platform backend
 *
 * A `Process` spawns at most once. A failed `start()` leaves it unconfigured
 * and reusable. Dropping it releases native handles but never kills the child.
 */

use super::platform::Backend;
use super::traits::{PlatformProcess, Spawned, Termination};
use super::types::{ProcessConfig, ProcessState};
use super::validation::validate_config;
use crate::core::errors::{ProcessError, ProcessResult};
use crate::core::limits::POLL_INTERVAL;
use crate::core::types::{ExitCode, NativePid, INVALID_PID};
use crate::io::Stream;
use crate::monitoring::span_spawn;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// One child process and the parent-side ends of its `Create` pipes
#[derive(Debug, Default)]
pub struct Process {
    backend: Option<Backend>,
    stdin: Option<Stream>,
    stdout: Option<Stream>,
    stderr: Option<Stream>,
    complete: bool,
    exit_code: ExitCode,
    background: bool,
    last_error: Option<ProcessError>,
}

impl Process {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the child described by `config`
    ///
    /// Fails with `AlreadyConfigured` without side effects once a child is bound.
    /// Every resource acquired by a failed attempt is released before returning.
    pub fn start(&mut self, config: &ProcessConfig<'_>) -> ProcessResult<()> {
        if self.backend.is_some() {
            warn!(pid = self.get_pid(), "start() on an already configured process");
            return Err(ProcessError::AlreadyConfigured);
        }

        validate_config(config)?;

        let span = span_spawn(
            config.program().unwrap_or_default(),
            config.args.len(),
            config.background,
        );
        let _entered = span.enter();

        match Backend::spawn(config) {
            Ok(Spawned { process, stdio }) => {
                span.record_pid(process.pid());
                self.background = process.is_background();
                self.stdin = stdio.stdin;
                self.stdout = stdio.stdout;
                self.stderr = stdio.stderr;
                self.complete = false;
                self.exit_code = 0;
                self.last_error = None;
                self.backend = Some(process);
                Ok(())
            }
            Err(e) => {
                span.record_error(&e.to_string());
                error!(
                    program = config.program().unwrap_or_default(),
                    error = %e,
                    "Spawn failed"
                );
                Err(e)
            }
        }
    }

    /// Native id of the child, `INVALID_PID` when unconfigured
    pub fn get_pid(&self) -> NativePid {
        self.backend
            .as_ref()
            .map_or(INVALID_PID, |backend| backend.pid())
    }

    /// A child is bound to this instance
    pub fn is_valid(&self) -> bool {
        self.backend.is_some()
    }

    pub fn is_background(&self) -> bool {
        self.background
    }

    pub fn state(&self) -> ProcessState {
        match (&self.backend, self.complete) {
            (None, _) => ProcessState::Unconfigured,
            (Some(_), false) => ProcessState::Running,
            (Some(_), true) => ProcessState::Complete,
        }
    }

    /// Non-blocking liveness check
    ///
    /// Returns `false` without touching the OS once completion is known. OS
    /// failures also yield `false`; see [`Process::last_error`].
    pub fn is_alive(&mut self) -> bool {
        if self.complete {
            return false;
        }
        let Some(backend) = self.backend.as_mut() else {
            return false;
        };

        match backend.poll() {
            Ok(Some(code)) => {
                self.settle(code);
                false
            }
            Ok(None) => true,
            Err(e) => {
                self.record_failure("is_alive", e);
                false
            }
        }
    }

    /// Termination has been observed and the exit code cached
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Block until the child terminates
    pub fn join(&mut self) -> bool {
        if !self.require_configured("join") {
            return false;
        }
        if self.complete {
            return true;
        }

        let result = match self.backend.as_mut() {
            Some(backend) => backend.wait(),
            None => return false,
        };

        match result {
            Ok(code) => {
                self.settle(code);
                true
            }
            Err(e) => {
                self.record_failure("join", e);
                false
            }
        }
    }

    /// Wait at most `timeout` for the child to terminate
    ///
    /// Returns `false` if the deadline passes first; the child keeps running.
    pub fn join_timeout(&mut self, timeout: Duration) -> bool {
        if !self.require_configured("join_timeout") {
            return false;
        }

        let deadline = Instant::now() + timeout;
        loop {
            if !self.is_alive() {
                return self.complete;
            }
            let now = Instant::now();
            if now >= deadline {
                debug!(pid = self.get_pid(), ?timeout, "join_timeout elapsed");
                return false;
            }
            std::thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }

    /// Request termination, then settle the final state like `join()`
    ///
    /// `force` selects SIGKILL over SIGTERM on POSIX; Windows has a single mode.
    pub fn kill(&mut self, force: bool) -> bool {
        if !self.require_configured("kill") {
            return false;
        }
        if self.complete {
            return true;
        }

        let result = match self.backend.as_mut() {
            Some(backend) => backend.terminate(force),
            None => return false,
        };

        match result {
            Ok(Termination::Signalled) => {
                info!(pid = self.get_pid(), force, "Termination requested");
                self.join()
            }
            Ok(Termination::AlreadyGone) => {
                debug!(pid = self.get_pid(), "Child already gone, settling as killed");
                self.join()
            }
            Err(e) => {
                self.record_failure("kill", e);
                false
            }
        }
    }

    /// Cached exit code, `NotComplete` until termination is observed
    pub fn get_exit_code(&self) -> ProcessResult<ExitCode> {
        if self.complete {
            Ok(self.exit_code)
        } else {
            Err(ProcessError::NotComplete)
        }
    }

    /// Error behind the most recent `false` from a boolean operation
    pub fn last_error(&self) -> Option<&ProcessError> {
        self.last_error.as_ref()
    }

    /// Parent end of the stdin pipe (`Create` policy only)
    pub fn stdin(&mut self) -> Option<&mut Stream> {
        self.stdin.as_mut()
    }

    pub fn stdout(&mut self) -> Option<&mut Stream> {
        self.stdout.as_mut()
    }

    pub fn stderr(&mut self) -> Option<&mut Stream> {
        self.stderr.as_mut()
    }

    pub fn take_stdin(&mut self) -> Option<Stream> {
        self.stdin.take()
    }

    pub fn take_stdout(&mut self) -> Option<Stream> {
        self.stdout.take()
    }

    pub fn take_stderr(&mut self) -> Option<Stream> {
        self.stderr.take()
    }

    fn settle(&mut self, code: ExitCode) {
        self.complete = true;
        self.exit_code = code;
        self.last_error = None;
        info!(
            pid = self.get_pid(),
            exit_code = code,
            background = self.background,
            "Process complete"
        );
    }

    fn record_failure(&mut self, operation: &'static str, e: ProcessError) {
        error!(pid = self.get_pid(), operation, error = %e, "Process operation failed");
        self.last_error = Some(e);
    }

    /// Calling lifecycle operations on an unconfigured instance is a caller bug
    fn require_configured(&mut self, operation: &'static str) -> bool {
        if self.backend.is_some() {
            return true;
        }
        debug_assert!(false, "{} called on an unconfigured process", operation);
        self.record_failure(
            operation,
            ProcessError::InvalidState(format!("{} requires a started process", operation)),
        );
        false
    }
}

impl Drop for Process {
    fn drop(&mut self) {
        if self.backend.is_some() && !self.complete {
            debug!(
                pid = self.get_pid(),
                background = self.background,
                "Releasing process handle, child left running"
            );
        }
    }
}
