/*!
 * Windows Backend
 * CreateProcessW based spawning, handle-wait supervision
 */

mod spawn;

use crate::core::errors::{ProcessError, ProcessResult};
use crate::core::limits::TERMINATED_EXIT_CODE;
use crate::core::types::{ExitCode, NativePid};
use crate::process::traits::{PlatformProcess, Spawned, Termination};
use crate::process::types::ProcessConfig;
use std::os::windows::io::{AsRawHandle, OwnedHandle};
use tracing::{debug, info};

use windows_sys::Win32::Foundation::{WAIT_OBJECT_0, WAIT_TIMEOUT};
use windows_sys::Win32::System::Threading::{
    GetExitCodeProcess, TerminateProcess, WaitForSingleObject, INFINITE,
};

/// A child created through CreateProcessW
///
/// Windows children stay waitable whether or not they are detached from the
/// console, so foreground and background share every code path here.
#[derive(Debug)]
pub struct WindowsProcess {
    process: OwnedHandle,
    _thread: OwnedHandle,
    pid: u32,
    background: bool,
}

impl WindowsProcess {
    /// `true` once the process handle is signalled
    fn wait_handle(&self, timeout_ms: u32) -> ProcessResult<bool> {
        match unsafe { WaitForSingleObject(self.process.as_raw_handle(), timeout_ms) } {
            WAIT_OBJECT_0 => Ok(true),
            WAIT_TIMEOUT => Ok(false),
            _ => Err(ProcessError::last_os_error()),
        }
    }

    fn exit_code(&self) -> ProcessResult<ExitCode> {
        let mut code: u32 = 0;
        if unsafe { GetExitCodeProcess(self.process.as_raw_handle(), &mut code) } == 0 {
            return Err(ProcessError::last_os_error());
        }
        Ok(code as i32)
    }
}

impl PlatformProcess for WindowsProcess {
    fn spawn(config: &ProcessConfig<'_>) -> ProcessResult<Spawned<Self>> {
        let (created, stdio) = spawn::create_process(config)?;

        info!(
            pid = created.pid,
            program = config.program().unwrap_or_default(),
            background = config.background,
            pipes = stdio.count(),
            "Spawned process"
        );

        Ok(Spawned {
            process: WindowsProcess {
                process: created.process,
                _thread: created.thread,
                pid: created.pid,
                background: config.background,
            },
            stdio,
        })
    }

    fn pid(&self) -> NativePid {
        self.pid
    }

    fn is_background(&self) -> bool {
        self.background
    }

    fn poll(&mut self) -> ProcessResult<Option<ExitCode>> {
        if self.wait_handle(0)? {
            self.exit_code().map(Some)
        } else {
            Ok(None)
        }
    }

    fn wait(&mut self) -> ProcessResult<ExitCode> {
        self.wait_handle(INFINITE)?;
        self.exit_code()
    }

    fn terminate(&mut self, _force: bool) -> ProcessResult<Termination> {
        // No graceful variant for arbitrary (possibly console-less) children
        if unsafe { TerminateProcess(self.process.as_raw_handle(), TERMINATED_EXIT_CODE) } != 0 {
            debug!(pid = self.pid, "TerminateProcess delivered");
            return Ok(Termination::Signalled);
        }

        let error = ProcessError::last_os_error();
        if self.wait_handle(0)? {
            debug!(pid = self.pid, "Process already exited before termination");
            return Ok(Termination::AlreadyGone);
        }
        Err(error)
    }
}
