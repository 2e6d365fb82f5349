/*!
 * POSIX Backend
 * posix_spawn based spawning, waitpid / signal-probe supervision
 */

mod spawn;

use crate::core::errors::ProcessResult;
use crate::core::limits::{POLL_INTERVAL, SIGNAL_EXIT_BASE};
use crate::core::types::{ExitCode, NativePid};
use crate::process::traits::{PlatformProcess, Spawned, Termination};
use crate::process::types::{ProcessConfig, SyntheticExitCodes};
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use spawn::SpawnPlan;
use tracing::{debug, info, trace};

/// A child spawned through posix_spawn
#[derive(Debug)]
pub struct UnixProcess {
    pid: Pid,
    background: bool,
    exit_codes: SyntheticExitCodes,
    killed: bool,
}

impl UnixProcess {
    /// Probe a detached child with the null signal
    fn probe_detached(&self) -> ProcessResult<Option<ExitCode>> {
        match kill(self.pid, None) {
            Ok(()) if is_zombie(self.pid) => Ok(Some(self.synthetic_exit_code())),
            Ok(()) => Ok(None),
            // Exists, owned by someone else
            Err(Errno::EPERM) => Ok(None),
            Err(Errno::ESRCH) => Ok(Some(self.synthetic_exit_code())),
            Err(e) => Err(e.into()),
        }
    }

    fn synthetic_exit_code(&self) -> ExitCode {
        if self.killed {
            self.exit_codes.killed
        } else {
            self.exit_codes.exited
        }
    }
}

impl PlatformProcess for UnixProcess {
    fn spawn(config: &ProcessConfig<'_>) -> ProcessResult<Spawned<Self>> {
        let plan = SpawnPlan::build(config)?;
        debug!(
            argc = plan.argv.len(),
            custom_env = plan.envp.is_some(),
            pipes = plan.parent.count(),
            background = config.background,
            "Spawn plan ready"
        );

        let pid = if config.background {
            spawn::spawn_detached(&plan)?
        } else {
            spawn::spawn_foreground(&plan)?
        };

        info!(
            pid = pid.as_raw(),
            program = config.program().unwrap_or_default(),
            background = config.background,
            "Spawned process"
        );

        Ok(Spawned {
            process: UnixProcess {
                pid,
                background: config.background,
                exit_codes: config.exit_codes,
                killed: false,
            },
            stdio: plan.finish(),
        })
    }

    fn pid(&self) -> NativePid {
        self.pid.as_raw()
    }

    fn is_background(&self) -> bool {
        self.background
    }

    fn poll(&mut self) -> ProcessResult<Option<ExitCode>> {
        if self.background {
            return self.probe_detached();
        }

        match waitpid(self.pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(status) => Ok(decode_status(status)),
            Err(Errno::EINTR) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn wait(&mut self) -> ProcessResult<ExitCode> {
        if self.background {
            // Reparented away from us; nothing to block on
            loop {
                if let Some(code) = self.probe_detached()? {
                    return Ok(code);
                }
                std::thread::sleep(POLL_INTERVAL);
            }
        }

        loop {
            match waitpid(self.pid, None) {
                Ok(status) => {
                    if let Some(code) = decode_status(status) {
                        return Ok(code);
                    }
                }
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn terminate(&mut self, force: bool) -> ProcessResult<Termination> {
        let signal = if force {
            Signal::SIGKILL
        } else {
            Signal::SIGTERM
        };

        match kill(self.pid, signal) {
            Ok(()) => {
                if self.background {
                    self.killed = true;
                }
                debug!(pid = self.pid.as_raw(), ?signal, "Signal delivered");
                Ok(Termination::Signalled)
            }
            Err(Errno::ESRCH) if self.background => {
                self.killed = true;
                debug!(pid = self.pid.as_raw(), "Detached process already gone");
                Ok(Termination::AlreadyGone)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Exit code for a terminal wait status, `None` while the child still runs
fn decode_status(status: WaitStatus) -> Option<ExitCode> {
    match status {
        WaitStatus::Exited(_, code) => Some(code),
        WaitStatus::Signaled(_, signal, _) => Some(SIGNAL_EXIT_BASE + signal as i32),
        other => {
            trace!(status = ?other, "Non-terminal wait status");
            None
        }
    }
}

/// A zombie still answers the null signal until its new parent reaps it
#[cfg(any(target_os = "linux", target_os = "android"))]
fn is_zombie(pid: Pid) -> bool {
    let stat = match std::fs::read_to_string(format!("/proc/{}/stat", pid.as_raw())) {
        Ok(stat) => stat,
        Err(_) => return false,
    };
    // Format: "pid (comm) state ...", comm may itself contain ')'
    stat.rsplit_once(')')
        .and_then(|(_, rest)| rest.trim_start().chars().next())
        .map_or(false, |state| state == 'Z' || state == 'X')
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn is_zombie(_pid: Pid) -> bool {
    false
}
