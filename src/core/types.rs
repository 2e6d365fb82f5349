/*!
 * Core Types
 * Common types used across the process subsystem
 */

/// Native process identifier
///
/// `pid_t` on POSIX, the `DWORD` process id on Windows. `0` marks an
/// unconfigured or invalid process on every platform.
#[cfg(unix)]
pub type NativePid = libc::pid_t;

#[cfg(windows)]
pub type NativePid = u32;

#[cfg(not(any(unix, windows)))]
pub type NativePid = u32;

/// Pid value reported when no child is bound
pub const INVALID_PID: NativePid = 0;

/// Process exit code, see `core::limits` for the conventions
pub type ExitCode = i32;

/// Standard descriptor number type
pub type Fd = i32;
