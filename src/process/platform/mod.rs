/*!
 * Platform Backends
 * Compile-time selection of the native process implementation
 */

pub mod dummy;

#[cfg(unix)]
pub mod unix;

#[cfg(windows)]
pub mod windows;

/// Backend used by [`Process`](crate::process::Process) on this target
#[cfg(unix)]
pub type Backend = unix::UnixProcess;

#[cfg(windows)]
pub type Backend = windows::WindowsProcess;

#[cfg(not(any(unix, windows)))]
pub type Backend = dummy::DummyProcess;
