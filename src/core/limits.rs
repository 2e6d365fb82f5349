/*!
 * System Limits and Constants
 *
 * Centralized location for process-execution limits, thresholds, and magic numbers.
 * Organized by domain for maintainability and discoverability.
 *
 * - Values are grouped by domain (polling, exit codes, descriptors)
 * - Linux-compatible values are marked with [LINUX-COMPAT]
 */

use std::time::Duration;

// =============================================================================
// POLLING
// =============================================================================

/// Sleep between liveness probes while joining a detached child (10ms)
/// Also used by `Process::join_timeout` for every child
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

// =============================================================================
// EXIT CODES
// =============================================================================

/// Base added to a signal number when a child dies by signal
/// [LINUX-COMPAT] Same convention as POSIX shells (`128 + SIGKILL` = 137)
pub const SIGNAL_EXIT_BASE: i32 = 128;

/// Synthetic exit code for a detached child that vanished on its own
/// Negative so it never collides with a status `waitpid` can report
pub const DEFAULT_DETACHED_EXIT_CODE: i32 = -1;

/// Synthetic exit code for a detached child that this instance killed
pub const DEFAULT_DETACHED_KILLED_EXIT_CODE: i32 = -2;

/// Exit code handed to `TerminateProcess` on Windows
pub const TERMINATED_EXIT_CODE: u32 = 1;

// =============================================================================
// DESCRIPTORS
// =============================================================================

/// Upper bound for the descriptor scan when open descriptors cannot be enumerated
/// Caps `sysconf(_SC_OPEN_MAX)`, which can be in the millions on some hosts
pub const FD_SCAN_LIMIT: i32 = 4096;

/// First descriptor number that is not a standard stream
pub const FIRST_NON_STD_FD: i32 = 3;

/// Null device path
#[cfg(unix)]
pub const NULL_DEVICE: &str = "/dev/null";

#[cfg(not(unix))]
pub const NULL_DEVICE: &str = "NUL";

/// Directory listing the calling process's open descriptors
#[cfg(any(target_os = "linux", target_os = "android"))]
pub const FD_DIRECTORY: &str = "/proc/self/fd";

#[cfg(all(unix, not(any(target_os = "linux", target_os = "android"))))]
pub const FD_DIRECTORY: &str = "/dev/fd";
