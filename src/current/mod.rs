/*!
 * Current Process
 * Identity, environment, and standard streams of the calling process
 *
 * Every call reads the live OS state; nothing is cached.
 */

#[cfg(not(any(unix, windows)))]
use crate::core::errors::ProcessError;
use crate::core::errors::ProcessResult;
use crate::core::types::NativePid;
use crate::io::Stream;
use crate::process::validate_env_name;
use crate::process::StdStream;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Native id of the calling process
pub fn get_pid() -> NativePid {
    #[cfg(unix)]
    {
        nix::unistd::getpid().as_raw()
    }
    #[cfg(not(unix))]
    {
        std::process::id()
    }
}

/// Snapshot of the environment
///
/// Entries whose key or value is not valid Unicode are skipped.
pub fn get_environment() -> BTreeMap<String, String> {
    std::env::vars_os()
        .filter_map(|(key, value)| match (key.into_string(), value.into_string()) {
            (Ok(key), Ok(value)) => Some((key, value)),
            (key, _) => {
                debug!(key = ?key, "Skipping non-Unicode environment entry");
                None
            }
        })
        .collect()
}

/// Value of one variable, `None` when unset, not Unicode, or the name is invalid
pub fn get_environment_variable(name: &str) -> Option<String> {
    if validate_env_name(name).is_err() {
        return None;
    }
    std::env::var(name).ok()
}

/// Set a variable for this process and children that inherit its environment
///
/// Returns `false` for an empty name, a name containing `=` or NUL, or a value
/// containing NUL.
pub fn set_environment_variable(name: &str, value: &str) -> bool {
    if let Err(e) = validate_env_name(name) {
        warn!(name, error = %e, "Rejected environment variable name");
        return false;
    }
    if value.contains('\0') {
        warn!(name, "Rejected environment value containing NUL");
        return false;
    }
    std::env::set_var(name, value);
    true
}

/// Remove a variable; removing an unset variable succeeds
pub fn clear_environment_variable(name: &str) -> bool {
    if let Err(e) = validate_env_name(name) {
        warn!(name, error = %e, "Rejected environment variable name");
        return false;
    }
    std::env::remove_var(name);
    true
}

/// Independent duplicate of this process's stdin
pub fn get_stdin() -> ProcessResult<Stream> {
    duplicate_std(StdStream::Stdin)
}

pub fn get_stdout() -> ProcessResult<Stream> {
    duplicate_std(StdStream::Stdout)
}

pub fn get_stderr() -> ProcessResult<Stream> {
    duplicate_std(StdStream::Stderr)
}

/// Closing the returned stream never closes the process's own descriptor.
/// This process reads and writes its own streams the way a child would.
#[cfg(unix)]
fn duplicate_std(stream: StdStream) -> ProcessResult<Stream> {
    use std::os::fd::AsFd;

    let owned = match stream {
        StdStream::Stdin => std::io::stdin().as_fd().try_clone_to_owned(),
        StdStream::Stdout => std::io::stdout().as_fd().try_clone_to_owned(),
        StdStream::Stderr => std::io::stderr().as_fd().try_clone_to_owned(),
    }?;
    Ok(Stream::from_owned_fd(owned, stream.child_access()))
}

#[cfg(windows)]
fn duplicate_std(stream: StdStream) -> ProcessResult<Stream> {
    use std::os::windows::io::AsHandle;

    let owned = match stream {
        StdStream::Stdin => std::io::stdin().as_handle().try_clone_to_owned(),
        StdStream::Stdout => std::io::stdout().as_handle().try_clone_to_owned(),
        StdStream::Stderr => std::io::stderr().as_handle().try_clone_to_owned(),
    }?;
    Ok(Stream::from_owned_handle(owned, stream.child_access()))
}

#[cfg(not(any(unix, windows)))]
fn duplicate_std(stream: StdStream) -> ProcessResult<Stream> {
    Err(ProcessError::Unsupported(format!(
        "duplicating {} on this platform",
        stream.name()
    )))
}
