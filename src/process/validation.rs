/*!
 * Process Configuration Validation
 * Checks run by `Process::start` before any OS resource is acquired
 */

use super::types::{IoOption, ProcessConfig, StdStream};
use crate::core::errors::{ProcessError, ProcessResult};

/// Validate a configuration for spawning
pub(super) fn validate_config(config: &ProcessConfig<'_>) -> ProcessResult<()> {
    validate_args(&config.args)?;

    for (key, value) in &config.environment {
        validate_env_pair(key, value)?;
    }

    if let Some(dir) = &config.working_directory {
        if dir.as_os_str().is_empty() {
            return Err(ProcessError::InvalidArgument(
                "Working directory cannot be empty".to_string(),
            ));
        }
    }

    for stream in StdStream::ALL {
        validate_redirect(config, stream)?;
    }

    Ok(())
}

/// Validate the argument vector
fn validate_args(args: &[String]) -> ProcessResult<()> {
    let program = args.first().ok_or_else(|| {
        ProcessError::InvalidArgument("Argument list cannot be empty".to_string())
    })?;

    if program.is_empty() {
        return Err(ProcessError::InvalidArgument(
            "Program name cannot be empty".to_string(),
        ));
    }

    if let Some(index) = args.iter().position(|arg| arg.contains('\0')) {
        return Err(ProcessError::InvalidArgument(format!(
            "Argument {} contains a NUL byte",
            index
        )));
    }

    Ok(())
}

/// Validate one environment entry
pub(crate) fn validate_env_pair(key: &str, value: &str) -> ProcessResult<()> {
    validate_env_name(key)?;
    if value.contains('\0') {
        return Err(ProcessError::InvalidArgument(format!(
            "Environment value for '{}' contains a NUL byte",
            key
        )));
    }
    Ok(())
}

/// Validate an environment variable name
pub(crate) fn validate_env_name(key: &str) -> ProcessResult<()> {
    if key.is_empty() {
        return Err(ProcessError::InvalidArgument(
            "Environment variable name cannot be empty".to_string(),
        ));
    }
    if key.contains('=') || key.contains('\0') {
        return Err(ProcessError::InvalidArgument(format!(
            "Environment variable name '{}' contains '=' or NUL",
            key.escape_default()
        )));
    }
    Ok(())
}

/// A `Redirect` stream needs an open endpoint usable in the child's direction
fn validate_redirect(config: &ProcessConfig<'_>, stream: StdStream) -> ProcessResult<()> {
    if config.option(stream) != IoOption::Redirect {
        return Ok(());
    }

    let endpoint = config.redirect(stream).ok_or_else(|| {
        ProcessError::InvalidArgument(format!(
            "{} redirect requires an endpoint",
            stream.name()
        ))
    })?;

    if !endpoint.is_open() {
        return Err(ProcessError::InvalidArgument(format!(
            "{} redirect endpoint is closed",
            stream.name()
        )));
    }

    let usable = if stream.child_access().is_readable() {
        endpoint.access().is_readable()
    } else {
        endpoint.access().is_writable()
    };
    if !usable {
        return Err(ProcessError::InvalidArgument(format!(
            "{} redirect endpoint is {:?}, child needs {:?}",
            stream.name(),
            endpoint.access(),
            stream.child_access()
        )));
    }

    Ok(())
}
