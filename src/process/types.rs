/*!
 * Process Types
 * Redirection policies and spawn configuration
 */

use crate::core::limits::{DEFAULT_DETACHED_EXIT_CODE, DEFAULT_DETACHED_KILLED_EXIT_CODE};
use crate::core::types::Fd;
use crate::io::{Access, Stream};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// How one standard stream of the child is wired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IoOption {
    /// Discard to the null device
    None,
    /// Share the parent's stream
    #[default]
    Inherit,
    /// New pipe; the parent keeps one end as a [`Stream`]
    Create,
    /// Bind to a caller-supplied, already open [`Stream`]
    Redirect,
}

/// The three standard streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StdStream {
    Stdin,
    Stdout,
    Stderr,
}

impl StdStream {
    pub const ALL: [StdStream; 3] = [StdStream::Stdin, StdStream::Stdout, StdStream::Stderr];

    /// Well-known descriptor number in the child
    #[inline]
    pub fn fd(self) -> Fd {
        match self {
            StdStream::Stdin => 0,
            StdStream::Stdout => 1,
            StdStream::Stderr => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StdStream::Stdin => "stdin",
            StdStream::Stdout => "stdout",
            StdStream::Stderr => "stderr",
        }
    }

    /// How the child uses the stream
    #[inline]
    pub fn child_access(self) -> Access {
        match self {
            StdStream::Stdin => Access::Read,
            StdStream::Stdout | StdStream::Stderr => Access::Write,
        }
    }

    /// How the parent uses its end of a `Create` pipe
    #[inline]
    pub fn parent_access(self) -> Access {
        match self {
            StdStream::Stdin => Access::Write,
            StdStream::Stdout | StdStream::Stderr => Access::Read,
        }
    }
}

/// Exit codes reported for detached children whose real status is unobservable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SyntheticExitCodes {
    /// Child vanished without being killed by this instance
    pub exited: i32,
    /// Child was killed by this instance, or was already gone when killed
    pub killed: i32,
}

impl Default for SyntheticExitCodes {
    fn default() -> Self {
        Self {
            exited: DEFAULT_DETACHED_EXIT_CODE,
            killed: DEFAULT_DETACHED_KILLED_EXIT_CODE,
        }
    }
}

/// Observable lifecycle state of a [`Process`](super::Process)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    /// No child bound (never started, or the start attempt failed)
    Unconfigured,
    /// Child spawned, termination not observed yet
    Running,
    /// Termination observed, exit code cached
    Complete,
}

/// Everything needed to spawn one process
///
/// Construction never fails; all checks run in `Process::start`.
#[derive(Debug, Clone, Default)]
pub struct ProcessConfig<'a> {
    /// Program followed by its arguments, resolved through the platform search path
    pub args: Vec<String>,
    /// Custom environment; empty means inherit the parent's verbatim
    pub environment: BTreeMap<String, String>,
    pub working_directory: Option<PathBuf>,
    pub stdin_option: IoOption,
    pub stdout_option: IoOption,
    pub stderr_option: IoOption,
    pub stdin_redirect: Option<&'a Stream>,
    pub stdout_redirect: Option<&'a Stream>,
    pub stderr_redirect: Option<&'a Stream>,
    /// Detach from the controlling session and from wait-based status reporting
    pub background: bool,
    pub exit_codes: SyntheticExitCodes,
}

impl<'a> ProcessConfig<'a> {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn with_environment(mut self, environment: BTreeMap<String, String>) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn with_stdin(mut self, option: IoOption) -> Self {
        self.stdin_option = option;
        self
    }

    pub fn with_stdout(mut self, option: IoOption) -> Self {
        self.stdout_option = option;
        self
    }

    pub fn with_stderr(mut self, option: IoOption) -> Self {
        self.stderr_option = option;
        self
    }

    /// Apply one option to all three streams
    pub fn with_stdio(self, option: IoOption) -> Self {
        self.with_stdin(option)
            .with_stdout(option)
            .with_stderr(option)
    }

    pub fn redirect_stdin(mut self, endpoint: &'a Stream) -> Self {
        self.stdin_option = IoOption::Redirect;
        self.stdin_redirect = Some(endpoint);
        self
    }

    pub fn redirect_stdout(mut self, endpoint: &'a Stream) -> Self {
        self.stdout_option = IoOption::Redirect;
        self.stdout_redirect = Some(endpoint);
        self
    }

    pub fn redirect_stderr(mut self, endpoint: &'a Stream) -> Self {
        self.stderr_option = IoOption::Redirect;
        self.stderr_redirect = Some(endpoint);
        self
    }

    pub fn with_background(mut self, background: bool) -> Self {
        self.background = background;
        self
    }

    pub fn with_synthetic_exit_codes(mut self, exit_codes: SyntheticExitCodes) -> Self {
        self.exit_codes = exit_codes;
        self
    }

    /// Program to execute
    pub fn program(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    #[inline]
    pub fn inherits_environment(&self) -> bool {
        self.environment.is_empty()
    }

    /// Configured policy for a stream
    pub fn option(&self, stream: StdStream) -> IoOption {
        match stream {
            StdStream::Stdin => self.stdin_option,
            StdStream::Stdout => self.stdout_option,
            StdStream::Stderr => self.stderr_option,
        }
    }

    /// Policy the backends actually apply
    ///
    /// A detached child has no terminal to share, so `Inherit` becomes `None`.
    pub fn effective_option(&self, stream: StdStream) -> IoOption {
        match self.option(stream) {
            IoOption::Inherit if self.background => IoOption::None,
            option => option,
        }
    }

    /// Redirect endpoint supplied for a stream
    pub fn redirect(&self, stream: StdStream) -> Option<&'a Stream> {
        match stream {
            StdStream::Stdin => self.stdin_redirect,
            StdStream::Stdout => self.stdout_redirect,
            StdStream::Stderr => self.stderr_redirect,
        }
    }
}

/// Serializable subset of [`ProcessConfig`]
///
/// Redirect endpoints are live OS objects and cannot be described in a file,
/// so `Redirect` is rejected by `Process::start` for configs built from a `ProcessSpec`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProcessSpec {
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,
    #[serde(default)]
    pub stdin: IoOption,
    #[serde(default)]
    pub stdout: IoOption,
    #[serde(default)]
    pub stderr: IoOption,
    #[serde(default)]
    pub background: bool,
    #[serde(default)]
    pub exit_codes: SyntheticExitCodes,
}

impl ProcessSpec {
    pub fn to_config(&self) -> ProcessConfig<'static> {
        ProcessConfig {
            args: self.args.clone(),
            environment: self.environment.clone(),
            working_directory: self.working_directory.clone(),
            stdin_option: self.stdin,
            stdout_option: self.stdout,
            stderr_option: self.stderr,
            stdin_redirect: None,
            stdout_redirect: None,
            stderr_redirect: None,
            background: self.background,
            exit_codes: self.exit_codes,
        }
    }
}
