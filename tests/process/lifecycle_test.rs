/*!
 * Process Lifecycle Tests
 * Start, poll, join, kill and exit code propagation for foreground children
 */

#![cfg(unix)]

use os_foundation::{Process, ProcessConfig, ProcessError, ProcessState, INVALID_PID};
use pretty_assertions::assert_eq;
use std::time::Duration;

fn sleeper(seconds: &str) -> ProcessConfig<'static> {
    ProcessConfig::new(["sleep", seconds])
}

fn exit_with(code: i32) -> ProcessConfig<'static> {
    ProcessConfig::new(["/bin/sh", "-c"]).with_arg(format!("exit {}", code))
}

#[test]
fn test_sleeper_is_alive_after_start() {
    let mut process = Process::new();
    process.start(&sleeper("30")).unwrap();

    assert!(process.is_valid());
    assert_ne!(process.get_pid(), INVALID_PID);
    assert!(process.is_alive());
    assert_eq!(process.state(), ProcessState::Running);
    assert!(!process.is_complete());

    assert!(process.kill(true));
}

#[test]
fn test_exit_codes_propagate() {
    for code in [0, 1, 2, 42, 100, 127] {
        let mut process = Process::new();
        process.start(&exit_with(code)).unwrap();
        assert!(process.join());
        assert!(process.is_complete());
        assert_eq!(process.get_exit_code(), Ok(code), "exit {}", code);
    }
}

#[test]
fn test_exit_code_before_completion() {
    let mut process = Process::new();
    process.start(&sleeper("30")).unwrap();

    assert_eq!(process.get_exit_code(), Err(ProcessError::NotComplete));

    assert!(process.kill(true));
}

#[test]
fn test_second_start_is_rejected() {
    let mut process = Process::new();
    process.start(&sleeper("30")).unwrap();
    let pid = process.get_pid();

    let second = process.start(&exit_with(3));
    assert_eq!(second, Err(ProcessError::AlreadyConfigured));

    assert_eq!(process.get_pid(), pid);
    assert!(process.is_alive());
    assert_eq!(process.state(), ProcessState::Running);

    assert!(process.kill(true));
}

#[test]
fn test_graceful_kill_completes() {
    let mut process = Process::new();
    process.start(&sleeper("30")).unwrap();

    assert!(process.kill(false));
    assert!(process.join());
    assert!(process.is_complete());
    assert!(!process.is_alive());
    // SIGTERM
    assert_eq!(process.get_exit_code(), Ok(128 + 15));
}

#[test]
fn test_forced_kill_reports_sigkill() {
    let mut process = Process::new();
    process.start(&sleeper("30")).unwrap();

    assert!(process.kill(true));
    assert_eq!(process.get_exit_code(), Ok(128 + 9));
}

#[test]
fn test_kill_after_completion_is_noop() {
    let mut process = Process::new();
    process.start(&exit_with(5)).unwrap();
    assert!(process.join());

    assert!(process.kill(true));
    assert_eq!(process.get_exit_code(), Ok(5));
}

#[test]
fn test_join_timeout_leaves_child_running() {
    let mut process = Process::new();
    process.start(&sleeper("30")).unwrap();

    assert!(!process.join_timeout(Duration::from_millis(50)));
    assert!(process.is_alive());
    assert!(process.last_error().is_none());

    assert!(process.kill(true));
}

#[test]
fn test_join_timeout_observes_exit() {
    let mut process = Process::new();
    process.start(&exit_with(7)).unwrap();

    assert!(process.join_timeout(Duration::from_secs(10)));
    assert_eq!(process.get_exit_code(), Ok(7));
}

#[test]
fn test_polling_observes_exit() {
    let mut process = Process::new();
    process.start(&exit_with(9)).unwrap();

    let mut polls = 0;
    while process.is_alive() {
        polls += 1;
        assert!(polls < 1000, "child never exited");
        std::thread::sleep(Duration::from_millis(10));
    }

    assert!(process.is_complete());
    assert_eq!(process.get_exit_code(), Ok(9));
    assert!(process.join());
}

#[test]
fn test_failed_start_allows_retry() {
    let mut process = Process::new();

    let result = process.start(&ProcessConfig::new(["/nonexistent/osrun-test-binary"]));
    assert!(matches!(result, Err(ProcessError::SystemError { .. })));
    assert_eq!(process.get_pid(), INVALID_PID);
    assert_eq!(process.state(), ProcessState::Unconfigured);

    process.start(&exit_with(0)).unwrap();
    assert!(process.join());
    assert_eq!(process.get_exit_code(), Ok(0));
}

/// A variable of this test process that `sh` does not set on its own
fn inherited_variable() -> (String, String) {
    const SHELL_MANAGED: [&str; 6] = ["PWD", "OLDPWD", "SHLVL", "_", "IFS", "PATH"];

    std::env::vars()
        .find(|(key, value)| {
            !SHELL_MANAGED.contains(&key.as_str())
                && !value.is_empty()
                && !value.contains('\n')
                && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !key.starts_with(|c: char| c.is_ascii_digit())
        })
        .expect("test environment has at least one plain variable")
}

#[test]
fn test_empty_environment_inherits_parent() {
    let (key, value) = inherited_variable();

    let config = ProcessConfig::new([
        "/bin/sh",
        "-c",
        r#"test "$(printenv "$1")" = "$2""#,
        "sh",
        key.as_str(),
        value.as_str(),
    ]);

    let mut process = Process::new();
    process.start(&config).unwrap();
    assert!(process.join());
    assert_eq!(process.get_exit_code(), Ok(0), "{} not inherited", key);
}

#[test]
fn test_custom_environment_replaces_inherited() {
    let (key, _) = inherited_variable();

    let config = ProcessConfig::new([
        "/bin/sh",
        "-c",
        r#"test "$GREETING" = hello && test -z "$(printenv "$1")""#,
        "sh",
        key.as_str(),
    ])
    .with_env("GREETING", "hello");

    let mut process = Process::new();
    process.start(&config).unwrap();
    assert!(process.join());
    assert_eq!(process.get_exit_code(), Ok(0), "{} leaked into child", key);
}

#[cfg(any(target_os = "linux", target_os = "macos"))]
#[test]
fn test_working_directory_applies() {
    let dir = tempfile::tempdir().unwrap();
    let expected = dir.path().canonicalize().unwrap();

    let config = ProcessConfig::new(["/bin/sh", "-c", r#"test "$(pwd -P)" = "$1""#, "sh"])
        .with_arg(expected.to_string_lossy())
        .with_working_dir(dir.path());

    let mut process = Process::new();
    process.start(&config).unwrap();
    assert!(process.join());
    assert_eq!(process.get_exit_code(), Ok(0));
}

#[test]
fn test_drop_does_not_kill_child() {
    let pid = {
        let mut process = Process::new();
        process.start(&sleeper("30")).unwrap();
        process.get_pid()
    };

    let pid = nix::unistd::Pid::from_raw(pid);
    assert!(nix::sys::signal::kill(pid, None).is_ok());

    nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGKILL).unwrap();
    nix::sys::wait::waitpid(pid, None).unwrap();
}
