/*!
 * Failed Spawn Release Tests
 * Descriptors acquired by a failed start() are closed before it returns
 */

#![cfg(target_os = "linux")]

use os_foundation::{IoOption, Process, ProcessConfig, INVALID_PID};
use pretty_assertions::assert_eq;
use serial_test::serial;

const MISSING_PROGRAM: &str = "/nonexistent/osrun-missing-program";

fn open_fd_count() -> usize {
    std::fs::read_dir("/proc/self/fd").unwrap().count()
}

fn assert_failed_start_releases_fds(config: &ProcessConfig<'_>) {
    let before = open_fd_count();

    for _ in 0..8 {
        let mut process = Process::new();
        assert!(process.start(config).is_err());
        assert_eq!(process.get_pid(), INVALID_PID);
        assert!(process.stdout().is_none());
    }

    assert_eq!(open_fd_count(), before);
}

#[test]
#[serial]
fn test_failed_foreground_start_closes_pipes() {
    let config = ProcessConfig::new([MISSING_PROGRAM]).with_stdio(IoOption::Create);
    assert_failed_start_releases_fds(&config);
}

#[test]
#[serial]
fn test_failed_background_start_closes_pipes() {
    let config = ProcessConfig::new([MISSING_PROGRAM])
        .with_stdio(IoOption::Create)
        .with_background(true);
    assert_failed_start_releases_fds(&config);
}

#[test]
#[serial]
fn test_failed_start_with_null_streams_leaks_nothing() {
    let config = ProcessConfig::new([MISSING_PROGRAM]).with_stdio(IoOption::None);
    assert_failed_start_releases_fds(&config);
}
