/*!
 * Standard Stream Wiring Tests
 * Create pipes, null device, and caller-supplied redirect endpoints
 */

#![cfg(unix)]

use os_foundation::{
    IoOption, Process, ProcessConfig, ProcessError, Stream, INVALID_PID,
};
use pretty_assertions::assert_eq;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};

/// Drain a pipe endpoint until the child closes its end
fn read_all(mut stream: Stream) -> String {
    stream.set_nonblocking(false).unwrap();
    let mut text = String::new();
    stream.read_to_string(&mut text).unwrap();
    text
}

fn shell(script: &str) -> ProcessConfig<'static> {
    ProcessConfig::new(["/bin/sh", "-c"]).with_arg(script)
}

#[test]
fn test_stdin_round_trips_through_cat() {
    let config = ProcessConfig::new(["cat"]).with_stdio(IoOption::Create);

    let mut process = Process::new();
    process.start(&config).unwrap();

    let payload = b"bytes written equal bytes read\n\x01\x02\xff";
    {
        let mut stdin = process.take_stdin().unwrap();
        assert!(stdin.is_writable());
        assert!(!stdin.is_readable());
        stdin.set_nonblocking(false).unwrap();
        stdin.write_all(payload).unwrap();
        stdin.close().unwrap();
    }

    let mut stdout = process.take_stdout().unwrap();
    stdout.set_nonblocking(false).unwrap();
    let mut echoed = Vec::new();
    stdout.read_to_end(&mut echoed).unwrap();

    let stderr = process.take_stderr().unwrap();
    assert_eq!(read_all(stderr), "");

    assert!(process.join());
    assert_eq!(process.get_exit_code(), Ok(0));
    assert_eq!(echoed, payload.to_vec());
}

#[test]
fn test_stderr_pipe_is_separate() {
    let config = shell("printf out; printf err >&2")
        .with_stdout(IoOption::Create)
        .with_stderr(IoOption::Create);

    let mut process = Process::new();
    process.start(&config).unwrap();

    assert!(process.stdin().is_none());
    let stdout = process.take_stdout().unwrap();
    let stderr = process.take_stderr().unwrap();

    assert_eq!(read_all(stdout), "out");
    assert_eq!(read_all(stderr), "err");
    assert!(process.join());
}

#[test]
fn test_pipe_endpoints_start_nonblocking() {
    let config = ProcessConfig::new(["sleep", "30"]).with_stdout(IoOption::Create);

    let mut process = Process::new();
    process.start(&config).unwrap();

    let mut buf = [0u8; 16];
    let err = process.stdout().unwrap().read(&mut buf).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::WouldBlock);

    assert!(process.kill(true));
}

#[test]
fn test_inherit_and_redirect_bind_no_endpoint() {
    let file = tempfile::tempfile().unwrap();
    let sink = Stream::writer(file);
    let config = ProcessConfig::new(["true"]).redirect_stdout(&sink);

    let mut process = Process::new();
    process.start(&config).unwrap();

    assert!(process.stdin().is_none());
    assert!(process.stdout().is_none());
    assert!(process.stderr().is_none());
    assert!(process.join());
}

#[test]
fn test_none_policy_reads_eof_and_discards_output() {
    let config = ProcessConfig::new(["cat"]).with_stdio(IoOption::None);

    let mut process = Process::new();
    process.start(&config).unwrap();

    assert!(process.take_stdout().is_none());
    assert!(process.join());
    assert_eq!(process.get_exit_code(), Ok(0));
}

#[test]
fn test_redirect_stdout_to_file() {
    let temp = tempfile::NamedTempFile::new().unwrap();
    let file = OpenOptions::new().write(true).open(temp.path()).unwrap();
    let sink = Stream::writer(file);

    let config = shell("printf redirected").redirect_stdout(&sink);
    let mut process = Process::new();
    process.start(&config).unwrap();
    assert!(process.join());

    // Borrowed for start() only
    assert!(sink.is_open());

    let mut text = String::new();
    File::open(temp.path())
        .unwrap()
        .read_to_string(&mut text)
        .unwrap();
    assert_eq!(text, "redirected");
}

#[test]
fn test_redirect_stdin_from_file() {
    let mut temp = tempfile::NamedTempFile::new().unwrap();
    temp.write_all(b"from file").unwrap();
    temp.flush().unwrap();

    let source = Stream::reader(File::open(temp.path()).unwrap());
    let config = ProcessConfig::new(["cat"])
        .redirect_stdin(&source)
        .with_stdout(IoOption::Create);

    let mut process = Process::new();
    process.start(&config).unwrap();

    let stdout = process.take_stdout().unwrap();
    assert_eq!(read_all(stdout), "from file");
    assert!(process.join());
}

#[test]
fn test_redirect_to_closed_endpoint_fails() {
    let mut sink = Stream::writer(tempfile::tempfile().unwrap());
    sink.close().unwrap();

    let config = ProcessConfig::new(["sleep", "30"]).redirect_stdout(&sink);
    let mut process = Process::new();

    assert!(matches!(
        process.start(&config),
        Err(ProcessError::InvalidArgument(_))
    ));
    assert_eq!(process.get_pid(), INVALID_PID);
    assert!(!process.is_valid());
}

#[test]
fn test_redirect_wrong_direction_fails() {
    let source = Stream::reader(tempfile::tempfile().unwrap());

    let config = ProcessConfig::new(["sleep", "30"]).redirect_stdout(&source);
    let mut process = Process::new();

    assert!(matches!(
        process.start(&config),
        Err(ProcessError::InvalidArgument(_))
    ));
    assert_eq!(process.get_pid(), INVALID_PID);
}

#[test]
fn test_redirect_policy_without_endpoint_fails() {
    let config = ProcessConfig::new(["true"]).with_stderr(IoOption::Redirect);
    let mut process = Process::new();

    assert!(matches!(
        process.start(&config),
        Err(ProcessError::InvalidArgument(_))
    ));
    assert_eq!(process.get_pid(), INVALID_PID);
}

#[cfg(target_os = "linux")]
#[test]
fn test_unrelated_descriptors_do_not_leak() {
    use std::os::fd::{FromRawFd, OwnedFd};

    // Deliberately without O_CLOEXEC
    let mut fds = [0; 2];
    assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
    let (read, write) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };

    let config = shell(r#"test ! -e "/proc/self/fd/$1" && test ! -e "/proc/self/fd/$2""#)
        .with_arg("sh")
        .with_arg(fds[0].to_string())
        .with_arg(fds[1].to_string());

    let mut process = Process::new();
    process.start(&config).unwrap();
    assert!(process.join());
    assert_eq!(process.get_exit_code(), Ok(0));

    drop((read, write));
}
