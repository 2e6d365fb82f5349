/*!
 * Current Process Tests
 * Environment access and standard stream duplicates of the test process
 */

use os_foundation::current::{
    clear_environment_variable, get_environment, get_environment_variable, get_pid, get_stderr,
    set_environment_variable,
};
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::io::Write;

#[test]
#[serial]
fn test_set_get_clear_cycle() {
    let name = "OSRUN_ENVIRONMENT_TEST";

    assert!(set_environment_variable(name, "V"));
    assert_eq!(get_environment_variable(name), Some("V".to_string()));

    assert!(clear_environment_variable(name));
    assert_eq!(get_environment_variable(name), None);

    // Repeating the cycle yields the same observations
    assert!(set_environment_variable(name, "V"));
    assert_eq!(get_environment_variable(name), Some("V".to_string()));
    assert!(clear_environment_variable(name));
    assert_eq!(get_environment_variable(name), None);
}

#[test]
#[serial]
fn test_overwrite_and_empty_value() {
    let name = "OSRUN_ENVIRONMENT_OVERWRITE";

    assert!(set_environment_variable(name, "first"));
    assert!(set_environment_variable(name, "second"));
    assert_eq!(get_environment_variable(name).as_deref(), Some("second"));

    assert!(set_environment_variable(name, ""));
    assert_eq!(get_environment_variable(name).as_deref(), Some(""));

    assert!(clear_environment_variable(name));
}

#[test]
#[serial]
fn test_snapshot_reflects_live_changes() {
    let name = "OSRUN_ENVIRONMENT_SNAPSHOT";

    assert!(set_environment_variable(name, "present"));
    assert_eq!(
        get_environment().get(name).map(String::as_str),
        Some("present")
    );

    assert!(clear_environment_variable(name));
    assert!(!get_environment().contains_key(name));
}

#[test]
fn test_invalid_names_are_refused() {
    for name in ["", "HAS=EQUALS", "HAS\0NUL"] {
        assert!(!set_environment_variable(name, "x"), "{:?}", name);
        assert!(!clear_environment_variable(name), "{:?}", name);
        assert_eq!(get_environment_variable(name), None);
    }
}

#[test]
fn test_pid_is_this_process() {
    assert_eq!(get_pid() as u64, std::process::id() as u64);
}

#[test]
fn test_stderr_duplicate_is_writable() {
    let mut stderr = get_stderr().unwrap();
    assert!(stderr.is_writable());
    stderr.write_all(b"").unwrap();
    stderr.flush().unwrap();
}

#[cfg(unix)]
#[test]
#[serial]
fn test_child_sees_variable_set_here() {
    use os_foundation::{Process, ProcessConfig};

    let name = "OSRUN_ENVIRONMENT_CHILD";
    assert!(set_environment_variable(name, "propagated"));

    let config = ProcessConfig::new([
        "/bin/sh",
        "-c",
        r#"test "$OSRUN_ENVIRONMENT_CHILD" = propagated"#,
    ]);
    let mut process = Process::new();
    process.start(&config).unwrap();
    assert!(process.join());
    assert_eq!(process.get_exit_code(), Ok(0));

    assert!(clear_environment_variable(name));
}
