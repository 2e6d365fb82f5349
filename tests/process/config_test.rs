/*!
 * Configuration Tests
 * Job file parsing and validation performed by start()
 */

use os_foundation::{
    IoOption, Process, ProcessConfig, ProcessError, ProcessSpec, SyntheticExitCodes, INVALID_PID,
};
use pretty_assertions::assert_eq;

fn start_error(config: &ProcessConfig<'_>) -> ProcessError {
    let mut process = Process::new();
    let err = process.start(config).unwrap_err();
    assert_eq!(process.get_pid(), INVALID_PID);
    err
}

#[test]
fn test_minimal_job_file_uses_defaults() {
    let spec: ProcessSpec = serde_json::from_str(r#"{ "args": ["echo", "hi"] }"#).unwrap();

    assert_eq!(spec.args, vec!["echo".to_string(), "hi".to_string()]);
    assert!(spec.environment.is_empty());
    assert_eq!(spec.working_directory, None);
    assert_eq!(spec.stdin, IoOption::Inherit);
    assert_eq!(spec.stdout, IoOption::Inherit);
    assert_eq!(spec.stderr, IoOption::Inherit);
    assert!(!spec.background);
    assert_eq!(spec.exit_codes, SyntheticExitCodes::default());
}

#[test]
fn test_full_job_file() {
    let spec: ProcessSpec = serde_json::from_str(
        r#"{
            "args": ["worker", "--once"],
            "environment": { "MODE": "batch" },
            "working_directory": "/srv/jobs",
            "stdin": "none",
            "stdout": "create",
            "stderr": "inherit",
            "background": true,
            "exit_codes": { "exited": 90, "killed": 91 }
        }"#,
    )
    .unwrap();

    let config = spec.to_config();
    assert_eq!(config.program(), Some("worker"));
    assert_eq!(config.environment.get("MODE").map(String::as_str), Some("batch"));
    assert_eq!(
        config.working_directory.as_deref(),
        Some(std::path::Path::new("/srv/jobs"))
    );
    assert_eq!(config.stdin_option, IoOption::None);
    assert_eq!(config.stdout_option, IoOption::Create);
    assert!(config.background);
    assert_eq!(config.exit_codes.killed, 91);
    assert!(config.stdin_redirect.is_none());
}

#[test]
fn test_unknown_policy_is_rejected() {
    let result: Result<ProcessSpec, _> =
        serde_json::from_str(r#"{ "args": ["x"], "stdout": "pipe" }"#);
    assert!(result.is_err());
}

#[test]
fn test_spec_serializes_round_trip() {
    let spec = ProcessSpec {
        args: vec!["a".into()],
        environment: Default::default(),
        working_directory: None,
        stdin: IoOption::Create,
        stdout: IoOption::None,
        stderr: IoOption::Inherit,
        background: false,
        exit_codes: SyntheticExitCodes::default(),
    };
    let json = serde_json::to_string(&spec).unwrap();
    assert!(!json.contains("environment"));
    let back: ProcessSpec = serde_json::from_str(&json).unwrap();
    assert_eq!(back, spec);
}

#[test]
fn test_redirect_from_job_file_has_no_endpoint() {
    let spec: ProcessSpec =
        serde_json::from_str(r#"{ "args": ["true"], "stdout": "redirect" }"#).unwrap();

    assert!(matches!(
        start_error(&spec.to_config()),
        ProcessError::InvalidArgument(_)
    ));
}

#[test]
fn test_empty_args_rejected() {
    let config = ProcessConfig::new(Vec::<String>::new());
    assert!(matches!(start_error(&config), ProcessError::InvalidArgument(_)));
}

#[test]
fn test_empty_program_rejected() {
    let config = ProcessConfig::new(["", "arg"]);
    assert!(matches!(start_error(&config), ProcessError::InvalidArgument(_)));
}

#[test]
fn test_nul_in_argument_rejected() {
    let config = ProcessConfig::new(["echo", "a\0b"]);
    assert!(matches!(start_error(&config), ProcessError::InvalidArgument(_)));
}

#[test]
fn test_bad_environment_rejected() {
    for (key, value) in [("", "v"), ("A=B", "v"), ("KEY", "v\0")] {
        let config = ProcessConfig::new(["true"]).with_env(key, value);
        assert!(
            matches!(start_error(&config), ProcessError::InvalidArgument(_)),
            "{:?}={:?}",
            key,
            value
        );
    }
}

#[test]
fn test_empty_working_directory_rejected() {
    let config = ProcessConfig::new(["true"]).with_working_dir("");
    assert!(matches!(start_error(&config), ProcessError::InvalidArgument(_)));
}

#[test]
fn test_errors_serialize_with_tag() {
    let json = serde_json::to_value(ProcessError::InvalidArgument("bad".into())).unwrap();
    assert_eq!(json["error_type"], "invalid_argument");
    assert_eq!(json["details"], "bad");

    let json = serde_json::to_value(ProcessError::AlreadyConfigured).unwrap();
    assert_eq!(json["error_type"], "already_configured");
}
