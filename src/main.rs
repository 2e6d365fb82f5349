/*!
 * osrun - Process Runner
 *
 * Spawns one child from a JSON job file or from the command line:
 * - Foreground children are joined and their exit code is propagated
 * - Background children are detached and their pid is printed
 */

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use os_foundation::{init_tracing, IoOption, Process, ProcessSpec, SyntheticExitCodes};

#[derive(Parser, Debug)]
#[command(name = "osrun")]
#[command(about = "Run a child process with configurable standard stream wiring", long_about = None)]
struct Cli {
    /// JSON job file describing the process
    #[arg(short, long, conflicts_with = "command")]
    config: Option<PathBuf>,

    /// Detach the child from this process
    #[arg(short, long)]
    background: bool,

    /// Working directory for the child
    #[arg(long)]
    cwd: Option<PathBuf>,

    /// Environment entry for the child (replaces the inherited environment)
    #[arg(short, long = "env", value_name = "KEY=VALUE")]
    env: Vec<String>,

    /// Policy applied to all three standard streams
    #[arg(long, value_enum, default_value = "inherit")]
    stdio: StdioArg,

    /// Program and arguments
    #[arg(last = true)]
    command: Vec<String>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum StdioArg {
    /// Null device
    #[value(name = "none")]
    Null,
    Inherit,
}

impl From<StdioArg> for IoOption {
    fn from(arg: StdioArg) -> Self {
        match arg {
            StdioArg::Null => IoOption::None,
            StdioArg::Inherit => IoOption::Inherit,
        }
    }
}

impl Cli {
    fn into_spec(self) -> Result<ProcessSpec> {
        if let Some(path) = self.config {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading job file {}", path.display()))?;
            let spec: ProcessSpec = serde_json::from_str(&text)
                .with_context(|| format!("parsing job file {}", path.display()))?;
            check_job_streams(&spec)
                .with_context(|| format!("checking job file {}", path.display()))?;
            return Ok(spec);
        }

        if self.command.is_empty() {
            bail!("nothing to run: pass --config FILE or -- PROGRAM [ARGS...]");
        }

        let mut environment = std::collections::BTreeMap::new();
        for entry in &self.env {
            let (key, value) = entry
                .split_once('=')
                .with_context(|| format!("environment entry '{}' is not KEY=VALUE", entry))?;
            environment.insert(key.to_string(), value.to_string());
        }

        let option = IoOption::from(self.stdio);
        Ok(ProcessSpec {
            args: self.command,
            environment,
            working_directory: self.cwd,
            stdin: option,
            stdout: option,
            stderr: option,
            background: self.background,
            exit_codes: SyntheticExitCodes::default(),
        })
    }
}

/// osrun never reads or writes the child's streams, so a `create` pipe would
/// fill and stall the child, and a job file has no `redirect` endpoint to give
fn check_job_streams(spec: &ProcessSpec) -> Result<()> {
    for (name, option) in [
        ("stdin", spec.stdin),
        ("stdout", spec.stdout),
        ("stderr", spec.stderr),
    ] {
        if matches!(option, IoOption::Create | IoOption::Redirect) {
            bail!(
                "{} policy '{:?}' is not supported by osrun, use none or inherit",
                name,
                option
            );
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();

    let spec = Cli::parse().into_spec()?;
    let config = spec.to_config();

    let mut process = Process::new();
    process
        .start(&config)
        .with_context(|| format!("starting {}", config.program().unwrap_or_default()))?;

    if config.background {
        println!("{}", process.get_pid());
        return Ok(());
    }

    if !process.join() {
        match process.last_error() {
            Some(e) => bail!("waiting for child failed: {}", e),
            None => bail!("waiting for child failed"),
        }
    }

    let code = process.get_exit_code()?;
    info!(pid = process.get_pid(), exit_code = code, "Child finished");
    std::process::exit(code);
}
