/*!
 * Structured Tracing
 * Subscriber setup and spans for process operations using the tracing crate
 *
 * Features:
 * - JSON-formatted logs for structured parsing
 * - Span per spawn attempt with pid / result fields
 * - Slow spawn detection
 */

use std::time::{Duration, Instant};
use tracing::{debug, info, span, warn, Level};
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::core::types::NativePid;

/// Spawns slower than this are reported at warn level
const SLOW_SPAWN: Duration = Duration::from_millis(50);

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - OSRUN_TRACE_JSON: Enable JSON output (default: false)
///
/// Logs go to stderr so they never mix with a child's inherited stdout.
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("OSRUN_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .with_file(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .with_file(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()
    };

    if result.is_ok() {
        info!(json = use_json, "Structured tracing initialized");
    }
}

/// Span covering one `Process::start` attempt
pub struct SpawnSpan {
    span: tracing::Span,
    start: Instant,
    program: String,
}

impl SpawnSpan {
    pub fn new(program: &str, argc: usize, background: bool) -> Self {
        let span = span!(
            Level::DEBUG,
            "spawn",
            program = program,
            argc = argc,
            background = background,
            pid = tracing::field::Empty,
            result = tracing::field::Empty,
            error = tracing::field::Empty,
            duration_us = tracing::field::Empty,
        );

        Self {
            span,
            start: Instant::now(),
            program: program.to_string(),
        }
    }

    /// Enter the span context
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }

    pub fn record_pid(&self, pid: NativePid) {
        self.span.record("pid", pid);
        self.span.record("result", "success");
    }

    pub fn record_error(&self, error: &str) {
        self.span.record("error", error);
        self.span.record("result", "error");
    }
}

impl Drop for SpawnSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        self.span.record("duration_us", duration.as_micros() as u64);
        let _entered = self.span.enter();

        if duration > SLOW_SPAWN {
            warn!(
                program = %self.program,
                duration_ms = duration.as_millis() as u64,
                slow = true,
                "slow spawn detected"
            );
        } else {
            debug!(
                program = %self.program,
                duration_us = duration.as_micros() as u64,
                "spawn finished"
            );
        }
    }
}

/// Create a span for a spawn attempt
pub fn span_spawn(program: &str, argc: usize, background: bool) -> SpawnSpan {
    SpawnSpan::new(program, argc, background)
}
