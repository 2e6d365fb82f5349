/*!
 * Monitoring
 * Structured logging for process operations
 */

mod tracer;

pub use tracer::{init_tracing, span_spawn, SpawnSpan};
