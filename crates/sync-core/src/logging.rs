//! Logging initialization, and the event-log sink used to forward
//! diagnostic output to a single configured log target.

use tracing_subscriber::{fmt, EnvFilter};

/// Maximum chunk length for a single event-log entry.
pub const EVENT_LOG_CHUNK_LIMIT: usize = 31_000;

/// Initialize human-readable logging driven by `RUST_LOG`, falling back to
/// `default_level`. Safe to call multiple times — later calls are no-ops.
pub fn init_logging(service_name: &str, default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .try_init()
        .ok();

    tracing::info!(service = service_name, "logging initialised");
}

/// Severity stream for [`EventLog`] entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Warning,
    Error,
}

/// A single log sink the engine writes to. Implementations MUST chunk any
/// entry longer than [`EVENT_LOG_CHUNK_LIMIT`] characters; `chunked` below
/// does that splitting so implementors only deal with already-short slices.
pub trait EventLog: Send + Sync {
    /// Receives one chunk, already within the length limit.
    fn write_chunk(&self, level: LogLevel, chunk: &str);
}

/// Split `message` into chunks no longer than [`EVENT_LOG_CHUNK_LIMIT`]
/// characters, preserving order, and feed each to `sink`. Concatenating the
/// chunks byte-for-byte reproduces `message`.
pub fn emit(sink: &dyn EventLog, level: LogLevel, message: &str) {
    let chars: Vec<char> = message.chars().collect();
    if chars.is_empty() {
        sink.write_chunk(level, "");
        return;
    }
    for piece in chars.chunks(EVENT_LOG_CHUNK_LIMIT) {
        let chunk: String = piece.iter().collect();
        sink.write_chunk(level, &chunk);
    }
}

/// Default [`EventLog`] that forwards to `tracing`. A host wanting its own
/// sink can supply a different `EventLog` implementation instead.
pub struct TracingEventLog;

impl EventLog for TracingEventLog {
    fn write_chunk(&self, level: LogLevel, chunk: &str) {
        match level {
            LogLevel::Trace => tracing::trace!("{chunk}"),
            LogLevel::Warning => tracing::warn!("{chunk}"),
            LogLevel::Error => tracing::error!("{chunk}"),
        }
    }
}
