//! Child log sink port for captured stdout/stderr.

use std::fmt;

/// Which output stream a captured line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildStream {
    Stdout,
    Stderr,
}

impl fmt::Display for ChildStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
        }
    }
}

/// Port for appending child output lines to a sink.
///
/// Implementations should be thread-safe and non-blocking where possible.
pub trait ChildLogSink: Send + Sync {
    /// Append one line (without trailing newline).
    fn append(&self, stream: ChildStream, line: String);
}

/// A no-op log sink that discards all log lines.
///
/// Lines are still emitted through `tracing` by the reader tasks.
#[derive(Debug, Clone, Default)]
pub struct NoopLogSink;

impl ChildLogSink for NoopLogSink {
    fn append(&self, _stream: ChildStream, _line: String) {
        // Intentionally empty - logs are already going to tracing
    }
}
