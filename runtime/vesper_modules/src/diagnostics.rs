//! Diagnostic sink for warnings and deprecation messages.
//!
//! Warnings can be directed to different destinations:
//! - Stderr: process standard error (default)
//! - Buffer: captured for assertions in tests and embedders
//! - Silent: discarded
//!
//! Uses enum dispatch instead of trait objects for static dispatch on this
//! path.

use parking_lot::Mutex;
use std::sync::Arc;

/// Sink that writes to standard error.
#[derive(Default)]
pub struct StderrSink;

impl StderrSink {
    /// Write text verbatim.
    pub fn emit(&self, text: &str) {
        eprint!("{text}");
    }
}

/// Sink that captures output to a buffer.
pub struct BufferSink {
    buffer: Mutex<String>,
}

impl BufferSink {
    pub fn new() -> Self {
        BufferSink {
            buffer: Mutex::new(String::new()),
        }
    }

    /// Write text verbatim.
    pub fn emit(&self, text: &str) {
        self.buffer.lock().push_str(text);
    }

    /// Get all captured output.
    pub fn output(&self) -> String {
        self.buffer.lock().clone()
    }

    /// Clear captured output.
    pub fn clear(&self) {
        self.buffer.lock().clear();
    }
}

impl Default for BufferSink {
    fn default() -> Self {
        Self::new()
    }
}

/// Diagnostic sink with enum dispatch.
pub enum DiagnosticSink {
    /// Writes to stderr (default).
    Stderr(StderrSink),
    /// Captures to buffer (tests/embedders).
    Buffer(BufferSink),
    /// Discards all output.
    Silent,
}

impl DiagnosticSink {
    /// Write text verbatim. Each warning is emitted as one complete string,
    /// so concurrent writers interleave at message granularity.
    pub fn emit(&self, text: &str) {
        match self {
            Self::Stderr(s) => s.emit(text),
            Self::Buffer(s) => s.emit(text),
            Self::Silent => {}
        }
    }

    /// Emit a standard warning line.
    pub fn warning(&self, msg: &str) {
        self.emit(&format!("WARNING: {msg}\n"));
    }

    /// Get captured output; empty for sinks that don't capture.
    pub fn output(&self) -> String {
        match self {
            Self::Buffer(s) => s.output(),
            Self::Stderr(_) | Self::Silent => String::new(),
        }
    }

    /// Number of warnings captured so far; 0 for sinks that don't capture.
    pub fn warning_count(&self) -> usize {
        self.output().matches("WARNING:").count()
    }

    /// Clear captured output.
    pub fn clear(&self) {
        if let Self::Buffer(s) = self {
            s.clear();
        }
    }
}

/// Shared diagnostic sink handle.
pub type SharedSink = Arc<DiagnosticSink>;

/// Create the default stderr sink.
pub fn stderr_sink() -> SharedSink {
    Arc::new(DiagnosticSink::Stderr(StderrSink))
}

/// Create a capturing sink for tests and embedders.
pub fn buffer_sink() -> SharedSink {
    Arc::new(DiagnosticSink::Buffer(BufferSink::new()))
}

/// Create a sink that discards everything.
pub fn silent_sink() -> SharedSink {
    Arc::new(DiagnosticSink::Silent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_sink_captures_warnings() {
        let sink = buffer_sink();
        sink.warning("both A and B export \"x\"");
        assert_eq!(sink.output(), "WARNING: both A and B export \"x\"\n");
        assert_eq!(sink.warning_count(), 1);
    }

    #[test]
    fn buffer_sink_clear_empties_buffer() {
        let sink = buffer_sink();
        sink.warning("anything");
        sink.clear();
        assert!(sink.output().is_empty());
        assert_eq!(sink.warning_count(), 0);
    }

    #[test]
    fn silent_sink_discards() {
        let sink = silent_sink();
        sink.warning("dropped");
        assert!(sink.output().is_empty());
    }

    #[test]
    fn buffer_sink_is_thread_safe() {
        use std::thread;

        let sink = buffer_sink();
        let sink2 = Arc::clone(&sink);

        let t = thread::spawn(move || {
            for _ in 0..100 {
                sink2.warning("a");
            }
        });
        for _ in 0..100 {
            sink.warning("b");
        }
        t.join().ok();

        assert_eq!(sink.warning_count(), 200);
    }
}
