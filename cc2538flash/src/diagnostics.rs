//! Wire-level trace sink.
//!
//! Sessions and frame readers receive a [`Diagnostics`] handle at construction
//! and report every serialized packet, assembled frame and host acknowledge
//! through it. The default sink discards everything.

use std::fmt;
use std::sync::Arc;

/// Receiver of line-oriented trace messages.
pub trait Diagnostics: Send + Sync {
    /// Record one trace line.
    fn trace(&self, message: &str);
}

/// Sink that drops every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDiagnostics;

impl Diagnostics for NoDiagnostics {
    fn trace(&self, _message: &str) {}
}

/// Sink forwarding to the `log` facade at trace level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn trace(&self, message: &str) {
        log::trace!(target: "cc2538flash::wire", "{message}");
    }
}

impl<F> Diagnostics for F
where
    F: Fn(&str) + Send + Sync,
{
    fn trace(&self, message: &str) {
        self(message);
    }
}

/// Shared diagnostics handle.
#[derive(Clone)]
pub struct DiagnosticSink(Arc<dyn Diagnostics>);

impl DiagnosticSink {
    /// Wrap a sink.
    pub fn new<D: Diagnostics + 'static>(sink: D) -> Self {
        Self(Arc::new(sink))
    }

    /// Record one trace line, formatting only when called.
    pub fn trace(&self, args: fmt::Arguments<'_>) {
        self.0.trace(&args.to_string());
    }
}

impl Default for DiagnosticSink {
    fn default() -> Self {
        Self::new(NoDiagnostics)
    }
}

impl fmt::Debug for DiagnosticSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DiagnosticSink")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_default_sink_is_silent() {
        let sink = DiagnosticSink::default();
        sink.trace(format_args!("packet serialize: {:02X?}", [0x03, 0x20, 0x20]));
    }

    #[test]
    fn test_closure_sink_receives_lines() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&lines);
        let sink = DiagnosticSink::new(move |line: &str| {
            captured.lock().unwrap().push(line.to_string());
        });

        sink.trace(format_args!("got ACK [{:#04x}]", 0xCC));

        assert_eq!(lines.lock().unwrap().as_slice(), ["got ACK [0xcc]"]);
    }
}
