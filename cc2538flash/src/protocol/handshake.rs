//! Bounded waits on the frame stream.

use crate::diagnostics::DiagnosticSink;
use crate::error::{Error, Result};
use crate::protocol::frame::{Frame, FrameKind};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

/// How long the device gets to answer any command.
pub const ACK_TIMEOUT: Duration = Duration::from_secs(3);

/// Wait up to `timeout` for the next frame.
pub fn next_frame(frames: &Receiver<Frame>, timeout: Duration) -> Result<Frame> {
    frames
        .recv_timeout(timeout)
        .map_err(|e| match e {
            RecvTimeoutError::Timeout => Error::Timeout(timeout),
            RecvTimeoutError::Disconnected => Error::Disconnected,
        })
}

/// Wait up to `timeout` for an ACK frame.
///
/// A NAK yields [`Error::Nak`]; any other frame yields
/// [`Error::UnexpectedFrame`]. Nothing is re-sent on timeout.
pub fn await_ack(
    frames: &Receiver<Frame>,
    timeout: Duration,
    diagnostics: &DiagnosticSink,
) -> Result<()> {
    let frame = next_frame(frames, timeout)?;
    match frame.classify() {
        Ok(FrameKind::Ack) => {
            diagnostics.trace(format_args!("got ACK [0xcc]"));
            Ok(())
        },
        Ok(FrameKind::Nak) => {
            diagnostics.trace(format_args!("got NAK [0x33]"));
            Err(Error::Nak)
        },
        Ok(FrameKind::Data(_)) => Err(Error::UnexpectedFrame(frame)),
        Err(e) => Err(e),
    }
}
