//! Byte stream to frame assembly.
//!
//! [`FrameAssembler`] is the pure state machine; [`FrameReader`] runs it on a
//! background thread over a transport read handle and forwards completed
//! frames over a channel.
//!
//! The first byte of every frame is its length, including the length byte
//! itself. ACK/NAK frames report a length of zero yet still carry one marker
//! byte, so a zero length byte is followed by exactly one more byte.
//!
//! There is no resynchronisation: a corrupted length byte desynchronises the
//! stream until the transport is reopened.

use crate::diagnostics::DiagnosticSink;
use crate::protocol::frame::Frame;
use log::{debug, trace};
use std::io::{ErrorKind, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitingLengthByte,
    CollectingBody { remaining: usize },
}

/// Groups raw bytes into length-delimited frames.
#[derive(Debug)]
pub struct FrameAssembler {
    state: State,
    frame: Vec<u8>,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAssembler {
    /// Create an assembler waiting for a length byte.
    pub fn new() -> Self {
        Self {
            state: State::AwaitingLengthByte,
            frame: Vec::new(),
        }
    }

    /// Whether no frame is partially collected.
    pub fn is_idle(&self) -> bool {
        self.state == State::AwaitingLengthByte
    }

    /// Feed one byte; returns a frame once its declared length is collected.
    pub fn push(&mut self, byte: u8) -> Option<Frame> {
        self.frame.push(byte);

        let remaining = match self.state {
            State::AwaitingLengthByte if byte == 0 => 1,
            State::AwaitingLengthByte => usize::from(byte) - 1,
            State::CollectingBody { remaining } => remaining - 1,
        };

        if remaining == 0 {
            self.state = State::AwaitingLengthByte;
            Some(Frame::new(std::mem::take(&mut self.frame)))
        } else {
            self.state = State::CollectingBody { remaining };
            None
        }
    }

    /// Feed a slice of bytes, collecting every completed frame.
    pub fn extend(&mut self, bytes: &[u8]) -> Vec<Frame> {
        bytes
            .iter()
            .filter_map(|b| self.push(*b))
            .collect()
    }
}

/// Background thread turning a transport read handle into frames.
///
/// The stop flag is checked before every read. A read that is already
/// blocked is not interrupted; transports should use a short read timeout
/// so the flag is observed promptly.
pub struct FrameReader {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FrameReader {
    /// Spawn the reader thread and return it with the receiving end of the
    /// frame channel.
    pub fn spawn<R>(reader: R, diagnostics: DiagnosticSink) -> (Self, Receiver<Frame>)
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_reader = Arc::clone(&stop);

        let handle = thread::spawn(move || {
            scan_port(reader, &tx, &stop_reader, &diagnostics);
        });

        (
            Self {
                stop,
                handle: Some(handle),
            },
            rx,
        )
    }

    /// Ask the reader thread to stop after its current read.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Stop the reader and wait for the thread to exit.
    ///
    /// Blocks for as long as the current transport read takes.
    pub fn join(mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for FrameReader {
    fn drop(&mut self) {
        // Detach instead of joining: the thread may be parked in a blocking read.
        self.stop();
    }
}

fn scan_port<R: Read>(
    mut reader: R,
    frames: &Sender<Frame>,
    stop: &AtomicBool,
    diagnostics: &DiagnosticSink,
) {
    debug!("Frame reader started");

    let mut assembler = FrameAssembler::new();
    let mut buf = [0u8; 1];

    while !stop.load(Ordering::Relaxed) {
        match reader.read(&mut buf) {
            Ok(0) => {},
            Ok(_) => {
                if let Some(frame) = assembler.push(buf[0]) {
                    diagnostics.trace(format_args!("frame: {:02X?}", frame.as_bytes()));
                    if frames.send(frame).is_err() {
                        debug!("Frame consumer dropped, stopping reader");
                        break;
                    }
                }
            },
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) => {},
            Err(e) => {
                trace!("Read error: {e}");
                break;
            },
        }
    }

    debug!("Frame reader stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::frame::FrameKind;
    use crate::protocol::packet::Packet;
    use std::collections::VecDeque;
    use std::time::Duration;

    #[test]
    fn test_ack_frame() {
        let mut assembler = FrameAssembler::new();
        assert!(assembler.push(0x00).is_none());
        assert!(!assembler.is_idle());

        let frame = assembler.push(0xCC).unwrap();
        assert_eq!(frame.as_bytes(), &[0x00, 0xCC]);
        assert_eq!(frame.classify().unwrap(), FrameKind::Ack);
        assert!(assembler.is_idle());
    }

    #[test]
    fn test_data_frame_uses_declared_length() {
        let mut assembler = FrameAssembler::new();
        let frames = assembler.extend(&[0x06, 0x1D, 0x00, 0x00, 0xB9, 0x64]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 6);
        assert_eq!(frames[0].data_payload().unwrap(), &[0x00, 0x00, 0xB9, 0x64]);
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut assembler = FrameAssembler::new();
        let frames = assembler.extend(&[0x00, 0xCC, 0x03, 0x40, 0x40, 0x00, 0x33]);
        let bytes: Vec<&[u8]> = frames.iter().map(Frame::as_bytes).collect();
        assert_eq!(bytes, vec![&[0x00, 0xCC][..], &[0x03, 0x40, 0x40][..], &[0x00, 0x33][..]]);
    }

    #[test]
    fn test_partial_frame_not_emitted() {
        let mut assembler = FrameAssembler::new();
        assert!(assembler.extend(&[0x05, 0x01, 0x02]).is_empty());
        assert!(!assembler.is_idle());
        let frames = assembler.extend(&[0x03, 0x04]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_bytes(), &[0x05, 0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_length_one_frame() {
        let mut assembler = FrameAssembler::new();
        let frame = assembler.push(0x01).unwrap();
        assert_eq!(frame.as_bytes(), &[0x01]);
        assert!(assembler.is_idle());
    }

    #[test]
    fn test_serialized_packet_reassembles() {
        let packet = Packet::erase(0x0020_0000, 0x800);
        let bytes = packet.serialize();
        let frames = FrameAssembler::new().extend(&bytes);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_bytes(), bytes.as_slice());
    }

    /// Read handle that hands out scripted chunks, then reports timeouts.
    struct ScriptedReader {
        chunks: VecDeque<Vec<u8>>,
    }

    impl Read for ScriptedReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.chunks.pop_front() {
                Some(chunk) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    if n < chunk.len() {
                        self.chunks.push_front(chunk[n..].to_vec());
                    }
                    Ok(n)
                },
                None => {
                    thread::sleep(Duration::from_millis(5));
                    Err(std::io::Error::new(ErrorKind::TimedOut, "no data"))
                },
            }
        }
    }

    #[test]
    fn test_reader_skips_empty_reads() {
        let reader = ScriptedReader {
            chunks: VecDeque::from(vec![vec![0x00], vec![], vec![0xCC], vec![], vec![0x00, 0x33]]),
        };
        let (reader, frames) = FrameReader::spawn(reader, DiagnosticSink::default());

        let first = frames.recv_timeout(Duration::from_secs(1)).unwrap();
        let second = frames.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(first.as_bytes(), &[0x00, 0xCC]);
        assert_eq!(second.as_bytes(), &[0x00, 0x33]);

        reader.join();
    }

    #[test]
    fn test_reader_stops_on_eof_error() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(ErrorKind::BrokenPipe, "closed"))
            }
        }

        let (reader, frames) = FrameReader::spawn(Broken, DiagnosticSink::default());
        assert!(matches!(
            frames.recv_timeout(Duration::from_secs(1)),
            Err(mpsc::RecvTimeoutError::Disconnected)
        ));
        reader.join();
    }
}
