//! Error types for cc2538flash.

use crate::protocol::frame::Frame;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type for cc2538flash operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for cc2538flash operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (opening ports, reading files).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// No frame arrived within the acknowledge window.
    #[error("Timed out after {}ms waiting for the bootloader", .0.as_millis())]
    Timeout(Duration),

    /// The device rejected the last command.
    #[error("Bootloader replied NAK")]
    Nak,

    /// A frame arrived that does not fit the current exchange.
    #[error("Unexpected frame: {:02X?}", .0.as_bytes())]
    UnexpectedFrame(Frame),

    /// Writing to the transport failed.
    #[error("Transport write failed: {0}")]
    TransportWrite(#[source] io::Error),

    /// Data frame checksum does not match its payload.
    #[error("Checksum mismatch: frame says {expected:#04x}, payload sums to {actual:#04x}")]
    InvalidChecksum {
        /// Checksum byte carried by the frame.
        expected: u8,
        /// Checksum computed over the received payload.
        actual: u8,
    },

    /// Packet payload does not fit the single-byte length field.
    #[error("Payload of {len} bytes exceeds the {max}-byte limit")]
    PayloadTooLarge {
        /// Requested payload length.
        len: usize,
        /// Largest accepted payload length.
        max: usize,
    },

    /// GET_STATUS returned a byte that is not a known command code.
    #[error("Unknown status code {0:#04x}")]
    UnknownStatus(u8),

    /// A chunk kept reporting FLASH_FAIL until the retry bound ran out.
    #[error("Flash write failed at offset {offset:#x} from 0x{address:08X} after {attempts} attempts")]
    ChunkFlashFailure {
        /// Start address of the flash operation.
        address: u32,
        /// Byte offset of the failing chunk.
        offset: usize,
        /// Number of times the chunk was sent.
        attempts: u32,
    },

    /// A chunk reported a status other than SUCCESS or FLASH_FAIL.
    #[error("Flashing aborted with status {status:#04x} at offset {offset:#x} from 0x{address:08X}")]
    FlashAborted {
        /// Raw status byte returned by the device.
        status: u8,
        /// Start address of the flash operation.
        address: u32,
        /// Byte offset of the failing chunk.
        offset: usize,
    },

    /// Device CRC32 of a written region differs from the local image.
    #[error("Verification failed at 0x{address:08X}: expected CRC32 {expected:#010x}, device reports {actual:#010x}")]
    VerifyFailed {
        /// Start address of the verified region.
        address: u32,
        /// CRC32 of the local image.
        expected: u32,
        /// CRC32 reported by the device.
        actual: u32,
    },

    /// The frame reader stopped; no further frames will arrive.
    #[error("Frame reader disconnected")]
    Disconnected,

    /// The operation was interrupted by the caller.
    #[error("Operation interrupted")]
    Interrupted,

    /// Invalid argument passed to an operation.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Unsupported operation on this platform.
    #[error("Unsupported: {0}")]
    Unsupported(String),
}
