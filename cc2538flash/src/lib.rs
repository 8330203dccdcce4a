//! # cc2538flash
//!
//! A library for programming TI CC2538 chips through the ROM serial
//! bootloader.
//!
//! This crate provides:
//!
//! - Packet encoding and frame assembly for the bootloader wire protocol
//! - A blocking [`Bootloader`] session (sync, ping, chip id, erase, CRC32,
//!   memory read, download, send data, status)
//! - Chunked flash programming with bounded FLASH_FAIL retries and CRC32
//!   verification
//! - The CC2538 flash memory map
//! - Bootloader entry through the DTR/RTS control lines
//!
//! ## Features
//!
//! - `native` (default): serial port support via the `serialport` crate
//! - `serde`: serialization support for data types
//!
//! ## Example
//!
//! ```rust,no_run
//! use cc2538flash::{Bootloader, SerialConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     #[cfg(feature = "native")]
//!     {
//!         let mut bootloader = Bootloader::open(&SerialConfig::new("/dev/ttyUSB0", 115200))?;
//!         bootloader.sync()?;
//!
//!         let info = bootloader.device_info()?;
//!         println!("chip {:#06x}, IEEE {}", info.chip_id, info.ieee_address());
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod device;
pub mod diagnostics;
pub mod error;
pub mod flasher;
pub mod port;
pub mod protocol;
pub mod session;
pub mod target;

// Re-exports for convenience
#[cfg(feature = "native")]
pub use {
    device::detect_ports,
    port::{NativePort, NativePortEnumerator},
};
pub use {
    device::BridgeKind,
    diagnostics::{DiagnosticSink, Diagnostics, LogDiagnostics, NoDiagnostics},
    error::{Error, Result},
    flasher::{CHUNK_SIZE, DEFAULT_MAX_CHUNK_RETRIES, FlashCommands, FlashOptions, FlashReport},
    port::{ControlLines, Port, PortEnumerator, PortInfo, SerialConfig, invoke_bootloader},
    protocol::{ACK_TIMEOUT, CommandCode, Frame, FrameKind, Packet, ReadWidth},
    session::{Bootloader, SessionConfig},
    target::{DeviceInfo, IeeeAddress},
};
