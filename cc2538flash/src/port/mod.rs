//! Port abstraction for the bootloader transport.
//!
//! The session writes through the [`Port`] it owns and hands an independent
//! read handle to its frame reader thread:
//!
//! ```text
//! +------------------+   write    +------------------+
//! |    Bootloader    | ---------> |       Port       |
//! +------------------+            +------------------+
//!          ^                               |
//!          | frames                        | try_clone_reader()
//! +------------------+   bytes    +------------------+
//! |   FrameReader    | <--------- |   read handle    |
//! +------------------+            +------------------+
//! ```
//!
//! The ROM bootloader UART always runs 8N1 without flow control, so only the
//! port name, baud rate and read timeout are configurable.

#[cfg(feature = "native")]
pub mod native;

use std::io::{Read, Write};
use std::thread;
use std::time::Duration;

use log::debug;

use crate::error::{Error, Result};

/// Read timeout of the native reader handle; bounds how long a stop request
/// waits for a blocked read.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Default bootloader baud rate. The ROM auto-detects the rate from the sync
/// preamble, so any standard rate up to 460800 works.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Serial port configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// Port name/path (e.g., "/dev/ttyUSB0", "COM3").
    pub port_name: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Read timeout.
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

impl SerialConfig {
    /// Create a new configuration with port name and baud rate.
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            ..Default::default()
        }
    }

    /// Set the read timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Serial port information.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PortInfo {
    /// Port name/path.
    pub name: String,
    /// USB vendor ID (if available).
    pub vid: Option<u16>,
    /// USB product ID (if available).
    pub pid: Option<u16>,
    /// Manufacturer string (if available).
    pub manufacturer: Option<String>,
    /// Product string (if available).
    pub product: Option<String>,
    /// Serial number (if available).
    pub serial_number: Option<String>,
}

/// Byte transport owned by a bootloader session.
pub trait Port: Read + Write + Send {
    /// Get the port name/path.
    fn name(&self) -> &str;

    /// Open an independent read handle for the frame reader thread.
    fn try_clone_reader(&self) -> Result<Box<dyn Read + Send>>;

    /// Discard bytes buffered in either direction.
    fn clear_buffers(&mut self) -> Result<()>;

    /// Drive the DTR line (`true` asserts it).
    fn set_dtr(&mut self, _level: bool) -> Result<()> {
        Err(Error::Unsupported(format!("{} has no DTR line", self.name())))
    }

    /// Drive the RTS line (`true` asserts it).
    fn set_rts(&mut self, _level: bool) -> Result<()> {
        Err(Error::Unsupported(format!("{} has no RTS line", self.name())))
    }

    /// Close the port and release resources.
    ///
    /// After calling this method, the port cannot be used for further I/O.
    fn close(&mut self) -> Result<()>;
}

/// Trait for listing available serial ports.
pub trait PortEnumerator {
    /// List all available serial ports.
    fn list_ports() -> Result<Vec<PortInfo>>;
}

/// How a board wires the USB bridge control lines to the chip.
///
/// Boards such as the OpenMote, RE-Mote and Firefly route one modem control
/// line to the bootloader backdoor pin and the other to `!RESET`, so the host
/// can start the ROM bootloader without pressing buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlLines {
    /// The backdoor pin selects the bootloader when high (default: low).
    pub active_high: bool,
    /// Backdoor on RTS and reset on DTR (default: backdoor on DTR, reset on RTS).
    pub inverted: bool,
}

/// One step of the bootloader entry sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineStep {
    Backdoor(bool),
    Reset(bool),
    Wait(Duration),
}

/// Time the backdoor pin stays asserted after reset is released.
const BACKDOOR_HOLD: Duration = Duration::from_millis(2);

/// Settling time for boards whose helper MCU replays the sequence.
const ENTRY_SETTLE: Duration = Duration::from_millis(100);

impl ControlLines {
    /// Line levels to apply, in order.
    ///
    /// Asserting a modem line drives the physical pin low, so an active-low
    /// backdoor is selected by asserting its line.
    fn entry_sequence(self) -> [LineStep; 7] {
        let select = !self.active_high;
        [
            LineStep::Backdoor(select),
            LineStep::Reset(false),
            LineStep::Reset(true),
            LineStep::Reset(false),
            LineStep::Wait(BACKDOOR_HOLD),
            LineStep::Backdoor(!select),
            LineStep::Wait(ENTRY_SETTLE),
        ]
    }
}

/// Reset the chip into its ROM bootloader using the modem control lines.
///
/// Fails with [`Error::Unsupported`] on ports without DTR/RTS.
pub fn invoke_bootloader<P: Port + ?Sized>(port: &mut P, lines: ControlLines) -> Result<()> {
    debug!("Invoking bootloader on {} with {lines:?}", port.name());

    for step in lines.entry_sequence() {
        match (step, lines.inverted) {
            (LineStep::Backdoor(level), false) | (LineStep::Reset(level), true) => port.set_dtr(level)?,
            (LineStep::Backdoor(level), true) | (LineStep::Reset(level), false) => port.set_rts(level)?,
            (LineStep::Wait(delay), _) => thread::sleep(delay),
        }
    }
    Ok(())
}

#[cfg(feature = "native")]
pub use native::{NativePort, NativePortEnumerator};
