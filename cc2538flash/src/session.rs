//! Bootloader session.
//!
//! A [`Bootloader`] owns the transport for writing and consumes the frames
//! produced by a [`FrameReader`] over a cloned read handle. Every command is
//! one request followed by an ACK within the acknowledge window. Commands
//! with a data reply also read one data frame, which the host must
//! acknowledge with a single `0xCC` byte before the device continues.
//!
//! ## Example
//!
//! ```rust,no_run
//! use cc2538flash::{Bootloader, FlashOptions, SerialConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut bootloader = Bootloader::open(&SerialConfig::new("/dev/ttyUSB0", 115200))?;
//!     bootloader.sync()?;
//!     println!("chip id: {:#06x}", bootloader.chip_id()?);
//!
//!     let image = std::fs::read("firmware.bin")?;
//!     bootloader.write_flash(0x0020_0000, &image, &FlashOptions::default(), true, true, |done, total| {
//!         println!("{done}/{total}");
//!     })?;
//!     Ok(())
//! }
//! ```

use crate::diagnostics::DiagnosticSink;
use crate::error::{Error, Result};
use crate::flasher::{self, FlashCommands, FlashOptions, FlashReport};
use crate::port::{self, ControlLines, Port};
use crate::protocol::assembler::FrameReader;
use crate::protocol::frame::{self, ACK, Frame};
use crate::protocol::handshake::{ACK_TIMEOUT, await_ack, next_frame};
use crate::protocol::packet::{CommandCode, Packet, ReadWidth, SYNC_BYTES};
use crate::target::{self, DeviceInfo, IEEE_ADDR_LEN};
use log::{debug, info, trace};
use std::io::Write;
use std::sync::mpsc::Receiver;
use std::time::Duration;

/// Session settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long to wait for each ACK or data frame.
    pub ack_timeout: Duration,
    /// Receiver of wire-level trace lines.
    pub diagnostics: DiagnosticSink,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ack_timeout: ACK_TIMEOUT,
            diagnostics: DiagnosticSink::default(),
        }
    }
}

impl SessionConfig {
    /// Set the acknowledge window.
    #[must_use]
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Set the diagnostics sink.
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: DiagnosticSink) -> Self {
        self.diagnostics = diagnostics;
        self
    }
}

/// Connection to the CC2538 ROM bootloader.
///
/// Generic over the port type `P`; the session is the only writer.
pub struct Bootloader<P: Port> {
    port: P,
    frames: Receiver<Frame>,
    reader: Option<FrameReader>,
    ack_timeout: Duration,
    diagnostics: DiagnosticSink,
}

impl<P: Port> Bootloader<P> {
    /// Start a session with default settings.
    pub fn new(port: P) -> Result<Self> {
        Self::with_config(port, SessionConfig::default())
    }

    /// Start a session, spawning the frame reader on a cloned read handle.
    pub fn with_config(port: P, config: SessionConfig) -> Result<Self> {
        let reader = port.try_clone_reader()?;
        let (reader, frames) = FrameReader::spawn(reader, config.diagnostics.clone());
        debug!("Session started on {}", port.name());

        Ok(Self {
            port,
            frames,
            reader: Some(reader),
            ack_timeout: config.ack_timeout,
            diagnostics: config.diagnostics,
        })
    }

    /// Get a reference to the underlying port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Reset the chip into its ROM bootloader through the control lines.
    ///
    /// Call before [`sync`](Self::sync) on boards that wire DTR/RTS to the
    /// backdoor pin and reset.
    pub fn enter_bootloader(&mut self, lines: ControlLines) -> Result<()> {
        port::invoke_bootloader(&mut self.port, lines)
    }

    /// Send the auto-baud preamble and wait for ACK.
    ///
    /// Bytes still buffered by the OS are discarded first.
    pub fn sync(&mut self) -> Result<()> {
        debug!("Syncing with bootloader on {}", self.port.name());
        self.port.clear_buffers()?;
        self.write_raw(&SYNC_BYTES)?;
        self.await_ack()
    }

    /// Check that the bootloader answers.
    pub fn ping(&mut self) -> Result<()> {
        self.command(&Packet::ping())
    }

    /// Read the 16-bit chip id.
    pub fn chip_id(&mut self) -> Result<u16> {
        self.command(&Packet::get_chip_id())?;
        self.read_data(frame::chip_id)
    }

    /// Erase `len` bytes of flash at `addr`.
    pub fn erase(&mut self, addr: u32, len: u32) -> Result<()> {
        debug!("Erasing {len:#x} bytes at 0x{addr:08X}");
        self.command(&Packet::erase(addr, len))
    }

    /// CRC32 of `len` bytes at `addr`, computed by the device.
    pub fn crc32(&mut self, addr: u32, len: u32) -> Result<u32> {
        self.command(&Packet::crc32(addr, len))?;
        self.read_data(frame::word32)
    }

    /// Read memory at `addr`.
    ///
    /// The device always replies with a full word; for [`ReadWidth::Byte`]
    /// only the low byte is meaningful.
    pub fn memory_read(&mut self, addr: u32, width: ReadWidth) -> Result<u32> {
        self.command(&Packet::memory_read(addr, width))?;
        self.read_data(frame::word32)
    }

    /// Announce a download of `len` bytes at `addr`.
    pub fn download(&mut self, addr: u32, len: u32) -> Result<()> {
        self.command(&Packet::download(addr, len))
    }

    /// Send one block of download data.
    pub fn send_data(&mut self, data: &[u8]) -> Result<()> {
        let packet = Packet::send_data(data)?;
        self.command(&packet)
    }

    /// Status of the last command.
    pub fn get_status(&mut self) -> Result<CommandCode> {
        self.command(&Packet::get_status())?;
        let status = self.read_data(frame::status_byte)?;
        CommandCode::try_from(status)
            .ok()
            .filter(|code| code.is_status())
            .ok_or(Error::UnknownStatus(status))
    }

    /// Read chip id, IEEE address and die configuration.
    pub fn device_info(&mut self) -> Result<DeviceInfo> {
        let chip_id = self.chip_id()?;

        let low = self.memory_read(target::IEEE_ADDR, ReadWidth::Word)?;
        let high = self.memory_read(target::IEEE_ADDR + 4, ReadWidth::Word)?;
        let mut ieee_addr = [0u8; IEEE_ADDR_LEN];
        ieee_addr[..4].copy_from_slice(&low.to_le_bytes());
        ieee_addr[4..].copy_from_slice(&high.to_le_bytes());

        let diecfg0 = self.memory_read(target::FLASH_CTRL_DIECFG0, ReadWidth::Word)?;
        let diecfg2 = self.memory_read(target::FLASH_CTRL_DIECFG2, ReadWidth::Word)?;

        Ok(DeviceInfo {
            chip_id,
            ieee_addr,
            diecfg0,
            diecfg2,
        })
    }

    /// Program `data` at `addr`.
    ///
    /// With `erase`, the page-aligned range covering the region is erased
    /// first. With `verify`, the device CRC32 of the region is compared
    /// against the image afterwards.
    pub fn write_flash<F>(
        &mut self,
        addr: u32,
        data: &[u8],
        options: &FlashOptions,
        erase: bool,
        verify: bool,
        progress: F,
    ) -> Result<FlashReport>
    where
        F: FnMut(usize, usize),
    {
        let len = u32::try_from(data.len())
            .map_err(|_| Error::InvalidArgument(format!("image of {} bytes is too large", data.len())))?;

        if erase && len > 0 {
            let (start, span) = target::page_align(addr, len);
            info!("Erasing {span:#x} bytes at 0x{start:08X}");
            self.erase(start, span)?;
        }

        let report = flasher::flash(self, addr, data, options, progress)?;

        if verify && len > 0 {
            let expected = crc32fast::hash(data);
            let actual = self.crc32(addr, len)?;
            if expected != actual {
                return Err(Error::VerifyFailed {
                    address: addr,
                    expected,
                    actual,
                });
            }
            info!("Verified CRC32 {expected:#010x}");
        }

        Ok(report)
    }

    /// Stop the frame reader and close the port.
    pub fn close(mut self) -> Result<()> {
        if let Some(reader) = self.reader.take() {
            reader.stop();
        }
        self.port.close()
    }

    fn command(&mut self, packet: &Packet) -> Result<()> {
        let bytes = packet.serialize();
        trace!("Sending {:?}", packet.command());
        self.diagnostics
            .trace(format_args!("packet serialize: {bytes:02X?}"));
        self.write_raw(&bytes)?;
        self.await_ack()
    }

    /// Read one data frame, extract a field, then acknowledge the frame.
    fn read_data<T>(&mut self, extract: impl FnOnce(&[u8]) -> Option<T>) -> Result<T> {
        let frame = next_frame(&self.frames, self.ack_timeout)?;
        let value = extract(frame.data_payload()?).ok_or_else(|| Error::UnexpectedFrame(frame.clone()))?;
        self.ack()?;
        Ok(value)
    }

    fn ack(&mut self) -> Result<()> {
        self.diagnostics.trace(format_args!("host ACK [{ACK:#04x}]"));
        self.write_raw(&[ACK])
    }

    fn await_ack(&self) -> Result<()> {
        await_ack(&self.frames, self.ack_timeout, &self.diagnostics)
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.port
            .write_all(bytes)
            .and_then(|()| self.port.flush())
            .map_err(Error::TransportWrite)
    }
}

impl<P: Port> FlashCommands for Bootloader<P> {
    fn download(&mut self, addr: u32, len: u32) -> Result<()> {
        Self::download(self, addr, len)
    }

    fn send_data(&mut self, data: &[u8]) -> Result<()> {
        Self::send_data(self, data)
    }

    fn get_status(&mut self) -> Result<CommandCode> {
        Self::get_status(self)
    }
}

#[cfg(feature = "native")]
mod native_impl {
    use super::{Bootloader, Result, SessionConfig};
    use crate::port::{NativePort, SerialConfig};

    impl Bootloader<NativePort> {
        /// Open a serial port and start a session with default settings.
        pub fn open(config: &SerialConfig) -> Result<Self> {
            Self::open_with(config, SessionConfig::default())
        }

        /// Open a serial port and start a session.
        pub fn open_with(config: &SerialConfig, session: SessionConfig) -> Result<Self> {
            let port = NativePort::open(config)?;
            Self::with_config(port, session)
        }
    }
}
