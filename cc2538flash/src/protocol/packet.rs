//! Outbound command packets for the CC2538 ROM bootloader.
//!
//! ## Packet Format
//!
//! ```text
//! +--------+----------+---------+-----------------+
//! | Length | Checksum | Command |     Payload     |
//! +--------+----------+---------+-----------------+
//! |   1    |    1     |    1    |     0..=252     |
//! +--------+----------+---------+-----------------+
//! | 3 + n  | (cmd + Σpayload) mod 256 |            |
//! +--------+----------+---------+-----------------+
//! ```
//!
//! Address and length fields inside request payloads are big-endian.

use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder};

/// Bytes of packet header (length, checksum, command).
pub const HEADER_LEN: usize = 3;

/// Largest payload the single-byte length field can describe.
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize - HEADER_LEN;

/// Auto-baud preamble sent before the first command, not packet framed.
pub const SYNC_BYTES: [u8; 2] = [0x55, 0x55];

/// Command and status codes of the bootloader protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(u8)]
pub enum CommandCode {
    /// Check that the bootloader is alive (0x20).
    Ping = 0x20,
    /// Prepare a flash download of `len` bytes at `addr` (0x21).
    Download = 0x21,
    /// Query the status of the last command (0x23).
    GetStatus = 0x23,
    /// Send one block of download data (0x24).
    SendData = 0x24,
    /// Erase `len` bytes of flash at `addr` (0x26).
    Erase = 0x26,
    /// CRC32 over `len` bytes at `addr` (0x27).
    Crc32 = 0x27,
    /// Read the 16-bit chip id (0x28).
    GetChipId = 0x28,
    /// Read one byte or word of memory (0x2A).
    MemoryRead = 0x2A,

    /// Last command completed (0x40).
    Success = 0x40,
    /// Last command was not recognised (0x41).
    UnknownCmd = 0x41,
    /// Last command had an invalid size or parameter (0x42).
    InvalidCmd = 0x42,
    /// Last command referenced an invalid address (0x43).
    InvalidAddr = 0x43,
    /// Last flash program or erase failed (0x44).
    FlashFail = 0x44,
}

impl CommandCode {
    /// Whether this code is a command status returned by GET_STATUS.
    pub fn is_status(self) -> bool {
        matches!(
            self,
            Self::Success | Self::UnknownCmd | Self::InvalidCmd | Self::InvalidAddr | Self::FlashFail
        )
    }
}

impl TryFrom<u8> for CommandCode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            0x20 => Self::Ping,
            0x21 => Self::Download,
            0x23 => Self::GetStatus,
            0x24 => Self::SendData,
            0x26 => Self::Erase,
            0x27 => Self::Crc32,
            0x28 => Self::GetChipId,
            0x2A => Self::MemoryRead,
            0x40 => Self::Success,
            0x41 => Self::UnknownCmd,
            0x42 => Self::InvalidCmd,
            0x43 => Self::InvalidAddr,
            0x44 => Self::FlashFail,
            other => return Err(Error::UnknownStatus(other)),
        })
    }
}

/// Access width for [`CommandCode::MemoryRead`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(u8)]
pub enum ReadWidth {
    /// Single byte access.
    Byte = 1,
    /// 32-bit word access.
    #[default]
    Word = 4,
}

/// Write `n` into the first four bytes of `buf`, most significant byte first.
pub fn pack32(n: u32, buf: &mut [u8]) {
    BigEndian::write_u32(&mut buf[..4], n);
}

/// Checksum of a packet: command byte plus every payload byte, modulo 256.
pub fn checksum(command: u8, payload: &[u8]) -> u8 {
    payload
        .iter()
        .fold(command, |sum, b| sum.wrapping_add(*b))
}

/// An outbound bootloader command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    command: CommandCode,
    payload: Vec<u8>,
}

impl Packet {
    /// Create a packet, rejecting payloads the length byte cannot describe.
    pub fn new(command: CommandCode, payload: Vec<u8>) -> Result<Self> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(Error::PayloadTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }
        Ok(Self { command, payload })
    }

    /// Create a packet without payload.
    pub fn bare(command: CommandCode) -> Self {
        Self {
            command,
            payload: Vec::new(),
        }
    }

    /// Build a PING packet.
    pub fn ping() -> Self {
        Self::bare(CommandCode::Ping)
    }

    /// Build a GET_CHIP_ID packet.
    pub fn get_chip_id() -> Self {
        Self::bare(CommandCode::GetChipId)
    }

    /// Build a GET_STATUS packet.
    pub fn get_status() -> Self {
        Self::bare(CommandCode::GetStatus)
    }

    /// Build an ERASE packet.
    pub fn erase(addr: u32, len: u32) -> Self {
        Self::with_range(CommandCode::Erase, addr, len)
    }

    /// Build a CRC32 packet.
    pub fn crc32(addr: u32, len: u32) -> Self {
        Self::with_range(CommandCode::Crc32, addr, len)
    }

    /// Build a DOWNLOAD packet.
    pub fn download(addr: u32, len: u32) -> Self {
        Self::with_range(CommandCode::Download, addr, len)
    }

    /// Build a MEMORY_READ packet.
    ///
    /// Payload (5 bytes): address (big-endian) followed by the access width.
    pub fn memory_read(addr: u32, width: ReadWidth) -> Self {
        let mut payload = vec![0u8; 5];
        pack32(addr, &mut payload[0..4]);
        payload[4] = width as u8;
        Self {
            command: CommandCode::MemoryRead,
            payload,
        }
    }

    /// Build a SEND_DATA packet carrying `data`.
    pub fn send_data(data: &[u8]) -> Result<Self> {
        Self::new(CommandCode::SendData, data.to_vec())
    }

    /// Packet whose payload is an address followed by a byte count.
    fn with_range(command: CommandCode, addr: u32, len: u32) -> Self {
        let mut payload = vec![0u8; 8];
        pack32(addr, &mut payload[0..4]);
        pack32(len, &mut payload[4..8]);
        Self { command, payload }
    }

    /// Get the command code.
    pub fn command(&self) -> CommandCode {
        self.command
    }

    /// Serialize to `[length, checksum, command, payload...]`.
    #[allow(clippy::cast_possible_truncation)] // Length bounded by MAX_PAYLOAD_LEN
    pub fn serialize(&self) -> Vec<u8> {
        let command = self.command as u8;
        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len());
        buf.push((HEADER_LEN + self.payload.len()) as u8);
        buf.push(checksum(command, &self.payload));
        buf.push(command);
        buf.extend_from_slice(&self.payload);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_packet() {
        assert_eq!(Packet::ping().serialize(), vec![0x03, 0x20, 0x20]);
    }

    #[test]
    fn test_erase_packet() {
        let data = Packet::erase(0, 16).serialize();
        assert_eq!(data.len(), 11);
        assert_eq!(data[0], 0x0B);
        assert_eq!(data[1], 0x36);
        assert_eq!(data[2], 0x26);
        assert_eq!(&data[3..], &[0, 0, 0, 0, 0, 0, 0, 16]);
    }

    #[test]
    fn test_range_fields_are_big_endian() {
        let data = Packet::download(0x0020_0000, 0x0000_01F4).serialize();
        assert_eq!(&data[3..7], &[0x00, 0x20, 0x00, 0x00]);
        assert_eq!(&data[7..11], &[0x00, 0x00, 0x01, 0xF4]);
        assert_eq!(data[2], CommandCode::Download as u8);
    }

    #[test]
    fn test_memory_read_packet() {
        let data = Packet::memory_read(0x400D_3014, ReadWidth::Word).serialize();
        assert_eq!(data[0], 8);
        assert_eq!(&data[3..], &[0x40, 0x0D, 0x30, 0x14, 0x04]);

        let data = Packet::memory_read(0x0028_0028, ReadWidth::Byte).serialize();
        assert_eq!(data[7], 0x01);
    }

    #[test]
    fn test_length_and_checksum_for_all_payload_sizes() {
        for len in 0..=249usize {
            let payload: Vec<u8> = (0..len).map(|i| (i * 7 + 3) as u8).collect();
            let packet = Packet::new(CommandCode::SendData, payload.clone()).unwrap();
            let data = packet.serialize();

            let sum: u32 = 0x24 + payload.iter().map(|b| u32::from(*b)).sum::<u32>();
            assert_eq!(usize::from(data[0]), 3 + len);
            assert_eq!(data[1], (sum % 256) as u8);
            assert_eq!(data.len(), 3 + len);
            assert_eq!(&data[3..], payload.as_slice());
        }
    }

    #[test]
    fn test_payload_limit() {
        assert!(Packet::send_data(&[0u8; MAX_PAYLOAD_LEN]).is_ok());
        let err = Packet::send_data(&[0u8; MAX_PAYLOAD_LEN + 1]).unwrap_err();
        assert!(matches!(err, Error::PayloadTooLarge { len: 253, max: 252 }));
    }

    #[test]
    fn test_max_payload_length_byte() {
        let data = Packet::send_data(&[0xFF; MAX_PAYLOAD_LEN]).unwrap().serialize();
        assert_eq!(data[0], 0xFF);
    }

    #[test]
    fn test_command_code_from_wire() {
        assert_eq!(CommandCode::try_from(0x40).unwrap(), CommandCode::Success);
        assert_eq!(CommandCode::try_from(0x44).unwrap(), CommandCode::FlashFail);
        assert_eq!(CommandCode::try_from(0x2A).unwrap(), CommandCode::MemoryRead);
        assert!(matches!(
            CommandCode::try_from(0x99),
            Err(Error::UnknownStatus(0x99))
        ));
    }

    #[test]
    fn test_status_codes() {
        assert!(CommandCode::Success.is_status());
        assert!(CommandCode::FlashFail.is_status());
        assert!(!CommandCode::Ping.is_status());
    }

    #[test]
    fn test_pack32() {
        let mut buf = [0u8; 4];
        pack32(0x1234_5678, &mut buf);
        assert_eq!(buf, [0x12, 0x34, 0x56, 0x78]);
    }
}
