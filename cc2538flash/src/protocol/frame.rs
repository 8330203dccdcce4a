//! Inbound frames and their classification.
//!
//! The bootloader answers with two frame shapes:
//!
//! ```text
//! ACK / NAK:  [0x00][0xCC | 0x33]
//! Data:       [len][checksum][payload: len - 2]
//! ```
//!
//! Reply fields read by the host are little-endian words, except the chip id
//! which is a big-endian halfword at payload offset 2.

use crate::error::{Error, Result};
use crate::protocol::packet::checksum;
use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Acknowledge marker byte.
pub const ACK: u8 = 0xCC;

/// Not-acknowledge marker byte.
pub const NAK: u8 = 0x33;

/// Bytes of data frame header (length, checksum).
pub const DATA_HEADER_LEN: usize = 2;

/// A frame as delimited by the assembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(Vec<u8>);

/// Classification of a [`Frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind<'a> {
    /// Device accepted the last command.
    Ack,
    /// Device rejected the last command.
    Nak,
    /// Data reply; the payload without length and checksum bytes.
    Data(&'a [u8]),
}

impl Frame {
    /// Wrap raw frame bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Raw frame bytes, header included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Number of bytes in the frame.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the frame holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Classify the frame as ACK, NAK or data.
    ///
    /// A 2-byte frame must carry an ACK or NAK marker; any other 2-byte frame
    /// (and anything shorter) is reported as [`Error::UnexpectedFrame`].
    pub fn classify(&self) -> Result<FrameKind<'_>> {
        match self.0.as_slice() {
            [_, ACK] => Ok(FrameKind::Ack),
            [_, NAK] => Ok(FrameKind::Nak),
            bytes if bytes.len() > DATA_HEADER_LEN => Ok(FrameKind::Data(&bytes[DATA_HEADER_LEN..])),
            _ => Err(Error::UnexpectedFrame(self.clone())),
        }
    }

    /// Payload of a data frame whose checksum matches its contents.
    pub fn data_payload(&self) -> Result<&[u8]> {
        match self.classify()? {
            FrameKind::Data(payload) => {
                let expected = self.0[1];
                let actual = checksum(0, payload);
                if expected != actual {
                    return Err(Error::InvalidChecksum { expected, actual });
                }
                Ok(payload)
            },
            FrameKind::Ack | FrameKind::Nak => Err(Error::UnexpectedFrame(self.clone())),
        }
    }
}

impl From<Vec<u8>> for Frame {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Chip id from a GET_CHIP_ID reply (big-endian, payload bytes 2..4).
pub fn chip_id(payload: &[u8]) -> Option<u16> {
    payload
        .get(2..4)
        .map(BigEndian::read_u16)
}

/// 32-bit reply word (little-endian, payload bytes 0..4).
pub fn word32(payload: &[u8]) -> Option<u32> {
    payload
        .get(0..4)
        .map(LittleEndian::read_u32)
}

/// Raw status byte of a GET_STATUS reply.
pub fn status_byte(payload: &[u8]) -> Option<u8> {
    payload.first().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_frame(payload: &[u8]) -> Frame {
        let mut bytes = vec![(payload.len() + 2) as u8, checksum(0, payload)];
        bytes.extend_from_slice(payload);
        Frame::new(bytes)
    }

    #[test]
    fn test_classify_ack_nak() {
        assert_eq!(Frame::new(vec![0x00, 0xCC]).classify().unwrap(), FrameKind::Ack);
        assert_eq!(Frame::new(vec![0x00, 0x33]).classify().unwrap(), FrameKind::Nak);
    }

    #[test]
    fn test_classify_other_two_byte_frame() {
        let frame = Frame::new(vec![0x00, 0x42]);
        match frame.classify() {
            Err(Error::UnexpectedFrame(f)) => assert_eq!(f.as_bytes(), &[0x00, 0x42]),
            other => panic!("expected UnexpectedFrame, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_short_frame() {
        assert!(Frame::new(vec![0x01]).classify().is_err());
    }

    #[test]
    fn test_classify_data() {
        let frame = data_frame(&[0x40]);
        assert_eq!(frame.classify().unwrap(), FrameKind::Data(&[0x40]));
        assert_eq!(frame.data_payload().unwrap(), &[0x40]);
    }

    #[test]
    fn test_data_payload_rejects_bad_checksum() {
        let frame = Frame::new(vec![0x03, 0x41, 0x40]);
        assert!(matches!(
            frame.data_payload(),
            Err(Error::InvalidChecksum {
                expected: 0x41,
                actual: 0x40
            })
        ));
    }

    #[test]
    fn test_data_payload_rejects_ack() {
        assert!(matches!(
            Frame::new(vec![0x00, 0xCC]).data_payload(),
            Err(Error::UnexpectedFrame(_))
        ));
    }

    #[test]
    fn test_chip_id() {
        // CC2538 reply: 00 00 b9 64
        assert_eq!(chip_id(&[0x00, 0x00, 0xB9, 0x64]), Some(0xB964));
        assert_eq!(chip_id(&[0x00, 0x00, 0xB9]), None);
    }

    #[test]
    fn test_word32_little_endian() {
        assert_eq!(word32(&[0x78, 0x56, 0x34, 0x12]), Some(0x1234_5678));
        assert_eq!(word32(&[0x01, 0x02]), None);
    }

    #[test]
    fn test_status_byte() {
        assert_eq!(status_byte(&[0x44]), Some(0x44));
        assert_eq!(status_byte(&[]), None);
    }
}
