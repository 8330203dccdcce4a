//! CC2538 ROM bootloader wire protocol.

pub mod assembler;
pub mod frame;
pub mod handshake;
pub mod packet;

// Re-export common types
pub use assembler::{FrameAssembler, FrameReader};
pub use frame::{Frame, FrameKind};
pub use handshake::{ACK_TIMEOUT, await_ack};
pub use packet::{CommandCode, Packet, ReadWidth};
