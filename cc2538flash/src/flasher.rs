//! Chunked flash writes.
//!
//! A write is one DOWNLOAD followed by SEND_DATA / GET_STATUS pairs, one per
//! chunk. FLASH_FAIL re-sends the same chunk up to
//! [`FlashOptions::max_chunk_retries`] times; any other non-success status
//! stops the write.

use crate::error::{Error, Result};
use crate::protocol::packet::CommandCode;
use log::{debug, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Largest chunk sent in one SEND_DATA packet.
pub const CHUNK_SIZE: usize = 248;

/// Default number of re-sends of a chunk that reported FLASH_FAIL.
pub const DEFAULT_MAX_CHUNK_RETRIES: u32 = 3;

/// Session operations needed to program flash.
pub trait FlashCommands {
    /// Announce a download of `len` bytes at `addr`.
    fn download(&mut self, addr: u32, len: u32) -> Result<()>;

    /// Send one chunk of download data.
    fn send_data(&mut self, data: &[u8]) -> Result<()>;

    /// Status of the last command.
    fn get_status(&mut self) -> Result<CommandCode>;
}

/// Tuning for [`flash`].
#[derive(Debug, Clone)]
pub struct FlashOptions {
    /// Bytes per SEND_DATA packet, at most [`CHUNK_SIZE`].
    pub chunk_size: usize,
    /// Re-sends allowed per chunk after FLASH_FAIL.
    pub max_chunk_retries: u32,
    /// Checked before every chunk; set to stop with [`Error::Interrupted`].
    pub interrupt: Option<Arc<AtomicBool>>,
}

impl Default for FlashOptions {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            max_chunk_retries: DEFAULT_MAX_CHUNK_RETRIES,
            interrupt: None,
        }
    }
}

impl FlashOptions {
    /// Set the per-chunk retry bound.
    #[must_use]
    pub fn with_max_chunk_retries(mut self, retries: u32) -> Self {
        self.max_chunk_retries = retries;
        self
    }

    /// Set the interrupt flag.
    #[must_use]
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    fn interrupted(&self) -> bool {
        self.interrupt
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

/// Summary of a completed flash write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlashReport {
    /// Chunks accepted by the device.
    pub chunks: usize,
    /// FLASH_FAIL re-sends across all chunks.
    pub retries: u32,
}

/// Write `payload` to flash at `addr`.
///
/// `progress` is called with `(bytes_done, total)` after every accepted
/// chunk. An empty payload still issues DOWNLOAD with length zero.
pub fn flash<T, F>(
    target: &mut T,
    addr: u32,
    payload: &[u8],
    options: &FlashOptions,
    mut progress: F,
) -> Result<FlashReport>
where
    T: FlashCommands + ?Sized,
    F: FnMut(usize, usize),
{
    if options.chunk_size == 0 || options.chunk_size > CHUNK_SIZE {
        return Err(Error::InvalidArgument(format!(
            "chunk size must be 1..={CHUNK_SIZE}, got {}",
            options.chunk_size
        )));
    }
    let total = payload.len();
    let len = u32::try_from(total)
        .map_err(|_| Error::InvalidArgument(format!("payload of {total} bytes is too large")))?;

    debug!("Downloading {total} bytes to 0x{addr:08X}");
    target.download(addr, len)?;

    let mut report = FlashReport::default();
    let mut offset = 0;
    let mut attempts = 0u32;

    while offset < total {
        if options.interrupted() {
            warn!("Flash interrupted at offset {offset:#x}");
            return Err(Error::Interrupted);
        }

        let end = (offset + options.chunk_size).min(total);
        let chunk = &payload[offset..end];

        target.send_data(chunk)?;
        attempts = attempts.saturating_add(1);

        let status = match target.get_status() {
            Ok(status) => status,
            Err(Error::UnknownStatus(status)) => {
                return Err(Error::FlashAborted {
                    status,
                    address: addr,
                    offset,
                });
            },
            Err(e) => return Err(e),
        };

        match status {
            CommandCode::Success => {
                offset = end;
                attempts = 0;
                report.chunks += 1;
                progress(offset, total);
            },
            CommandCode::FlashFail if attempts <= options.max_chunk_retries => {
                warn!(
                    "Flash failed at 0x{addr:08X} offset {offset:#x} len {:#x} (attempt {attempts}/{}), retrying",
                    chunk.len(),
                    options.max_chunk_retries.saturating_add(1)
                );
                report.retries += 1;
            },
            CommandCode::FlashFail => {
                return Err(Error::ChunkFlashFailure {
                    address: addr,
                    offset,
                    attempts,
                });
            },
            other => {
                return Err(Error::FlashAborted {
                    status: other as u8,
                    address: addr,
                    offset,
                });
            },
        }
    }

    info!(
        "Wrote {total} bytes to 0x{addr:08X} in {} chunks ({} retries)",
        report.chunks, report.retries
    );
    Ok(report)
}
