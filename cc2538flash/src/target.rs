//! CC2538 memory map.
//!
//! These addresses are passed through [`Bootloader`](crate::Bootloader)
//! operations unchanged; the protocol itself does not interpret them.
//!
//! ```text
//! 0x0020_0000  +----------------------+  FLASH_BASE_ADDR
//!              |  page 0              |
//!              |  ...                 |  2048-byte pages
//!              |  page 254            |
//! CCA_BASE_ADDR+----------------------+
//!              |  page 255 (CCA)      |  customer configuration area
//! 0x0028_0000  +----------------------+
//! ```

use std::fmt;

/// Start of on-chip flash.
pub const FLASH_BASE_ADDR: u32 = 0x0020_0000;

/// Flash erase granularity in bytes.
pub const FLASH_PAGE_SIZE: u32 = 2048;

/// Number of flash pages.
pub const NUM_FLASH_PAGES: u32 = 256;

/// Total flash size in bytes.
pub const FLASH_SIZE: u32 = FLASH_PAGE_SIZE * NUM_FLASH_PAGES;

/// Index of the page holding the customer configuration area.
pub const FLASH_CCA_PAGE: u32 = NUM_FLASH_PAGES - 1;

/// Start address of the customer configuration area.
pub const CCA_BASE_ADDR: u32 = FLASH_BASE_ADDR + FLASH_CCA_PAGE * FLASH_PAGE_SIZE;

/// Flash controller die configuration register 0.
pub const FLASH_CTRL_DIECFG0: u32 = 0x400D_3014;

/// Flash controller die configuration register 2.
pub const FLASH_CTRL_DIECFG2: u32 = 0x400D_301C;

/// Location of the factory-programmed IEEE address.
pub const IEEE_ADDR: u32 = 0x0028_0028;

/// Length of the IEEE address in bytes.
pub const IEEE_ADDR_LEN: usize = 8;

/// Expand `addr..addr + len` to whole flash pages.
///
/// Returns the start address and length of the smallest page-aligned range
/// covering the region. A zero-length region yields a zero-length range.
#[allow(clippy::cast_possible_truncation)]
pub fn page_align(addr: u32, len: u32) -> (u32, u32) {
    let page = u64::from(FLASH_PAGE_SIZE);
    let start = u64::from(addr) / page * page;
    if len == 0 {
        return (start as u32, 0);
    }
    let end = (u64::from(addr) + u64::from(len)).div_ceil(page) * page;
    // Flash ends well below 4 GiB, so both values fit for any in-range region.
    (start as u32, (end - start).min(u64::from(u32::MAX)) as u32)
}

/// Whether `addr..addr + len` overlaps the customer configuration area.
pub fn contains_cca(addr: u32, len: u32) -> bool {
    let start = u64::from(addr);
    let end = start + u64::from(len);
    let cca_start = u64::from(CCA_BASE_ADDR);
    let cca_end = cca_start + u64::from(FLASH_PAGE_SIZE);
    len > 0 && start < cca_end && end > cca_start
}

/// Whether `addr..addr + len` lies entirely inside on-chip flash.
pub fn in_flash(addr: u32, len: u32) -> bool {
    let start = u64::from(addr);
    let end = start + u64::from(len);
    start >= u64::from(FLASH_BASE_ADDR) && end <= u64::from(FLASH_BASE_ADDR) + u64::from(FLASH_SIZE)
}

/// Identity and configuration read from a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DeviceInfo {
    /// Chip id reported by GET_CHIP_ID (0xB964 on CC2538).
    pub chip_id: u16,
    /// IEEE address bytes in memory order (least significant first).
    pub ieee_addr: [u8; IEEE_ADDR_LEN],
    /// Raw `FLASH_CTRL_DIECFG0` word.
    pub diecfg0: u32,
    /// Raw `FLASH_CTRL_DIECFG2` word.
    pub diecfg2: u32,
}

impl DeviceInfo {
    /// IEEE address as conventionally written, most significant byte first.
    pub fn ieee_address(&self) -> IeeeAddress {
        let mut bytes = self.ieee_addr;
        bytes.reverse();
        IeeeAddress(bytes)
    }
}

/// IEEE 802.15.4 extended address, most significant byte first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IeeeAddress(pub [u8; IEEE_ADDR_LEN]);

impl fmt::Display for IeeeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{b:02X}")?;
        }
        Ok(())
    }
}
