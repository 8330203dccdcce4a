//! USB-UART bridge classification and port discovery.
//!
//! CC2538 boards expose the ROM bootloader UART through a USB bridge
//! (FTDI on SmartRF06 and OpenMote, CP210x on RE-Mote and Firefly, XDS110 on
//! newer TI LaunchPads). Ports behind a recognised bridge are preferred when
//! selecting a port automatically.

use crate::port::PortInfo;

#[cfg(feature = "native")]
use {
    crate::port::{NativePortEnumerator, PortEnumerator},
    log::{debug, trace},
};

/// Known USB bridge kinds found on CC2538 boards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeKind {
    /// FTDI FT232/FT2232/FT4232 (including XDS100v3).
    Ftdi,
    /// Silicon Labs CP210x.
    Cp210x,
    /// TI XDS110 debug probe application UART.
    Xds110,
    /// CH340/CH341 USB-to-Serial converter.
    Ch340,
    /// Prolific PL2303.
    Prolific,
    /// Unknown bridge.
    Unknown,
}

/// Known USB VID/PID pairs; an empty PID list matches any product.
const KNOWN_BRIDGES: &[(u16, &[u16], BridgeKind)] = &[
    (0x0403, &[0x6001, 0x6010, 0x6011, 0x6014, 0x6015, 0xA6D0], BridgeKind::Ftdi),
    (0x10C4, &[0xEA60, 0xEA70, 0xEA71], BridgeKind::Cp210x),
    (0x0451, &[0xBEF3, 0xBEF4], BridgeKind::Xds110),
    (0x1A86, &[0x7523, 0x7522, 0x5523], BridgeKind::Ch340),
    (0x067B, &[], BridgeKind::Prolific),
];

impl BridgeKind {
    /// Classify a USB VID/PID pair.
    #[must_use]
    pub fn from_vid_pid(vid: u16, pid: u16) -> Self {
        KNOWN_BRIDGES
            .iter()
            .find(|(known_vid, pids, _)| vid == *known_vid && (pids.is_empty() || pids.contains(&pid)))
            .map_or(Self::Unknown, |(_, _, kind)| *kind)
    }

    /// Human-readable bridge name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ftdi => "FTDI",
            Self::Cp210x => "CP210x",
            Self::Xds110 => "XDS110",
            Self::Ch340 => "CH340/CH341",
            Self::Prolific => "PL2303",
            Self::Unknown => "Unknown",
        }
    }

    /// Whether the bridge is recognised.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl PortInfo {
    /// Classify the USB bridge behind this port.
    pub fn bridge(&self) -> BridgeKind {
        match (self.vid, self.pid) {
            (Some(vid), Some(pid)) => BridgeKind::from_vid_pid(vid, pid),
            _ => BridgeKind::Unknown,
        }
    }
}

/// List serial ports, recognised bridges first.
///
/// Enumeration failures are logged and yield an empty list.
#[cfg(feature = "native")]
pub fn detect_ports() -> Vec<PortInfo> {
    let mut ports = match NativePortEnumerator::list_ports() {
        Ok(ports) => ports,
        Err(e) => {
            debug!("Failed to enumerate serial ports: {e}");
            return Vec::new();
        },
    };

    for port in &ports {
        trace!("Found port {} ({})", port.name, port.bridge().name());
    }

    // Stable sort keeps the enumeration order within each group.
    ports.sort_by_key(|p| !p.bridge().is_known());
    ports
}
