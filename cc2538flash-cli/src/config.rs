//! Configuration file support for cc2538flash.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (CC2538FLASH_*)
//! 3. Local config file (./cc2538flash.toml, or --config PATH instead of files)
//! 4. Global config file (~/.config/cc2538flash/config.toml)

use directories::ProjectDirs;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Local configuration file name.
const LOCAL_CONFIG_FILE: &str = "cc2538flash.toml";

/// USB device identification for port matching.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsbDevice {
    /// USB Vendor ID.
    pub vid: u16,
    /// USB Product ID.
    pub pid: u16,
}

impl UsbDevice {
    /// Check if this device matches the given USB info.
    pub fn matches(&self, vid: u16, pid: u16) -> bool {
        self.vid == vid && self.pid == pid
    }
}

/// Connection configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Preferred serial port (e.g., "/dev/ttyUSB0" or "COM3").
    pub serial: Option<String>,
    /// Default baud rate.
    pub baud: Option<u32>,
}

/// Port-specific configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortConfig {
    /// Connection settings.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Additional USB bridges treated as known boards.
    #[serde(default)]
    pub usb_device: Vec<UsbDevice>,
}

/// Flash configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlashConfig {
    /// Re-sends allowed per chunk after FLASH_FAIL.
    pub max_chunk_retries: Option<u32>,
    /// Verify the CRC32 after writing (default true).
    pub verify: Option<bool>,
    /// Erase covered pages before writing (default false).
    pub erase: Option<bool>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Port configuration.
    #[serde(default)]
    pub port: PortConfig,
    /// Flash configuration.
    #[serde(default)]
    pub flash: FlashConfig,
}

impl Config {
    /// Load configuration from all available sources.
    pub fn load() -> Self {
        let mut config = Self::default();

        // Load global config
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global_config) = Self::load_from_file(&global_path) {
                debug!("Loaded global config from {}", global_path.display());
                config.merge(global_config);
            }
        }

        // Load local config (overrides global)
        if let Some(local_config) = Self::load_from_file(Path::new(LOCAL_CONFIG_FILE)) {
            debug!("Loaded local config from {LOCAL_CONFIG_FILE}");
            config.merge(local_config);
        }

        config
    }

    /// Load configuration from a specific file path (--config flag).
    pub fn load_from_path(path: &Path) -> Self {
        if let Some(config) = Self::load_from_file(path) {
            debug!("Loaded config from {}", path.display());
            config
        } else {
            warn!("Could not load config from {}, using defaults", path.display());
            Self::default()
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Failed to parse config file {}: {}", path.display(), e);
                    None
                },
            },
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                None
            },
        }
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "cc2538flash").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one.
    fn merge(&mut self, other: Self) {
        if other.port.connection.serial.is_some() {
            self.port.connection.serial = other.port.connection.serial;
        }
        if other.port.connection.baud.is_some() {
            self.port.connection.baud = other.port.connection.baud;
        }
        for device in other.port.usb_device {
            if !self.port.usb_device.contains(&device) {
                self.port.usb_device.push(device);
            }
        }

        if other.flash.max_chunk_retries.is_some() {
            self.flash.max_chunk_retries = other.flash.max_chunk_retries;
        }
        if other.flash.verify.is_some() {
            self.flash.verify = other.flash.verify;
        }
        if other.flash.erase.is_some() {
            self.flash.erase = other.flash.erase;
        }
    }

    /// Remember a USB bridge so its ports are auto-selected next time.
    ///
    /// Written to the local config when one exists, otherwise to the global one.
    pub fn remember_usb_device(&mut self, vid: u16, pid: u16) -> anyhow::Result<()> {
        let device = UsbDevice { vid, pid };
        if self.port.usb_device.contains(&device) {
            return Ok(());
        }

        let path = if Path::new(LOCAL_CONFIG_FILE).exists() {
            PathBuf::from(LOCAL_CONFIG_FILE)
        } else if let Some(global_path) = Self::global_config_path() {
            if let Some(dir) = global_path.parent() {
                fs::create_dir_all(dir)?;
            }
            global_path
        } else {
            PathBuf::from(LOCAL_CONFIG_FILE)
        };

        self.port.usb_device.push(device.clone());
        Self::append_usb_device(&path, device)?;
        info!("Saved USB device to {}", path.display());

        Ok(())
    }

    /// Add a USB device to the file at `path`, keeping its other settings.
    fn append_usb_device(path: &Path, device: UsbDevice) -> anyhow::Result<()> {
        let mut on_disk = if path.exists() {
            toml::from_str::<Self>(&fs::read_to_string(path)?)?
        } else {
            Self::default()
        };
        if !on_disk.port.usb_device.contains(&device) {
            on_disk.port.usb_device.push(device);
        }
        fs::write(path, toml::to_string_pretty(&on_disk)?)?;
        Ok(())
    }
}
