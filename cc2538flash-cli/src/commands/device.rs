//! Device query commands: ping, info, memory read and CRC.

use {
    super::{connect, disconnect},
    crate::{Cli, config::Config},
    anyhow::{Context, Result},
    cc2538flash::{DeviceInfo, ReadWidth},
    console::style,
};

/// Ping command implementation.
pub(crate) fn cmd_ping(cli: &Cli, config: &mut Config) -> Result<()> {
    let mut bootloader = connect(cli, config)?;
    let result = bootloader.ping().context("Ping failed");
    disconnect(bootloader);
    result?;

    if !cli.quiet {
        eprintln!("{} Bootloader responded", style("✓").green());
    }
    Ok(())
}

/// Info command implementation.
pub(crate) fn cmd_info(cli: &Cli, config: &mut Config, json: bool) -> Result<()> {
    let mut bootloader = connect(cli, config)?;
    let result = bootloader.device_info().context("Failed to read device information");
    disconnect(bootloader);
    let info = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info_json(&info))?);
        return Ok(());
    }

    eprintln!("\n{}", style("Device Information").bold().underlined());
    eprintln!("  Chip ID:      0x{:04X}", info.chip_id);
    eprintln!("  IEEE address: {}", style(info.ieee_address()).cyan());
    eprintln!("  DIECFG0:      0x{:08X}", info.diecfg0);
    eprintln!("  DIECFG2:      0x{:08X}", info.diecfg2);
    Ok(())
}

/// Info command --json payload.
fn info_json(info: &DeviceInfo) -> serde_json::Value {
    serde_json::json!({
        "chip_id": format!("0x{:04X}", info.chip_id),
        "ieee_address": info.ieee_address().to_string(),
        "diecfg0": format!("0x{:08X}", info.diecfg0),
        "diecfg2": format!("0x{:08X}", info.diecfg2),
    })
}

/// Read command implementation. The value goes to stdout.
pub(crate) fn cmd_read(cli: &Cli, config: &mut Config, address: u32, width: ReadWidth) -> Result<()> {
    let mut bootloader = connect(cli, config)?;
    let result = bootloader
        .memory_read(address, width)
        .with_context(|| format!("Failed to read 0x{address:08X}"));
    disconnect(bootloader);
    let value = result?;

    match width {
        ReadWidth::Byte => println!("0x{value:02X}"),
        ReadWidth::Word => println!("0x{value:08X}"),
    }
    Ok(())
}

/// CRC command implementation. The checksum goes to stdout.
pub(crate) fn cmd_crc(cli: &Cli, config: &mut Config, address: u32, length: u32) -> Result<()> {
    let mut bootloader = connect(cli, config)?;
    let result = bootloader
        .crc32(address, length)
        .with_context(|| format!("Failed to compute CRC32 of {length} bytes at 0x{address:08X}"));
    disconnect(bootloader);
    let crc = result?;

    println!("0x{crc:08X}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_json_formatting() {
        let info = DeviceInfo {
            chip_id: 0xB964,
            ieee_addr: [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x4B, 0x12],
            diecfg0: 0xB964_0000,
            diecfg2: 0x0000_2000,
        };
        let value = info_json(&info);
        assert_eq!(value["chip_id"], "0xB964");
        assert_eq!(value["ieee_address"], "12:4B:06:05:04:03:02:01");
        assert_eq!(value["diecfg0"], "0xB9640000");
        assert_eq!(value["diecfg2"], "0x00002000");
    }
}
