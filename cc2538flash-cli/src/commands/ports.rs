//! List ports command implementation.

use {
    crate::{Cli, config::Config},
    cc2538flash::{PortInfo, detect_ports},
    console::style,
};

/// JSON entry for one port: the port fields plus its bridge classification.
fn port_json(port: &PortInfo, config: &Config) -> serde_json::Value {
    let mut value = serde_json::to_value(port).unwrap_or_default();
    if let Some(map) = value.as_object_mut() {
        let bridge = port.bridge();
        let configured = matches!(
            (port.vid, port.pid),
            (Some(vid), Some(pid)) if config.port.usb_device.iter().any(|d| d.matches(vid, pid))
        );
        map.insert("bridge".into(), bridge.name().into());
        map.insert("known".into(), (bridge.is_known() || configured).into());
    }
    value
}

/// List ports command implementation.
pub(crate) fn cmd_list_ports(cli: &Cli, config: &Config, json: bool) {
    let detected = detect_ports();

    if json {
        let ports: Vec<serde_json::Value> = detected.iter().map(|p| port_json(p, config)).collect();
        println!("{}", serde_json::to_string_pretty(&ports).unwrap_or_default());
        return;
    }

    eprintln!("{}", style("Available serial ports").bold().underlined());

    if detected.is_empty() {
        eprintln!("  {}", style("No serial ports found").dim());
        return;
    }

    for port in &detected {
        let bridge = port.bridge();
        let device_type = if bridge.is_known() {
            format!(" [{}]", style(bridge.name()).yellow())
        } else {
            String::new()
        };

        let vid_pid = if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
            format!(" ({vid:04X}:{pid:04X})")
        } else {
            String::new()
        };

        let product = port
            .product
            .as_deref()
            .map(|p| format!(" - {}", style(p).dim()))
            .unwrap_or_default();

        eprintln!(
            "  {} {}{}{}{}",
            style("•").green(),
            style(&port.name).cyan(),
            device_type,
            vid_pid,
            product
        );
    }

    // Show which port a device command would pick on its own
    if cli.port.is_none() {
        if let [only] = detected.as_slice() {
            eprintln!("\n{} Auto-detected: {}", style("→").green().bold(), style(&only.name).cyan().bold());
        } else if let Some(known) = detected.iter().find(|p| p.bridge().is_known()) {
            eprintln!("\n{} Likely board: {}", style("→").green().bold(), style(&known.name).cyan().bold());
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::config::UsbDevice};

    fn port(vid: Option<u16>, pid: Option<u16>) -> PortInfo {
        PortInfo {
            name: "/dev/ttyUSB0".to_string(),
            vid,
            pid,
            manufacturer: Some("Silicon Labs".to_string()),
            product: None,
            serial_number: None,
        }
    }

    #[test]
    fn test_port_json_known_bridge() {
        let value = port_json(&port(Some(0x10C4), Some(0xEA60)), &Config::default());
        assert_eq!(value["name"], "/dev/ttyUSB0");
        assert_eq!(value["vid"], 0x10C4);
        assert_eq!(value["manufacturer"], "Silicon Labs");
        assert_eq!(value["bridge"], "CP210x");
        assert_eq!(value["known"], true);
    }

    #[test]
    fn test_port_json_configured_device() {
        let mut config = Config::default();
        config.port.usb_device.push(UsbDevice { vid: 0x1234, pid: 0x5678 });

        let value = port_json(&port(Some(0x1234), Some(0x5678)), &config);
        assert_eq!(value["bridge"], "Unknown");
        assert_eq!(value["known"], true);

        let value = port_json(&port(None, None), &config);
        assert_eq!(value["known"], false);
        assert!(value["vid"].is_null());
    }
}
