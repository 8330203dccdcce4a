//! Interactive serial port selection.
//!
//! Ports are chosen in this order:
//! - an explicit `--port` (or `CC2538FLASH_PORT`)
//! - the port remembered in the configuration
//! - a single detected port behind a known USB bridge
//! - an interactive choice among the detected ports
//!
//! Non-interactive mode never prompts and fails unless exactly one candidate
//! remains.

use {
    crate::{CliError, config::Config},
    anyhow::Result,
    cc2538flash::{PortInfo, detect_ports},
    console::style,
    dialoguer::{Confirm, Error as DialoguerError, Select, theme::ColorfulTheme},
    log::{debug, error, info},
    std::io::IsTerminal,
};

/// Options for serial port selection.
#[derive(Debug, Clone, Default)]
pub struct SerialOptions {
    /// Explicit port specified via CLI.
    pub port: Option<String>,
    /// Offer all ports (including unknown bridges).
    pub list_all_ports: bool,
    /// Non-interactive mode (fail if multiple ports).
    pub non_interactive: bool,
    /// Force confirmation even for a single recognized port.
    pub confirm_port: bool,
}

/// Result of port selection including whether it was a known device.
pub struct SelectedPort {
    /// The selected port info.
    pub port: PortInfo,
    /// Whether this port matched a known/configured bridge.
    pub is_known: bool,
}

fn usage_err(message: &str) -> anyhow::Error {
    CliError::Usage(message.to_string()).into()
}

fn cancelled() -> anyhow::Error {
    CliError::Cancelled("Port selection cancelled".to_string()).into()
}

/// Narrow detected ports to the selection candidates: known bridges unless
/// none are present or all ports were requested.
fn candidate_ports(ports: Vec<PortInfo>, options: &SerialOptions, config: &Config) -> Vec<PortInfo> {
    if options.list_all_ports || !ports.iter().any(|p| is_known_device(p, config)) {
        return ports;
    }
    ports
        .into_iter()
        .filter(|p| is_known_device(p, config))
        .collect()
}

fn select_non_interactive_port(selection_ports: Vec<PortInfo>, config: &Config) -> Result<SelectedPort> {
    let count = selection_ports.len();
    let mut ports = selection_ports.into_iter();
    match (ports.next(), count) {
        (Some(port), 1) => Ok(SelectedPort {
            is_known: is_known_device(&port, config),
            port,
        }),
        (Some(_), _) => Err(usage_err(
            "Found multiple serial ports; use --port to pick one in non-interactive mode",
        )),
        (None, _) => Err(usage_err("No serial ports available")),
    }
}

/// Select a serial port interactively or automatically.
pub fn select_serial_port(options: &SerialOptions, config: &Config) -> Result<SelectedPort> {
    // If port explicitly specified, use it
    if let Some(port_name) = &options.port {
        return Ok(find_port_by_name(port_name, config));
    }

    // If port in config, use it
    if let Some(port_name) = &config.port.connection.serial {
        debug!("Using port from config: {port_name}");
        return Ok(find_port_by_name(port_name, config));
    }

    let ports = detect_ports();
    if ports.is_empty() {
        return Err(usage_err("No serial ports found; is the board connected?"));
    }

    let selection_ports = candidate_ports(ports, options, config);

    // Non-interactive mode must never prompt
    if options.non_interactive {
        return select_non_interactive_port(selection_ports, config);
    }

    if selection_ports.len() > 1 {
        ensure_interactive_terminal()?;
        return select_port_interactive(selection_ports, config);
    }

    let Some(port) = selection_ports.into_iter().next() else {
        return Err(usage_err("No serial ports available"));
    };
    let is_known = is_known_device(&port, config);

    if is_known && !options.confirm_port {
        info!("Auto-selected port: {} [{}]", port.name, port.bridge().name());
        Ok(SelectedPort { port, is_known })
    } else {
        ensure_interactive_terminal()?;
        confirm_single_port(port, is_known)
    }
}

fn ensure_interactive_terminal() -> Result<()> {
    if std::io::stdin().is_terminal() && std::io::stderr().is_terminal() {
        Ok(())
    } else {
        Err(usage_err(
            "Port selection needs an interactive terminal; pass --port or set CC2538FLASH_PORT",
        ))
    }
}

fn map_prompt_error(err: DialoguerError) -> anyhow::Error {
    match err {
        DialoguerError::IO(io_err) => {
            if io_err.kind() == std::io::ErrorKind::Interrupted {
                cancelled()
            } else {
                usage_err(&format!("Prompt failed: {io_err}"))
            }
        },
    }
}

/// Find a port by name, falling back to a bare entry for ports the
/// enumerator does not report.
fn find_port_by_name(name: &str, config: &Config) -> SelectedPort {
    let ports = detect_ports();

    let found = ports
        .iter()
        .find(|p| p.name == name)
        .or_else(|| ports.iter().find(|p| p.name.eq_ignore_ascii_case(name)));

    if let Some(port) = found {
        return SelectedPort {
            port: port.clone(),
            is_known: is_known_device(port, config),
        };
    }

    SelectedPort {
        port: PortInfo {
            name: name.to_string(),
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
            serial_number: None,
        },
        is_known: false,
    }
}

/// Check if a port sits behind a known bridge (built-in list or config).
fn is_known_device(port: &PortInfo, config: &Config) -> bool {
    if port.bridge().is_known() {
        return true;
    }

    match (port.vid, port.pid) {
        (Some(vid), Some(pid)) => config.port.usb_device.iter().any(|d| d.matches(vid, pid)),
        _ => false,
    }
}

/// Display label for a port in the selection list.
fn port_label(port: &PortInfo, config: &Config) -> String {
    let name = if is_known_device(port, config) {
        style(&port.name).bold().to_string()
    } else {
        port.name.clone()
    };

    let bridge = port.bridge();
    let device_info = if bridge.is_known() {
        format!(" [{}]", style(bridge.name()).yellow())
    } else if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
        format!(" ({vid:04X}:{pid:04X})")
    } else {
        String::new()
    };

    let product = port
        .product
        .as_ref()
        .map(|p| format!(" - {}", style(p).dim()))
        .unwrap_or_default();

    format!("{name}{device_info}{product}")
}

/// Interactive port selection.
fn select_port_interactive(mut ports: Vec<PortInfo>, config: &Config) -> Result<SelectedPort> {
    eprintln!("{} Found {} serial ports", style("ℹ").blue(), ports.len());
    eprintln!("{}", style("Bold entries are recognised CC2538 board bridges").dim());

    ports.sort_by_key(|p| !is_known_device(p, config));

    // Truncate labels to fit terminal width to prevent wrapping in narrow
    // terminals.
    let term_width = console::Term::stderr().size().1 as usize;
    let max_item_width = term_width.saturating_sub(4);
    let labels: Vec<String> = ports
        .iter()
        .map(|p| console::truncate_str(&port_label(p, config), max_item_width, "\u{2026}").into_owned())
        .collect();

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select a serial port")
        .items(&labels)
        .default(0)
        .interact_opt()
        .map_err(map_prompt_error)?;

    let Some(index) = selection else {
        return Err(cancelled());
    };
    let port = ports
        .into_iter()
        .nth(index)
        .ok_or_else(|| anyhow::anyhow!("Invalid port index: {index}"))?;
    let is_known = is_known_device(&port, config);
    Ok(SelectedPort { port, is_known })
}

/// Confirm use of a single port.
fn confirm_single_port(port: PortInfo, is_known: bool) -> Result<SelectedPort> {
    let product_info = port
        .product
        .as_ref()
        .map(|p| format!(" - {p}"))
        .unwrap_or_default();

    let confirmed = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Use {}{product_info}?", port.name))
        .default(true)
        .interact_opt()
        .map_err(map_prompt_error)?
        .unwrap_or(false);

    if confirmed {
        Ok(SelectedPort { port, is_known })
    } else {
        Err(cancelled())
    }
}

/// Ask user if they want to remember this port's USB bridge.
pub fn ask_remember_port(port: &PortInfo, config: &mut Config) -> Result<()> {
    let (Some(vid), Some(pid)) = (port.vid, port.pid) else {
        return Ok(());
    };
    if config.port.usb_device.iter().any(|d| d.matches(vid, pid)) {
        return Ok(());
    }

    let confirmed = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Remember USB device {vid:04X}:{pid:04X} for auto-selection?"))
        .default(false)
        .interact_opt()
        .map_err(map_prompt_error)?
        .unwrap_or(false);

    if confirmed {
        if let Err(e) = config.remember_usb_device(vid, pid) {
            error!("Failed to save port configuration: {e}");
        }
    }

    Ok(())
}
