//! Command implementations.
//!
//! Each subcommand group is implemented in its own module; this module holds
//! the session setup they share.

pub(crate) mod device;
pub(crate) mod flash;
pub(crate) mod ports;

use {
    crate::{Cli, CliError, config::Config, get_baud, get_port, was_interrupted},
    anyhow::{Context, Result},
    cc2538flash::{
        Bootloader, ControlLines, DiagnosticSink, LogDiagnostics, NativePort, SerialConfig, SessionConfig,
    },
    console::style,
    log::debug,
};

pub(crate) fn ensure_not_interrupted() -> Result<()> {
    if was_interrupted() {
        Err(CliError::Cancelled("Interrupted".to_string()).into())
    } else {
        Ok(())
    }
}

/// Select a port, open it and synchronise with the bootloader.
///
/// `-vvv` routes the raw wire trace into the log.
pub(crate) fn connect(cli: &Cli, config: &mut Config) -> Result<Bootloader<NativePort>> {
    let port = get_port(cli, config)?;
    let baud = get_baud(cli, config);
    if !cli.quiet {
        eprintln!("{} Using port {} at {} baud", style("🔌").cyan(), port, baud);
    }

    let mut session = SessionConfig::default();
    if cli.verbose >= 3 {
        session = session.with_diagnostics(DiagnosticSink::new(LogDiagnostics));
    }

    let mut bootloader = Bootloader::open_with(&SerialConfig::new(&port, baud), session)
        .with_context(|| format!("Failed to open serial port {port}"))?;
    ensure_not_interrupted()?;

    if cli.enter_bootloader {
        let lines = ControlLines {
            active_high: cli.active_high,
            inverted: cli.invert_lines,
        };
        bootloader
            .enter_bootloader(lines)
            .context("Failed to reset into the bootloader through DTR/RTS")?;
    }

    if !cli.quiet {
        eprintln!("{} Waiting for bootloader...", style("⏳").yellow());
    }
    bootloader
        .sync()
        .context("Bootloader did not answer the sync preamble; is the chip in bootloader mode?")?;
    if !cli.quiet {
        eprintln!("{} Connected", style("✓").green());
    }

    Ok(bootloader)
}

/// Release the port; failures only matter to the log.
pub(crate) fn disconnect(bootloader: Bootloader<NativePort>) {
    if let Err(e) = bootloader.close() {
        debug!("Failed to close port cleanly: {e}");
    }
}
