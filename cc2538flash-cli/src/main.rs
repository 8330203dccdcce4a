//! cc2538flash CLI - Command-line tool for flashing TI CC2538 chips.
//!
//! ## Features
//!
//! - Write raw binary images to flash with CRC32 verification
//! - Erase flash ranges while keeping the CCA page intact
//! - Read device identity, memory words and flash CRCs
//! - Interactive serial port selection
//! - Environment variable and config file support

use {
    anyhow::Result,
    cc2538flash::{ReadWidth, target},
    clap::{Parser, Subcommand, ValueEnum},
    console::style,
    env_logger::Env,
    log::debug,
    std::{
        env,
        path::PathBuf,
        process::ExitCode,
        sync::{
            Arc, LazyLock,
            atomic::{AtomicBool, Ordering},
        },
    },
};

mod commands;
mod config;
mod serial;

use {
    config::Config,
    serial::{SerialOptions, ask_remember_port, select_serial_port},
};

/// Default baud rate when neither the command line nor a config file sets one.
const DEFAULT_BAUD: u32 = 115_200;

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: AtomicBool = AtomicBool::new(true);

/// Raised by the Ctrl-C handler and shared with the flash loop.
static INTERRUPTED: LazyLock<Arc<AtomicBool>> = LazyLock::new(|| Arc::new(AtomicBool::new(false)));

/// Check if emoji/animations should be used (TTY and colors enabled).
fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(Ordering::Relaxed) && console::colors_enabled_stderr()
}

/// Whether Ctrl-C was pressed.
fn was_interrupted() -> bool {
    INTERRUPTED.load(Ordering::Relaxed)
}

/// Shared interrupt flag for library operations.
fn interrupt_flag() -> Arc<AtomicBool> {
    Arc::clone(&INTERRUPTED)
}

/// Errors that carry their own exit code.
#[derive(Debug, thiserror::Error)]
enum CliError {
    /// Bad or missing arguments, or an environment that cannot satisfy them.
    #[error("{0}")]
    Usage(String),
    /// The user cancelled a prompt or pressed Ctrl-C.
    #[error("{0}")]
    Cancelled(String),
}

/// cc2538flash - Flash TI CC2538 chips through the ROM serial bootloader.
///
/// Environment variables:
///   CC2538FLASH_PORT              - Default serial port
///   CC2538FLASH_BAUD              - Default baud rate (default: 115200)
///   CC2538FLASH_NON_INTERACTIVE   - Non-interactive mode (disable prompts)
#[derive(Parser)]
#[command(name = "cc2538flash")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = "Examples:
  cc2538flash list-ports
  cc2538flash -p /dev/ttyUSB0 info
  cc2538flash -p /dev/ttyUSB0 flash firmware.bin --erase
  cc2538flash erase --address 0x00200000 --length 0x8000")]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Serial port to use (auto-detected if not specified).
    #[arg(short, long, global = true, env = "CC2538FLASH_PORT")]
    port: Option<String>,

    /// Baud rate (default: 115200).
    #[arg(short, long, global = true, env = "CC2538FLASH_BAUD")]
    baud: Option<u32>,

    /// Verbose output level (-v, -vv, -vvv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Non-interactive mode (fail instead of prompting).
    #[arg(long, global = true, env = "CC2538FLASH_NON_INTERACTIVE")]
    non_interactive: bool,

    /// Confirm port selection even for auto-detected ports.
    #[arg(long, global = true)]
    confirm_port: bool,

    /// Offer all ports for selection (including unknown bridges).
    #[arg(long, global = true)]
    list_all_ports: bool,

    /// Reset into the bootloader via DTR (backdoor pin) and RTS (reset) first.
    #[arg(long, global = true)]
    enter_bootloader: bool,

    /// The backdoor pin is active high (with --enter-bootloader).
    #[arg(long, global = true, requires = "enter_bootloader")]
    active_high: bool,

    /// Swap the lines: backdoor on RTS, reset on DTR (with --enter-bootloader).
    #[arg(long, global = true, requires = "enter_bootloader")]
    invert_lines: bool,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Memory read width.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Width {
    /// Single byte.
    Byte,
    /// 32-bit word.
    Word,
}

impl From<Width> for ReadWidth {
    fn from(width: Width) -> Self {
        match width {
            Width::Byte => ReadWidth::Byte,
            Width::Word => ReadWidth::Word,
        }
    }
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Check that the bootloader responds.
    Ping,

    /// Show chip id, IEEE address and die configuration.
    Info {
        /// Output information as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Write a raw binary image to flash.
    Flash {
        /// Binary image to write.
        file: PathBuf,

        /// Flash address for the image.
        #[arg(short, long, value_parser = parse_hex_u32, default_value = "0x00200000")]
        address: u32,

        /// Erase the covered flash pages first.
        #[arg(long)]
        erase: bool,

        /// Skip CRC32 verification after writing.
        #[arg(long)]
        no_verify: bool,

        /// Re-sends allowed per chunk after a flash failure.
        #[arg(long, value_name = "N")]
        max_retries: Option<u32>,
    },

    /// Erase flash memory.
    Erase {
        /// Start address (rounded down to a page boundary).
        #[arg(short, long, value_parser = parse_hex_u32, requires = "length")]
        address: Option<u32>,

        /// Number of bytes (rounded up to whole pages).
        #[arg(short, long, value_parser = parse_length, requires = "address")]
        length: Option<u32>,

        /// Erase all pages except the CCA page.
        #[arg(long, conflicts_with_all = ["address", "length"])]
        all: bool,
    },

    /// Read a byte or word from device memory.
    Read {
        /// Memory address.
        #[arg(short, long, value_parser = parse_hex_u32)]
        address: u32,

        /// Access width.
        #[arg(short, long, value_enum, default_value_t = Width::Word)]
        width: Width,
    },

    /// Compute the CRC32 of a memory range on the device.
    Crc {
        /// Start address.
        #[arg(short, long, value_parser = parse_hex_u32)]
        address: u32,

        /// Number of bytes.
        #[arg(short, long, value_parser = parse_length)]
        length: u32,
    },

    /// List available serial ports.
    ListPorts {
        /// Output port list as JSON to stdout.
        #[arg(long)]
        json: bool,
    },
}

/// Parse hexadecimal address (supports 0x prefix and underscores).
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let s = s.trim_start_matches("0x").trim_start_matches("0X");
    // Support underscore separators like 0x0020_0000
    let s: String = s.chars().filter(|c| *c != '_').collect();
    u32::from_str_radix(&s, 16).map_err(|e| format!("Invalid hex address: {e}"))
}

/// Parse a byte count: decimal, or hexadecimal with a 0x prefix.
fn parse_length(s: &str) -> Result<u32, String> {
    let s = s.trim();
    if s.starts_with("0x") || s.starts_with("0X") {
        parse_hex_u32(s)
    } else {
        let s: String = s.chars().filter(|c| *c != '_').collect();
        s.parse::<u32>().map_err(|e| format!("Invalid length: {e}"))
    }
}

/// Map an error to the process exit code.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        return match cli_err {
            CliError::Usage(_) => 2,
            CliError::Cancelled(_) => 130,
        };
    }
    if matches!(err.downcast_ref::<cc2538flash::Error>(), Some(cc2538flash::Error::Interrupted)) {
        return 130;
    }
    1
}

fn main() -> ExitCode {
    // --- NO_COLOR and TTY detection ---
    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, Ordering::Relaxed);

    if env::var("NO_COLOR").is_ok() || !stderr_is_tty {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();

    debug!("cc2538flash v{} (verbose level: {})", env!("CARGO_PKG_VERSION"), cli.verbose);

    if let Err(e) = ctrlc::set_handler(|| INTERRUPTED.store(true, Ordering::Relaxed)) {
        debug!("Failed to install Ctrl-C handler: {e}");
    }

    // Load configuration
    let mut config = if let Some(ref path) = cli.config_path {
        Config::load_from_path(path)
    } else {
        Config::load()
    };

    match run(&cli, &mut config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", style("Error:").red().bold());
            ExitCode::from(exit_code_for(&err))
        },
    }
}

fn run(cli: &Cli, config: &mut Config) -> Result<()> {
    match &cli.command {
        Commands::Ping => commands::device::cmd_ping(cli, config),
        Commands::Info { json } => commands::device::cmd_info(cli, config, *json),
        Commands::Flash {
            file,
            address,
            erase,
            no_verify,
            max_retries,
        } => commands::flash::cmd_flash(
            cli,
            config,
            file,
            *address,
            &commands::flash::FlashArgs {
                erase: *erase,
                no_verify: *no_verify,
                max_retries: *max_retries,
            },
        ),
        Commands::Erase { address, length, all } => {
            let range = match (address, length, all) {
                (_, _, true) => (target::FLASH_BASE_ADDR, target::CCA_BASE_ADDR - target::FLASH_BASE_ADDR),
                (Some(address), Some(length), false) => (*address, *length),
                _ => {
                    return Err(
                        CliError::Usage("Specify --all, or --address together with --length".to_string()).into()
                    );
                },
            };
            commands::flash::cmd_erase(cli, config, range.0, range.1)
        },
        Commands::Read { address, width } => commands::device::cmd_read(cli, config, *address, (*width).into()),
        Commands::Crc { address, length } => commands::device::cmd_crc(cli, config, *address, *length),
        Commands::ListPorts { json } => {
            commands::ports::cmd_list_ports(cli, config, *json);
            Ok(())
        },
    }
}

/// Get serial port from CLI args or interactive selection.
fn get_port(cli: &Cli, config: &mut Config) -> Result<String> {
    let options = SerialOptions {
        port: cli.port.clone(),
        list_all_ports: cli.list_all_ports,
        non_interactive: cli.non_interactive,
        confirm_port: cli.confirm_port,
    };

    let selected = select_serial_port(&options, config)?;

    // Ask to remember if not a known device and interactive mode
    if !selected.is_known && !cli.non_interactive {
        ask_remember_port(&selected.port, config)?;
    }

    Ok(selected.port.name)
}

/// Effective baud rate: command line or environment, then config, then default.
fn get_baud(cli: &Cli, config: &Config) -> u32 {
    cli.baud
        .or(config.port.connection.baud)
        .unwrap_or(DEFAULT_BAUD)
}
