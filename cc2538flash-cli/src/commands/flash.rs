//! Flash and erase command implementations.

use {
    super::{connect, disconnect, ensure_not_interrupted},
    crate::{Cli, CliError, config::Config, interrupt_flag, use_fancy_output},
    anyhow::{Context, Result},
    cc2538flash::{DEFAULT_MAX_CHUNK_RETRIES, FlashOptions, target},
    console::style,
    indicatif::{ProgressBar, ProgressStyle},
    log::warn,
    std::{fs, path::Path},
};

/// Flash switches that can also come from the config file.
pub(crate) struct FlashArgs {
    pub erase: bool,
    pub no_verify: bool,
    pub max_retries: Option<u32>,
}

/// Effective flash settings after applying config defaults.
#[derive(Debug, PartialEq, Eq)]
struct FlashPlan {
    erase: bool,
    verify: bool,
    max_chunk_retries: u32,
}

impl FlashPlan {
    fn resolve(args: &FlashArgs, config: &Config) -> Self {
        Self {
            erase: args.erase || config.flash.erase.unwrap_or(false),
            verify: !args.no_verify && config.flash.verify.unwrap_or(true),
            max_chunk_retries: args
                .max_retries
                .or(config.flash.max_chunk_retries)
                .unwrap_or(DEFAULT_MAX_CHUNK_RETRIES),
        }
    }
}

/// Reject regions outside flash; warn when the CCA page is touched.
fn check_flash_region(address: u32, length: u32) -> Result<()> {
    if !target::in_flash(address, length) {
        return Err(CliError::Usage(format!(
            "Region 0x{address:08X}+0x{length:X} lies outside flash (0x{:08X}..0x{:08X})",
            target::FLASH_BASE_ADDR,
            u64::from(target::FLASH_BASE_ADDR) + u64::from(target::FLASH_SIZE)
        ))
        .into());
    }
    if target::contains_cca(address, length) {
        warn!(
            "Region overlaps the CCA page at 0x{:08X}; a bad CCA can lock out the bootloader",
            target::CCA_BASE_ADDR
        );
    }
    Ok(())
}

fn progress_bar(cli: &Cli, total: u64) -> ProgressBar {
    if cli.quiet || !use_fancy_output() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    #[allow(clippy::unwrap_used)] // Static template string
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
    pb
}

/// Flash command implementation.
pub(crate) fn cmd_flash(cli: &Cli, config: &mut Config, file: &Path, address: u32, args: &FlashArgs) -> Result<()> {
    let image = fs::read(file).with_context(|| format!("Failed to read image {}", file.display()))?;
    let length = u32::try_from(image.len())
        .map_err(|_| CliError::Usage(format!("Image {} is larger than flash", file.display())))?;
    check_flash_region(address, length)?;

    let plan = FlashPlan::resolve(args, config);
    if !cli.quiet {
        eprintln!(
            "{} {} ({} bytes) @ 0x{:08X}",
            style("📦").cyan(),
            file.display(),
            image.len(),
            address
        );
    }

    let mut bootloader = connect(cli, config)?;
    if let Err(err) = ensure_not_interrupted() {
        disconnect(bootloader);
        return Err(err);
    }

    let pb = progress_bar(cli, image.len() as u64);
    pb.set_message("Writing");

    let options = FlashOptions::default()
        .with_max_chunk_retries(plan.max_chunk_retries)
        .with_interrupt(interrupt_flag());
    let result = bootloader.write_flash(address, &image, &options, plan.erase, plan.verify, |done, _| {
        pb.set_position(done as u64);
    });
    disconnect(bootloader);

    let report = match result {
        Ok(report) => report,
        Err(err) => {
            pb.abandon();
            return Err(err).context("Flashing failed");
        },
    };
    pb.finish_with_message("Complete");

    if !cli.quiet {
        if report.retries > 0 {
            eprintln!(
                "{} {} chunk retries after flash failures",
                style("⚠").yellow(),
                report.retries
            );
        }
        if plan.verify && !image.is_empty() {
            eprintln!("{} CRC32 verified", style("✓").green());
        }
        eprintln!(
            "\n{} Wrote {} bytes in {} chunks",
            style("🎉").green().bold(),
            image.len(),
            report.chunks
        );
    }

    Ok(())
}

/// Page-aligned erase range covering `length` bytes at `address`.
fn erase_range(address: u32, length: u32) -> Result<(u32, u32)> {
    if length == 0 {
        return Err(CliError::Usage("Erase length must be greater than zero".to_string()).into());
    }
    check_flash_region(address, length)?;
    Ok(target::page_align(address, length))
}

/// Erase command implementation. The range is widened to whole pages.
pub(crate) fn cmd_erase(cli: &Cli, config: &mut Config, address: u32, length: u32) -> Result<()> {
    let (start, span) = erase_range(address, length)?;

    let mut bootloader = connect(cli, config)?;
    if !cli.quiet {
        eprintln!(
            "{} Erasing {} pages at 0x{start:08X}",
            style("🗑").red(),
            span / target::FLASH_PAGE_SIZE
        );
    }
    let result = bootloader
        .erase(start, span)
        .with_context(|| format!("Failed to erase 0x{span:X} bytes at 0x{start:08X}"));
    disconnect(bootloader);
    result?;

    if !cli.quiet {
        eprintln!("\n{} Erase completed", style("✓").green().bold());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(erase: bool, no_verify: bool, max_retries: Option<u32>) -> FlashArgs {
        FlashArgs {
            erase,
            no_verify,
            max_retries,
        }
    }

    #[test]
    fn test_plan_defaults() {
        let plan = FlashPlan::resolve(&args(false, false, None), &Config::default());
        assert_eq!(
            plan,
            FlashPlan {
                erase: false,
                verify: true,
                max_chunk_retries: DEFAULT_MAX_CHUNK_RETRIES,
            }
        );
    }

    #[test]
    fn test_plan_config_then_flags() {
        let mut config = Config::default();
        config.flash.erase = Some(true);
        config.flash.verify = Some(false);
        config.flash.max_chunk_retries = Some(7);

        let plan = FlashPlan::resolve(&args(false, false, None), &config);
        assert!(plan.erase);
        assert!(!plan.verify);
        assert_eq!(plan.max_chunk_retries, 7);

        let plan = FlashPlan::resolve(&args(false, false, Some(1)), &config);
        assert_eq!(plan.max_chunk_retries, 1);
    }

    #[test]
    fn test_plan_no_verify_wins_over_config() {
        let mut config = Config::default();
        config.flash.verify = Some(true);
        assert!(!FlashPlan::resolve(&args(false, true, None), &config).verify);
    }

    #[test]
    fn test_check_flash_region() {
        assert!(check_flash_region(target::FLASH_BASE_ADDR, 0x1000).is_ok());
        assert!(check_flash_region(target::CCA_BASE_ADDR, target::FLASH_PAGE_SIZE).is_ok());

        let err = check_flash_region(0x0010_0000, 16).unwrap_err();
        assert!(matches!(err.downcast_ref::<CliError>(), Some(CliError::Usage(_))));

        let end = target::FLASH_BASE_ADDR + target::FLASH_SIZE;
        assert!(check_flash_region(end - 4, 8).is_err());
    }

    #[test]
    fn test_erase_range_rejects_zero_length() {
        let err = erase_range(target::FLASH_BASE_ADDR, 0).unwrap_err();
        assert!(matches!(err.downcast_ref::<CliError>(), Some(CliError::Usage(_))));

        let (start, span) = erase_range(target::FLASH_BASE_ADDR + 10, 1).unwrap();
        assert_eq!((start, span), (target::FLASH_BASE_ADDR, target::FLASH_PAGE_SIZE));
    }

    #[test]
    fn test_erase_all_range_skips_cca() {
        let length = target::CCA_BASE_ADDR - target::FLASH_BASE_ADDR;
        let (start, span) = target::page_align(target::FLASH_BASE_ADDR, length);
        assert_eq!(start, target::FLASH_BASE_ADDR);
        assert_eq!(span / target::FLASH_PAGE_SIZE, target::NUM_FLASH_PAGES - 1);
        assert!(!target::contains_cca(start, span));
    }
}
