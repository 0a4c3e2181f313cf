//! `roc`: command-line tools for C-RORC and CRU readout cards.
//!
//! ```text
//! USAGE:
//!   roc list-cards                                   List installed cards
//!   roc reg-read --id <card> --address <a>           Read one register
//!   roc reg-write --id <card> --address <a> --value <v> [--no-read]
//!   roc reg-read-range --id <card> --address <a> --range <n> [--file <path>]
//!   roc info --id <card>                             Serial, temperature, firmware
//!   roc set-links --id <card> --links <mask>         Enable CRU links (e.g. 0-11,16)
//!   roc generator --id <card> [--pattern p] [--size n] [--random-size] [--disable]
//!   roc sca-init --id <card>                         SCA handshake + GPIO enable
//!   roc sca-gpio-read --id <card>
//!   roc sca-gpio-write --id <card> --value <v>
//! ```
//!
//! `<card>` is a serial number (`12345`) or a PCI address (`42:0.0`).
//! `--channel` selects the BAR; register tools default to BAR 0, the others
//! to the card's board-support BAR.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use roc_chip::bar::{CRORC_FLASH_BAR, CRU_BSP_BAR};
use roc_driver::cru::DataSource;
use roc_driver::{
    CardBar, CardId, CardType, DeviceFinder, GeneratorPattern, LinkMask, MmapRegion, Parameters,
    PciAccess, RegisterReadWrite, ResolvedCard, RocError, Session, SysfsDevice, SysfsPci,
};
use std::fmt::Display;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "roc", about = "C-RORC / CRU readout card tools", version)]
struct Cli {
    /// Log driver activity at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Args)]
struct CardArgs {
    /// Card serial number (e.g. 12345) or PCI address (e.g. 42:0.0).
    #[arg(long)]
    id: CardId,

    /// Channel number, used as the BAR index.
    #[arg(long)]
    channel: Option<i32>,
}

impl CardArgs {
    fn parameters(&self, default_channel: usize) -> Result<Parameters> {
        let channel = match self.channel {
            Some(channel) => channel,
            None => i32::try_from(default_channel)?,
        };
        Ok(Parameters::make_parameters(self.id, channel))
    }
}

#[derive(Subcommand)]
enum Cmd {
    /// List installed readout cards.
    ListCards,
    /// Read a register.
    RegRead {
        #[command(flatten)]
        card: CardArgs,
        /// Register byte address (0x-prefixed hex or decimal).
        #[arg(long, value_parser = parse_u32)]
        address: u32,
    },
    /// Write a register, then read it back.
    RegWrite {
        #[command(flatten)]
        card: CardArgs,
        /// Register byte address (0x-prefixed hex or decimal).
        #[arg(long, value_parser = parse_u32)]
        address: u32,
        /// Value to write (0x-prefixed hex or decimal).
        #[arg(long, value_parser = parse_u32)]
        value: u32,
        /// Do not read the register back.
        #[arg(long)]
        no_read: bool,
    },
    /// Read a range of consecutive registers.
    RegReadRange {
        #[command(flatten)]
        card: CardArgs,
        /// Byte address of the first register (0x-prefixed hex or decimal).
        #[arg(long, value_parser = parse_u32)]
        address: u32,
        /// Number of registers to read.
        #[arg(long)]
        range: usize,
        /// Write the values to this file as little-endian words instead of printing.
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Print serial number, temperature, firmware and link information.
    Info {
        #[command(flatten)]
        card: CardArgs,
    },
    /// Enable exactly the given CRU links.
    SetLinks {
        #[command(flatten)]
        card: CardArgs,
        /// Link mask, e.g. "0-11,16".
        #[arg(long, value_parser = parse_link_mask)]
        links: LinkMask,
    },
    /// Configure the CRU data generator.
    Generator {
        #[command(flatten)]
        card: CardArgs,
        /// Pattern: constant, alternating or incremental.
        #[arg(long, default_value = "incremental")]
        pattern: GeneratorPattern,
        /// Generated page size in bytes (multiple of 32, 32 to 8192).
        #[arg(long, default_value_t = 8192)]
        size: usize,
        /// Vary the page size randomly.
        #[arg(long)]
        random_size: bool,
        /// Stop the generator instead of starting it.
        #[arg(long)]
        disable: bool,
        /// Inject one error into the generated data.
        #[arg(long)]
        inject_error: bool,
    },
    /// Initialize the SCA and enable its GPIO channel.
    ScaInit {
        #[command(flatten)]
        card: CardArgs,
    },
    /// Read the SCA GPIO register.
    ScaGpioRead {
        #[command(flatten)]
        card: CardArgs,
    },
    /// Write the SCA GPIO outputs.
    ScaGpioWrite {
        #[command(flatten)]
        card: CardArgs,
        /// Output value (0x-prefixed hex or decimal).
        #[arg(long, value_parser = parse_u32)]
        value: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "warn,roc_driver=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    let finder = DeviceFinder::new(SysfsPci::new());

    match cli.command {
        Cmd::ListCards => cmd_list_cards(&finder)?,
        Cmd::RegRead { card, address } => cmd_reg_read(&finder, &card, address)?,
        Cmd::RegWrite {
            card,
            address,
            value,
            no_read,
        } => cmd_reg_write(&finder, &card, address, value, no_read)?,
        Cmd::RegReadRange {
            card,
            address,
            range,
            file,
        } => cmd_reg_read_range(&finder, &card, address, range, file.as_deref())?,
        Cmd::Info { card } => cmd_info(&finder, &card)?,
        Cmd::SetLinks { card, links } => cmd_set_links(&finder, &card, links)?,
        Cmd::Generator {
            card,
            pattern,
            size,
            random_size,
            disable,
            inject_error,
        } => {
            let mut parameters = card.parameters(CRU_BSP_BAR)?;
            parameters
                .set_generator_pattern(pattern)
                .set_generator_data_size(size)
                .set_generator_random_size_enabled(random_size)
                .set_generator_enabled(!disable);
            cmd_generator(&finder, &parameters, inject_error)?;
        }
        Cmd::ScaInit { card } => cmd_sca_init(&finder, &card)?,
        Cmd::ScaGpioRead { card } => cmd_sca_gpio_read(&finder, &card)?,
        Cmd::ScaGpioWrite { card, value } => cmd_sca_gpio_write(&finder, &card, value)?,
    }

    Ok(())
}

/// `0x`-prefixed hex or decimal
fn parse_u32(s: &str) -> std::result::Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid number {s:?}: {e}"))
}

fn parse_link_mask(s: &str) -> std::result::Result<LinkMask, RocError> {
    Parameters::link_mask_from_string(s)
}

fn register_index(address: u32) -> Result<usize> {
    if address % 4 != 0 {
        bail!("address {address:#x} is not 32-bit aligned");
    }
    Ok(roc_chip::word_index(address))
}

fn or_na<T: Display>(value: Option<T>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| v.to_string())
}

type Finder = DeviceFinder<SysfsPci>;

fn open(finder: &Finder, card: &CardArgs, default_channel: usize) -> Result<Session<MmapRegion>> {
    let parameters = card.parameters(default_channel)?;
    Session::open(finder, &parameters).with_context(|| format!("Cannot open card {}", card.id))
}

/// Word indices `address / 4 ..` for `range` registers
fn register_range(address: u32, range: usize) -> Result<Range<usize>> {
    let first = register_index(address)?;
    // Every index must also convert back to a byte address
    let end = first
        .checked_add(range)
        .filter(|end| end.checked_mul(4).is_some())
        .with_context(|| format!("{range} registers from {address:#x} overflow the address space"))?;
    Ok(first..end)
}

/// Board-support BAR of a card family
const fn bsp_bar(card_type: CardType) -> usize {
    match card_type {
        CardType::Crorc => CRORC_FLASH_BAR,
        CardType::Cru | CardType::Unknown => CRU_BSP_BAR,
    }
}

fn cmd_list_cards(finder: &Finder) -> Result<()> {
    let cards = finder.find_all_resolved()?;

    println!(
        "{:<3} {:<6} {:<8} {:<7} {:<7} {:<5} {:<8} {:<26} {}",
        "#", "Type", "PCI Addr", "Vendor", "Device", "NUMA", "Serial", "Firmware", "Card ID"
    );
    println!("{}", "-".repeat(96));

    for (index, resolved) in cards.iter().enumerate() {
        let card = &resolved.descriptor;
        let (firmware, card_id) = bsp_strings(finder, resolved).unwrap_or_else(|e| {
            tracing::debug!("No firmware info for {}: {e}", card.pci_address());
            (None, None)
        });

        println!(
            "{:<3} {:<6} {:<8} 0x{:04x}  0x{:04x}  {:<5} {:<8} {:<26} {}",
            index,
            card.card_type(),
            card.pci_address(),
            card.pci_id().vendor,
            card.pci_id().device,
            card.numa_node(),
            or_na(card.serial_number()),
            or_na(firmware),
            or_na(card_id)
        );
    }

    println!();
    println!("Found {} card(s)", cards.len());
    Ok(())
}

/// Firmware info and FPGA chip ID, read through BAR 2 of a CRU
fn bsp_strings(
    finder: &Finder,
    card: &ResolvedCard<SysfsDevice>,
) -> Result<(Option<String>, Option<String>)> {
    let card_type = card.descriptor.card_type();
    if card_type != CardType::Cru {
        return Ok((None, None));
    }

    let mut window = finder.pci().map_bar(&card.handle, CRU_BSP_BAR)?;
    let bar = CardBar::new(&mut window, card_type)?;
    Ok((bar.firmware_info()?, bar.card_id()?))
}

fn cmd_reg_read(finder: &Finder, card: &CardArgs, address: u32) -> Result<()> {
    let index = register_index(address)?;
    let mut session = open(finder, card, 0)?;
    let value = session.bar().read_register(index)?;
    println!("0x{value:08x}");
    Ok(())
}

fn cmd_reg_write(
    finder: &Finder,
    card: &CardArgs,
    address: u32,
    value: u32,
    no_read: bool,
) -> Result<()> {
    let index = register_index(address)?;
    let mut session = open(finder, card, 0)?;
    let mut bar = session.bar();

    bar.write_register(index, value)?;
    if no_read {
        println!("Done!");
    } else {
        println!("0x{:08x}", bar.read_register(index)?);
    }
    Ok(())
}

fn cmd_reg_read_range(
    finder: &Finder,
    card: &CardArgs,
    address: u32,
    range: usize,
    file: Option<&Path>,
) -> Result<()> {
    let indices = register_range(address, range)?;
    let mut session = open(finder, card, 0)?;
    let bar = session.bar();

    let values = indices
        .clone()
        .map(|index| bar.read_register(index))
        .collect::<roc_driver::Result<Vec<u32>>>()?;

    if let Some(path) = file {
        let words: Vec<u32> = values.iter().map(|value| value.to_le()).collect();
        std::fs::write(path, bytemuck::cast_slice::<u32, u8>(&words))
            .with_context(|| format!("Cannot write {}", path.display()))?;
        println!("Wrote {range} register(s) to {}", path.display());
        return Ok(());
    }

    for (index, value) in indices.zip(&values) {
        println!("0x{:08x}  0x{value:08x}", index * 4);
    }
    Ok(())
}

fn cmd_info(finder: &Finder, card: &CardArgs) -> Result<()> {
    let resolved = finder.resolve(&card.id)?;
    let bar_index = match card.channel {
        Some(channel) => usize::try_from(channel)
            .with_context(|| format!("Channel {channel} is not a valid BAR index"))?,
        None => bsp_bar(resolved.descriptor.card_type()),
    };
    let mut session = Session::map(finder.pci(), resolved, bar_index)
        .with_context(|| format!("Cannot open card {}", card.id))?;
    let descriptor = session.descriptor().clone();

    println!("Card type    : {}", descriptor.card_type());
    println!("PCI address  : {}", descriptor.pci_address());
    println!("PCI ID       : {}", descriptor.pci_id());
    println!("NUMA node    : {}", descriptor.numa_node());

    let mut bar = session.card_bar()?;
    println!("Serial       : {}", or_na(bar.serial()?));
    println!(
        "Temperature  : {}",
        or_na(bar.temperature()?.map(|t| format!("{t:.1} °C")))
    );
    println!("Firmware     : {}", or_na(bar.firmware_info()?));
    println!("Card ID      : {}", or_na(bar.card_id()?));
    println!("Links        : {}", or_na(bar.links()?));
    println!("Dropped pkts : {}", or_na(bar.dropped_packets()?));

    if let CardBar::Cru(cru) = &bar {
        println!("CTP clock    : {} Hz", cru.ctp_clock()?);
        println!("Local clock  : {} Hz", cru.local_clock()?);
        let features = cru.firmware_features()?;
        println!(
            "Mode         : {}",
            if features.standalone { "standalone" } else { "integrated" }
        );
    }

    Ok(())
}

fn cmd_set_links(finder: &Finder, card: &CardArgs, links: LinkMask) -> Result<()> {
    let mut parameters = card.parameters(CRU_BSP_BAR)?;
    parameters.set_link_mask(links);

    let mut session = Session::open(finder, &parameters)?;
    let CardBar::Cru(mut cru) = session.card_bar()? else {
        bail!("Link enable is only available on the CRU");
    };
    cru.set_links_enabled(&parameters.link_mask_required()?)?;
    println!("Done!");
    Ok(())
}

fn cmd_generator(finder: &Finder, parameters: &Parameters, inject_error: bool) -> Result<()> {
    let mut session = Session::open(finder, parameters)?;
    let CardBar::Cru(mut cru) = session.card_bar()? else {
        bail!("Generator control is only available on the CRU");
    };

    let enabled = parameters.generator_enabled_required()?;
    if enabled {
        cru.set_data_generator_pattern(
            parameters.generator_pattern_required()?,
            parameters.generator_data_size_required()?,
            parameters.generator_random_size_enabled_required()?,
        )?;
        cru.reset_data_generator_counter()?;
        if cru.firmware_features()?.data_selection {
            cru.set_data_source(DataSource::Internal)?;
        }
    }
    cru.set_data_generator_enabled(enabled)?;

    if inject_error {
        cru.data_generator_inject_error()?;
    }

    println!("Done!");
    Ok(())
}

fn cmd_sca_init(finder: &Finder, card: &CardArgs) -> Result<()> {
    let mut session = open(finder, card, CRU_BSP_BAR)?;
    let mut sca = session.sca();
    sca.initialize()?;
    tracing::debug!("SCA transaction took {} ns", sca.time()?);
    println!("Done!");
    Ok(())
}

fn cmd_sca_gpio_read(finder: &Finder, card: &CardArgs) -> Result<()> {
    let mut session = open(finder, card, CRU_BSP_BAR)?;
    let result = session.sca().gpio_read()?;
    println!("{result}");
    Ok(())
}

fn cmd_sca_gpio_write(finder: &Finder, card: &CardArgs, value: u32) -> Result<()> {
    let mut session = open(finder, card, CRU_BSP_BAR)?;
    let result = session.sca().gpio_write(value)?;
    println!("{result}");
    Ok(())
}
