//! PCI addresses and card identifiers

use crate::error::{Result, RocError};
use std::fmt;
use std::str::FromStr;

/// PCI address of a card function: `bus:device.function`
///
/// Components are range-checked against their field widths
/// (bus 8 bits, device 5 bits, function 3 bits) at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PciAddress {
    bus: u8,
    device: u8,
    function: u8,
}

impl PciAddress {
    /// Largest bus number (8 bits)
    pub const BUS_MAX: u32 = 0xff;
    /// Largest device number (5 bits)
    pub const DEVICE_MAX: u32 = 0x1f;
    /// Largest function number (3 bits)
    pub const FUNCTION_MAX: u32 = 0x7;

    /// Create an address, validating every component
    ///
    /// # Errors
    ///
    /// Returns `RocError::Configuration` if a component exceeds its field width.
    pub fn new(bus: u32, device: u32, function: u32) -> Result<Self> {
        let check = |name: &str, value: u32, max: u32| -> Result<u8> {
            if value > max {
                return Err(RocError::configuration(
                    "PciAddress",
                    format!("{name} {value:#x} out of range (max {max:#x})"),
                ));
            }
            // Every max fits in u8
            #[allow(clippy::cast_possible_truncation)]
            Ok(value as u8)
        };

        Ok(Self {
            bus: check("bus", bus, Self::BUS_MAX)?,
            device: check("device", device, Self::DEVICE_MAX)?,
            function: check("function", function, Self::FUNCTION_MAX)?,
        })
    }

    /// Bus number
    #[must_use]
    pub const fn bus(&self) -> u8 {
        self.bus
    }

    /// Device (slot) number
    #[must_use]
    pub const fn device(&self) -> u8 {
        self.device
    }

    /// Function number
    #[must_use]
    pub const fn function(&self) -> u8 {
        self.function
    }

    /// Parse a sysfs device directory name (`dddd:bb:dd.f`)
    ///
    /// The PCI domain is accepted but not kept.
    ///
    /// # Errors
    ///
    /// Returns `RocError::Parse` on malformed names, `RocError::Configuration`
    /// on out-of-range components.
    pub fn from_sysfs_name(name: &str) -> Result<Self> {
        let (domain, rest) = name
            .split_once(':')
            .ok_or_else(|| RocError::parse(name, "expected domain:bus:device.function"))?;

        u16::from_str_radix(domain, 16)
            .map_err(|e| RocError::parse(name, format!("invalid PCI domain {domain:?}: {e}")))?;

        rest.parse()
    }

    /// Sysfs device directory name in PCI domain 0
    #[must_use]
    pub fn sysfs_name(&self) -> String {
        format!("0000:{self}")
    }
}

impl fmt::Display for PciAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}:{:02x}.{:x}", self.bus, self.device, self.function)
    }
}

impl FromStr for PciAddress {
    type Err = RocError;

    /// Parse `bus:device.function`, hexadecimal components as printed by lspci
    fn from_str(s: &str) -> Result<Self> {
        let syntax = || RocError::parse(s, "expected PCI address bus:device.function");

        let (bus, rest) = s.split_once(':').ok_or_else(syntax)?;
        let (device, function) = rest.split_once('.').ok_or_else(syntax)?;

        let component = |name: &str, text: &str| -> Result<u32> {
            u32::from_str_radix(text.trim(), 16)
                .map_err(|e| RocError::parse(s, format!("invalid {name} {text:?}: {e}")))
        };

        Self::new(
            component("bus", bus)?,
            component("device", device)?,
            component("function", function)?,
        )
    }
}

/// Card identifier: serial number or PCI address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardId {
    /// Serial number of the card
    Serial(i32),
    /// PCI address of the card
    Address(PciAddress),
}

impl From<PciAddress> for CardId {
    fn from(address: PciAddress) -> Self {
        Self::Address(address)
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial(serial) => write!(f, "{serial}"),
            Self::Address(address) => write!(f, "{address}"),
        }
    }
}

impl FromStr for CardId {
    type Err = RocError;

    /// Parse either a decimal serial number (`"12345"`) or a PCI address
    /// (`"42:0.0"`)
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();

        if trimmed.contains(':') {
            return trimmed.parse().map(Self::Address);
        }

        trimmed.parse::<i32>().map(Self::Serial).map_err(|e| {
            RocError::parse(
                s,
                format!("expected serial number or PCI address bus:device.function ({e})"),
            )
        })
    }
}
