//! Card identity types

use crate::parameters::PciAddress;
use std::fmt;

/// Card family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardType {
    /// Not a supported card
    Unknown,
    /// C-RORC
    Crorc,
    /// CRU
    Cru,
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "Unknown"),
            Self::Crorc => write!(f, "CRORC"),
            Self::Cru => write!(f, "CRU"),
        }
    }
}

/// PCI identity pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PciId {
    /// Vendor ID
    pub vendor: u16,
    /// Device ID
    pub device: u16,
}

impl PciId {
    /// Identity pair from vendor and device IDs
    pub const fn new(vendor: u16, device: u16) -> Self {
        Self { vendor, device }
    }
}

impl fmt::Display for PciId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor, self.device)
    }
}

/// Identity of one installed card
///
/// Built by enumeration; immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardDescriptor {
    card_type: CardType,
    serial_number: Option<i32>,
    pci_id: PciId,
    pci_address: PciAddress,
    numa_node: i32,
}

impl CardDescriptor {
    pub(crate) const fn new(
        card_type: CardType,
        serial_number: Option<i32>,
        pci_id: PciId,
        pci_address: PciAddress,
        numa_node: i32,
    ) -> Self {
        Self {
            card_type,
            serial_number,
            pci_id,
            pci_address,
            numa_node,
        }
    }

    /// Card family
    pub const fn card_type(&self) -> CardType {
        self.card_type
    }

    /// Serial number, if the card reports one
    pub const fn serial_number(&self) -> Option<i32> {
        self.serial_number
    }

    /// PCI identity pair
    pub const fn pci_id(&self) -> PciId {
        self.pci_id
    }

    /// PCI address
    pub const fn pci_address(&self) -> PciAddress {
        self.pci_address
    }

    /// NUMA node, `-1` when the platform reports none
    pub const fn numa_node(&self) -> i32 {
        self.numa_node
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_forms() {
        assert_eq!(CardType::Cru.to_string(), "CRU");
        assert_eq!(CardType::Crorc.to_string(), "CRORC");
        assert_eq!(PciId::new(0x10dc, 0x0033).to_string(), "10dc:0033");
    }
}
