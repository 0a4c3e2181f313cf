//! Card enumeration
//!
//! Cards are found by walking the static [`DEVICE_TYPES`] table: for each
//! family, list the PCI devices with its identity pair, then read what is
//! needed to describe or match them. Serial numbers are read lazily and
//! only when a search needs them.
//!
//! Failure policy:
//!
//! * a device whose BAR cannot be mapped or whose serial cannot be read is
//!   logged and skipped;
//! * failing to list devices or to read a device's address or NUMA node
//!   aborts the whole operation.

use crate::bar::{BarBinding, RegisterReadWrite};
use crate::card::{CardDescriptor, CardType, PciId};
use crate::crorc::CrorcBar;
use crate::cru::CruBar;
use crate::error::{Result, RocError, SearchTarget};
use crate::parameters::{CardId, PciAddress};
use crate::pci::PciAccess;
use roc_chip::bar::{CRORC_FLASH_BAR, CRU_BSP_BAR};
use roc_chip::pcie;

/// Where a card family keeps its serial number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialSource {
    /// Flash record behind the BAR 0 flash controller
    CrorcFlash,
    /// Serial register in BAR 2
    CruRegister,
}

impl SerialSource {
    /// BAR to map for the serial read
    #[must_use]
    pub const fn bar_index(self) -> usize {
        match self {
            Self::CrorcFlash => CRORC_FLASH_BAR,
            Self::CruRegister => CRU_BSP_BAR,
        }
    }

    /// Read the serial number through `window`
    ///
    /// # Errors
    ///
    /// Returns an error if the window is the wrong BAR or the read fails.
    pub fn read<W: RegisterReadWrite + ?Sized>(self, window: &mut W) -> Result<Option<i32>> {
        match self {
            Self::CrorcFlash => CrorcBar::new(BarBinding::new(window, CardType::Crorc)).serial(),
            Self::CruRegister => CruBar::new(BarBinding::new(window, CardType::Cru)).serial(),
        }
    }
}

/// One supported card family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceType {
    /// Family
    pub card_type: CardType,
    /// PCI identity pair
    pub pci_id: PciId,
    /// Serial number source
    pub serial: SerialSource,
}

/// Supported card families, in search order
pub const DEVICE_TYPES: [DeviceType; 2] = [
    DeviceType {
        card_type: CardType::Crorc,
        pci_id: PciId::new(pcie::crorc::VENDOR_ID, pcie::crorc::DEVICE_ID),
        serial: SerialSource::CrorcFlash,
    },
    DeviceType {
        card_type: CardType::Cru,
        pci_id: PciId::new(pcie::cru::VENDOR_ID, pcie::cru::DEVICE_ID),
        serial: SerialSource::CruRegister,
    },
];

/// A card matched by [`DeviceFinder::resolve`]
#[derive(Debug, Clone)]
pub struct ResolvedCard<H> {
    /// Card identity
    pub descriptor: CardDescriptor,
    /// Raw PCI handle, for mapping the card's BARs
    pub handle: H,
}

/// Enumerates cards through a [`PciAccess`] implementation
#[derive(Debug, Clone)]
pub struct DeviceFinder<P: PciAccess> {
    pci: P,
}

impl<P: PciAccess> DeviceFinder<P> {
    /// Finder over `pci`
    pub const fn new(pci: P) -> Self {
        Self { pci }
    }

    /// The raw PCI layer
    pub const fn pci(&self) -> &P {
        &self.pci
    }

    /// Every installed card, in table order then discovery order
    ///
    /// # Errors
    ///
    /// Returns an error if devices cannot be listed or a device's address or
    /// NUMA node cannot be read.
    pub fn find_all(&self) -> Result<Vec<CardDescriptor>> {
        Ok(self
            .find_all_resolved()?
            .into_iter()
            .map(|card| card.descriptor)
            .collect())
    }

    /// Every installed card together with its PCI handle
    ///
    /// Same order and skipping rules as [`find_all`](Self::find_all); the
    /// handles map further BARs without another discovery pass.
    ///
    /// # Errors
    ///
    /// As [`find_all`](Self::find_all).
    pub fn find_all_resolved(&self) -> Result<Vec<ResolvedCard<P::Handle>>> {
        tracing::info!("Discovering readout cards...");

        let mut cards = Vec::new();

        for device_type in &DEVICE_TYPES {
            for handle in self.pci.devices(device_type.pci_id)? {
                let address = self.pci.address(&handle)?;
                let Some(serial) = self.serial_or_skip(device_type, &handle, address) else {
                    continue;
                };
                let descriptor = self.describe(device_type, &handle, address, serial)?;
                cards.push(ResolvedCard { descriptor, handle });
            }
        }

        tracing::info!("Discovered {} card(s)", cards.len());
        Ok(cards)
    }

    /// Every installed card with serial number `serial`
    ///
    /// # Errors
    ///
    /// As [`find_all`](Self::find_all).
    pub fn find_by_serial(&self, serial: i32) -> Result<Vec<CardDescriptor>> {
        Ok(self
            .find_all()?
            .into_iter()
            .filter(|card| card.serial_number() == Some(serial))
            .collect())
    }

    /// Every installed card at PCI address `address`
    ///
    /// Only matching devices have their serial read.
    ///
    /// # Errors
    ///
    /// As [`find_all`](Self::find_all).
    pub fn find_by_address(&self, address: PciAddress) -> Result<Vec<CardDescriptor>> {
        let mut cards = Vec::new();

        for device_type in &DEVICE_TYPES {
            for handle in self.pci.devices(device_type.pci_id)? {
                if self.pci.address(&handle)? != address {
                    continue;
                }
                let Some(serial) = self.serial_or_skip(device_type, &handle, address) else {
                    continue;
                };
                cards.push(self.describe(device_type, &handle, address, serial)?);
            }
        }

        Ok(cards)
    }

    /// The one card identified by `card_id`
    ///
    /// Families are searched in table order; the first match wins.
    ///
    /// # Errors
    ///
    /// Returns `RocError::NotFound` carrying the searched serial or address
    /// if no card matches, and the topology errors of
    /// [`find_all`](Self::find_all).
    pub fn resolve(&self, card_id: &CardId) -> Result<ResolvedCard<P::Handle>> {
        for device_type in &DEVICE_TYPES {
            for handle in self.pci.devices(device_type.pci_id)? {
                let address = self.pci.address(&handle)?;

                let serial = match *card_id {
                    CardId::Address(wanted) => {
                        if address != wanted {
                            continue;
                        }
                        // Matched by address; the serial is informational
                        self.read_serial(device_type, &handle).unwrap_or_else(|e| {
                            tracing::warn!("Serial of {address} unreadable: {e}");
                            None
                        })
                    }
                    CardId::Serial(wanted) => {
                        match self.serial_or_skip(device_type, &handle, address) {
                            Some(Some(serial)) if serial == wanted => Some(serial),
                            _ => continue,
                        }
                    }
                };

                let descriptor = self.describe(device_type, &handle, address, serial)?;
                tracing::info!("Resolved {card_id} to {} at {address}", device_type.card_type);
                return Ok(ResolvedCard { descriptor, handle });
            }
        }

        let target = match *card_id {
            CardId::Serial(serial) => SearchTarget::Serial(serial),
            CardId::Address(address) => SearchTarget::Address(address),
        };
        Err(RocError::NotFound { target })
    }

    fn read_serial(&self, device_type: &DeviceType, handle: &P::Handle) -> Result<Option<i32>> {
        let mut window = self.pci.map_bar(handle, device_type.serial.bar_index())?;
        device_type.serial.read(&mut window)
    }

    /// Serial number, or `None` (outer) when the device must be skipped
    fn serial_or_skip(
        &self,
        device_type: &DeviceType,
        handle: &P::Handle,
        address: PciAddress,
    ) -> Option<Option<i32>> {
        match self.read_serial(device_type, handle) {
            Ok(serial) => Some(serial),
            Err(e) => {
                tracing::warn!("Skipping {} at {address}: {e}", device_type.card_type);
                None
            }
        }
    }

    fn describe(
        &self,
        device_type: &DeviceType,
        handle: &P::Handle,
        address: PciAddress,
        serial: Option<i32>,
    ) -> Result<CardDescriptor> {
        let numa_node = self.pci.numa_node(handle)?;

        tracing::debug!(
            "{} at {address}: serial {serial:?}, NUMA node {numa_node}",
            device_type.card_type
        );

        Ok(CardDescriptor::new(
            device_type.card_type,
            serial,
            device_type.pci_id,
            address,
            numa_node,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryRegion;
    use std::cell::Cell;

    /// PCI double: every device is a CRU whose serial equals its bus number,
    /// except bus 0x66 whose BAR cannot be mapped
    struct FakePci {
        crus: Vec<u8>,
        maps: Cell<u32>,
    }

    impl FakePci {
        fn new(crus: &[u8]) -> Self {
            Self {
                crus: crus.to_vec(),
                maps: Cell::new(0),
            }
        }
    }

    impl PciAccess for FakePci {
        type Handle = u8;
        type Window = MemoryRegion;

        fn devices(&self, id: PciId) -> Result<Vec<u8>> {
            if id == DEVICE_TYPES[1].pci_id {
                Ok(self.crus.clone())
            } else {
                Ok(Vec::new())
            }
        }

        fn map_bar(&self, bus: &u8, bar_index: usize) -> Result<MemoryRegion> {
            self.maps.set(self.maps.get() + 1);
            if *bus == 0x66 {
                return Err(RocError::pci("resource2 missing"));
            }
            let mut window = MemoryRegion::new(bar_index, 0x0002_0010 / 4);
            window.preset(roc_chip::cru::SERIAL_NUMBER.index(), u32::from(*bus))?;
            Ok(window)
        }

        fn address(&self, bus: &u8) -> Result<PciAddress> {
            PciAddress::new(u32::from(*bus), 0, 0)
        }

        fn numa_node(&self, _: &u8) -> Result<i32> {
            Ok(0)
        }
    }

    #[test]
    fn table_is_crorc_then_cru() {
        assert_eq!(DEVICE_TYPES[0].card_type, CardType::Crorc);
        assert_eq!(DEVICE_TYPES[0].pci_id, PciId::new(0x10dc, 0x0033));
        assert_eq!(DEVICE_TYPES[1].card_type, CardType::Cru);
        assert_eq!(DEVICE_TYPES[1].pci_id, PciId::new(0x1172, 0xe001));
    }

    #[test]
    fn unmappable_devices_are_skipped() {
        let finder = DeviceFinder::new(FakePci::new(&[0x02, 0x66, 0x83]));
        let cards = finder.find_all().unwrap();
        let serials: Vec<_> = cards.iter().map(CardDescriptor::serial_number).collect();
        assert_eq!(serials, [Some(0x02), Some(0x83)]);
    }

    #[test]
    fn resolved_listing_keeps_handles() {
        let finder = DeviceFinder::new(FakePci::new(&[0x02, 0x66, 0x83]));
        let cards = finder.find_all_resolved().unwrap();
        let handles: Vec<u8> = cards.iter().map(|card| card.handle).collect();
        assert_eq!(handles, [0x02, 0x83]);
        assert_eq!(cards[1].descriptor.serial_number(), Some(0x83));
        // One serial mapping per device, nothing more
        assert_eq!(finder.pci().maps.get(), 3);
    }

    #[test]
    fn find_by_address_reads_only_the_match() {
        let finder = DeviceFinder::new(FakePci::new(&[0x02, 0x83, 0x84]));
        let address = PciAddress::new(0x83, 0, 0).unwrap();

        let cards = finder.find_by_address(address).unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].pci_address(), address);
        assert_eq!(finder.pci().maps.get(), 1);
    }

    #[test]
    fn resolve_first_match_and_not_found() {
        let finder = DeviceFinder::new(FakePci::new(&[0x02, 0x83]));

        let card = finder.resolve(&CardId::Serial(0x83)).unwrap();
        assert_eq!(card.handle, 0x83);
        assert_eq!(card.descriptor.card_type(), CardType::Cru);

        let err = finder.resolve(&CardId::Serial(7)).unwrap_err();
        assert!(matches!(
            err,
            RocError::NotFound { target: SearchTarget::Serial(7) }
        ));
    }

    #[test]
    fn resolve_by_address_tolerates_unreadable_serial() {
        let finder = DeviceFinder::new(FakePci::new(&[0x66]));
        let address = PciAddress::new(0x66, 0, 0).unwrap();

        let card = finder.resolve(&CardId::Address(address)).unwrap();
        assert_eq!(card.descriptor.serial_number(), None);
        assert_eq!(card.descriptor.pci_address(), address);
    }
}
