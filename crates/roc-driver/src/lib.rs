//! Control plane for the C-RORC and CRU PCIe readout cards.
//!
//! The crate covers what happens before and around data taking: finding the
//! installed cards, describing how a channel should be configured, reading
//! and writing card registers through a mapped BAR, and talking to the
//! on-card SCA slow-control chip.
//!
//! # Layers
//!
//! ```text
//! Parameters ──► DeviceFinder::resolve ──► PciAccess::map_bar ──► BarBinding
//!  (config)          (discovery)              (pci, backends)        (bar)
//!                                                                      │
//!                                            CruBar / CrorcBar ◄───────┤
//!                                            Sca ◄─────────────────────┘
//! ```
//!
//! [`Session`] strings the chain together for front-ends.
//!
//! # Quick start
//!
//! ```no_run
//! use roc_driver::{CardId, DeviceFinder, Parameters, Session, SysfsPci};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let finder = DeviceFinder::new(SysfsPci::new());
//! for card in finder.find_all()? {
//!     println!("{} {} serial {:?}", card.card_type(), card.pci_address(), card.serial_number());
//! }
//!
//! let parameters = Parameters::make_parameters("42:0.0".parse::<CardId>()?, 2);
//! let mut session = Session::open(&finder, &parameters)?;
//! let temperature = session.card_bar()?.temperature()?;
//! let gpio = session.sca().gpio_read()?;
//! println!("{temperature:?} °C, GPIO {gpio}");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

pub mod backends;
pub mod bar;
mod card;
pub mod crorc;
pub mod cru;
mod discovery;
mod error;
pub mod parameters;
pub mod pci;
pub mod sca;
mod session;

/// Hardware identification constants (re-exported from roc-chip).
pub mod pcie_ids {
    pub use roc_chip::pcie::{crorc, cru};
}

pub use backends::{MemoryRegion, MmapRegion};
pub use bar::{BarBinding, CardBar, RegisterReadWrite};
pub use card::{CardDescriptor, CardType, PciId};
pub use crorc::CrorcBar;
pub use cru::{CruBar, DataSource, FirmwareFeatures};
pub use discovery::{DeviceFinder, DeviceType, ResolvedCard, SerialSource, DEVICE_TYPES};
pub use error::{Result, RocError, SearchTarget};
pub use parameters::{
    BufferParameters, CardId, GeneratorPattern, LinkMask, LoopbackMode, Parameters, PciAddress,
    ReadoutMode, MAX_LINK,
};
pub use pci::{PciAccess, SysfsDevice, SysfsPci};
pub use sca::{Sca, ScaCommand, ScaResult, ScaState};
pub use session::Session;

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        CardBar, CardDescriptor, CardId, CardType, DeviceFinder, Parameters, PciAccess,
        RegisterReadWrite, Result, RocError, Sca, Session, SysfsPci,
    };
}
