//! PCI identity pairs for the supported readout cards.
//!
//! Each card family is recognised by exactly one (vendor, device) pair;
//! no two families share a pair, so an identity pair alone decides the family.

/// C-RORC (CERN vendor ID, C-RORC device ID; `lspci: 10dc:0033`).
pub mod crorc {
    /// PCI-SIG vendor ID.
    pub const VENDOR_ID: u16 = 0x10DC;
    /// PCI device ID.
    pub const DEVICE_ID: u16 = 0x0033;
}

/// CRU on the Altera development board (`lspci: 1172:e001`).
pub mod cru {
    /// PCI-SIG vendor ID (Altera).
    pub const VENDOR_ID: u16 = 0x1172;
    /// PCI device ID.
    pub const DEVICE_ID: u16 = 0xE001;
}
