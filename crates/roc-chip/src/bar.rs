//! BAR layout of the readout cards.
//!
//! ```text
//! Card    BAR  Purpose
//! ─────── ──── ──────────────────────────────────────────────────────────
//! C-RORC   0   DMA channel 0 registers, flash controller (serial number)
//! C-RORC  1-5  DMA channels 1 to 5
//! CRU      0   DMA control
//! CRU      2   Board support: serial, temperature, firmware info, SCA, GBT
//! ```
//!
//! The front-end tools open "channel N" as BAR N, so the channel number of a
//! configuration doubles as the BAR index.

/// BAR holding the C-RORC flash controller.
pub const CRORC_FLASH_BAR: usize = 0;

/// BAR holding the CRU board-support registers (serial, temperature,
/// firmware info, chip ID, SCA).
pub const CRU_BSP_BAR: usize = 2;

/// Number of BARs a PCI function can expose.
pub const MAX_BARS: usize = 6;
