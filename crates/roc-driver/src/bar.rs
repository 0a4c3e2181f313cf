//! Register interface of a mapped BAR
//!
//! [`RegisterReadWrite`] is the single primitive: word-indexed 32-bit reads
//! and writes. [`BarBinding`] ties a borrowed register window to a card
//! family and its register offset; the family accessors in
//! [`cru`](crate::cru) and [`crorc`](crate::crorc) and the SCA engine are
//! all built on it.
//!
//! Indices are 32-bit word offsets. Byte addresses are divided by 4 first
//! (see [`roc_chip::Register::index`]).

use crate::card::CardType;
use crate::crorc::CrorcBar;
use crate::cru::CruBar;
use crate::error::{Result, RocError};

/// Word-indexed access to a register window
pub trait RegisterReadWrite {
    /// Read the 32-bit register at word `index`
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is outside the window.
    fn read_register(&self, index: usize) -> Result<u32>;

    /// Write the 32-bit register at word `index`
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is outside the window.
    fn write_register(&mut self, index: usize, value: u32) -> Result<()>;

    /// BAR this window maps
    fn bar_index(&self) -> usize;
}

impl<T: RegisterReadWrite + ?Sized> RegisterReadWrite for &mut T {
    fn read_register(&self, index: usize) -> Result<u32> {
        (**self).read_register(index)
    }

    fn write_register(&mut self, index: usize, value: u32) -> Result<()> {
        (**self).write_register(index, value)
    }

    fn bar_index(&self) -> usize {
        (**self).bar_index()
    }
}

/// Word offset added to every register index, per card family
#[must_use]
pub const fn register_offset(card_type: CardType) -> usize {
    match card_type {
        CardType::Crorc | CardType::Cru | CardType::Unknown => 0,
    }
}

/// A register window bound to a card family
///
/// The window is borrowed, not owned: it belongs to the raw PCI layer and
/// must outlive the binding. Holding the only mutable borrow also means no
/// other register traffic can interleave with a multi-step operation.
#[derive(Debug)]
pub struct BarBinding<'a, W: RegisterReadWrite + ?Sized> {
    window: &'a mut W,
    card_type: CardType,
    offset: usize,
}

impl<'a, W: RegisterReadWrite + ?Sized> BarBinding<'a, W> {
    /// Bind a window to a card family
    pub fn new(window: &'a mut W, card_type: CardType) -> Self {
        Self {
            window,
            card_type,
            offset: register_offset(card_type),
        }
    }

    /// Card family of this binding
    pub const fn card_type(&self) -> CardType {
        self.card_type
    }

    /// Read-modify-write: replace the register with `f(current)`
    ///
    /// Returns the value written.
    ///
    /// # Errors
    ///
    /// Returns an error if the register cannot be read or written.
    pub fn modify_register(&mut self, index: usize, f: impl FnOnce(u32) -> u32) -> Result<u32> {
        let value = f(self.read_register(index)?);
        self.write_register(index, value)?;
        Ok(value)
    }

    /// Fail with `RocError::InvalidAccess` unless bound to BAR `expected`
    ///
    /// # Errors
    ///
    /// Returns `RocError::InvalidAccess` naming `message` on a BAR mismatch.
    pub fn assert_bar_index(&self, expected: usize, message: &str) -> Result<()> {
        let actual = self.window.bar_index();
        if actual != expected {
            return Err(RocError::invalid_access(expected, actual, message));
        }
        Ok(())
    }
}

impl<W: RegisterReadWrite + ?Sized> RegisterReadWrite for BarBinding<'_, W> {
    fn read_register(&self, index: usize) -> Result<u32> {
        let value = self.window.read_register(index + self.offset)?;
        tracing::trace!("{} read  [{index:#x}] = {value:#010x}", self.card_type);
        Ok(value)
    }

    fn write_register(&mut self, index: usize, value: u32) -> Result<()> {
        tracing::trace!("{} write [{index:#x}] = {value:#010x}", self.card_type);
        self.window.write_register(index + self.offset, value)
    }

    fn bar_index(&self) -> usize {
        self.window.bar_index()
    }
}

/// Family dispatch over the typed BAR accessors
///
/// Accessors a family has no register for return `None`.
#[derive(Debug)]
pub enum CardBar<'a, W: RegisterReadWrite + ?Sized> {
    /// C-RORC accessors
    Crorc(CrorcBar<'a, W>),
    /// CRU accessors
    Cru(CruBar<'a, W>),
}

impl<'a, W: RegisterReadWrite + ?Sized> CardBar<'a, W> {
    /// Typed accessors for `card_type` over `window`
    ///
    /// # Errors
    ///
    /// Returns `RocError::Configuration` for `CardType::Unknown`.
    pub fn new(window: &'a mut W, card_type: CardType) -> Result<Self> {
        let binding = BarBinding::new(window, card_type);
        match card_type {
            CardType::Crorc => Ok(Self::Crorc(CrorcBar::new(binding))),
            CardType::Cru => Ok(Self::Cru(CruBar::new(binding))),
            CardType::Unknown => Err(RocError::configuration(
                "CardType",
                "no register map for unknown card type",
            )),
        }
    }

    /// Card family
    pub const fn card_type(&self) -> CardType {
        match self {
            Self::Crorc(_) => CardType::Crorc,
            Self::Cru(_) => CardType::Cru,
        }
    }

    /// Serial number
    ///
    /// # Errors
    ///
    /// Returns an error on register access failure or a wrong BAR binding.
    pub fn serial(&mut self) -> Result<Option<i32>> {
        match self {
            Self::Crorc(bar) => bar.serial(),
            Self::Cru(bar) => bar.serial(),
        }
    }

    /// Card temperature in °C
    ///
    /// # Errors
    ///
    /// Returns an error on register access failure or a wrong BAR binding.
    pub fn temperature(&self) -> Result<Option<f32>> {
        match self {
            Self::Crorc(_) => Ok(None),
            Self::Cru(bar) => bar.temperature(),
        }
    }

    /// Firmware build information
    ///
    /// # Errors
    ///
    /// Returns an error on register access failure or a wrong BAR binding.
    pub fn firmware_info(&self) -> Result<Option<String>> {
        match self {
            Self::Crorc(_) => Ok(None),
            Self::Cru(bar) => bar.firmware_info(),
        }
    }

    /// Unique FPGA chip ID
    ///
    /// # Errors
    ///
    /// Returns an error on register access failure or a wrong BAR binding.
    pub fn card_id(&self) -> Result<Option<String>> {
        match self {
            Self::Crorc(_) => Ok(None),
            Self::Cru(bar) => bar.card_id(),
        }
    }

    /// Dropped packets counter
    ///
    /// # Errors
    ///
    /// Returns an error on register access failure.
    pub fn dropped_packets(&self) -> Result<Option<u32>> {
        match self {
            Self::Crorc(_) => Ok(None),
            Self::Cru(bar) => bar.dropped_packets().map(Some),
        }
    }

    /// Number of links the firmware provides
    ///
    /// # Errors
    ///
    /// Returns an error on register access failure.
    pub fn links(&self) -> Result<Option<u32>> {
        match self {
            Self::Crorc(_) => Ok(None),
            Self::Cru(bar) => bar.links().map(Some),
        }
    }
}
