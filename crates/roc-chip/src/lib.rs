//! Hardware model for the C-RORC and CRU readout cards.
//!
//! This crate has **no dependencies** and **no hardware access**. It is a
//! pure model of the cards, covering PCI identities, BAR layout, register addresses
//! with their bit fields, and the literal command words of the SCA
//! slow-control protocol.
//!
//! All addresses in this crate are **byte** addresses as they appear in the
//! firmware address tables. Register access is word-indexed, so every
//! [`Register`] converts to its 32-bit word index with [`Register::index`].
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`pcie`] | Vendor/device identity pairs for both card families |
//! | [`bar`] | BAR indices and what lives behind them |
//! | [`cru`] | CRU BAR 2 register map and bit definitions |
//! | [`crorc`] | C-RORC BAR 0 flash access registers and serial record layout |
//! | [`sca`] | SCA registers, literal GPIO command words, polling budget |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bar;
pub mod crorc;
pub mod cru;
pub mod pcie;
pub mod sca;

/// A 32-bit register identified by its byte address inside a BAR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Register {
    /// Byte address inside the BAR.
    pub address: u32,
}

impl Register {
    /// Register at the given byte address.
    #[must_use]
    pub const fn new(address: u32) -> Self {
        Self { address }
    }

    /// 32-bit word index of this register.
    #[must_use]
    pub const fn index(self) -> usize {
        word_index(self.address)
    }

    /// Register `bytes` further into the BAR.
    #[must_use]
    pub const fn offset(self, bytes: u32) -> Self {
        Self::new(self.address + bytes)
    }
}

/// Convert a byte address into a 32-bit word index.
///
/// Registers are indexed by 32 bits (4 bytes); the low two bits of the byte
/// address are dropped.
#[must_use]
pub const fn word_index(byte_address: u32) -> usize {
    (byte_address / 4) as usize
}

/// Extract `width` bits of `value` starting at bit `lsb`.
#[must_use]
pub const fn get_bits(value: u32, lsb: u32, width: u32) -> u32 {
    (value >> lsb) & mask(width)
}

/// Replace `width` bits of `value` starting at bit `lsb` with `field`.
///
/// Bits of `field` above `width` are discarded; bits of `value` outside the
/// field are left as they were.
#[must_use]
pub const fn set_bits(value: u32, lsb: u32, width: u32, field: u32) -> u32 {
    let m = mask(width) << lsb;
    (value & !m) | ((field << lsb) & m)
}

/// Whether bit `bit` of `value` is set.
#[must_use]
pub const fn get_bit(value: u32, bit: u32) -> bool {
    (value >> bit) & 1 == 1
}

/// `value` with bit `bit` set or cleared.
#[must_use]
pub const fn set_bit(value: u32, bit: u32, on: bool) -> u32 {
    set_bits(value, bit, 1, on as u32)
}

const fn mask(width: u32) -> u32 {
    if width >= 32 {
        u32::MAX
    } else {
        (1 << width) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_addresses_become_word_indices() {
        assert_eq!(word_index(0x1e0), 0x78);
        assert_eq!(Register::new(0x8).index(), 2);
        assert_eq!(Register::new(0x1000).offset(4).index(), 0x401);
    }

    #[test]
    fn set_bits_only_touches_its_field() {
        let value = 0xffff_ffff;
        assert_eq!(set_bits(value, 8, 8, 0), 0xffff_00ff);
        assert_eq!(set_bits(0, 8, 8, 0x1ab), 0x0000_ab00);
        assert_eq!(get_bits(0x0000_ab00, 8, 8), 0xab);
        assert_eq!(set_bits(0x1234_5678, 0, 32, 0xdead_beef), 0xdead_beef);
    }

    #[test]
    fn single_bits() {
        assert!(get_bit(0x40, 6));
        assert!(!get_bit(0x40, 5));
        assert_eq!(set_bit(0, 16, true), 0x1_0000);
        assert_eq!(set_bit(0xffff_ffff, 0, false), 0xffff_fffe);
    }
}
