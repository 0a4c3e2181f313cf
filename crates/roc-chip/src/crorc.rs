//! C-RORC BAR 0 flash access.
//!
//! The C-RORC has no serial number register. The serial lives in a text
//! record in the on-board flash, which is reached through three BAR 0
//! registers:
//!
//! ```text
//! FLASH_ADDRESS  write: READ_COMMAND | word address in flash (bits 30:0)
//! FLASH_STATUS   bit 0 set once the addressed word is latched
//! FLASH_DATA     bits 15:0 = the flash word (two ASCII characters, high byte first)
//! ```
//!
//! Serial record (ASCII, starting at [`SERIAL_RECORD_ADDRESS`]):
//!
//! ```text
//! offset  0..33   free-form board description
//! offset 33..38   serial number, 5 decimal digits
//! ```
//! Erased flash reads back as `0xffff` words.

use crate::Register;

/// Flash address / command register.
pub const FLASH_ADDRESS: Register = Register::new(0x0000_00A0);
/// Flash data register; the low 16 bits hold one flash word.
pub const FLASH_DATA: Register = Register::new(0x0000_00A4);
/// Flash status register.
pub const FLASH_STATUS: Register = Register::new(0x0000_00A8);

/// Set in `FLASH_ADDRESS` to request a read of the addressed word.
pub const READ_COMMAND: u32 = 1 << 31;
/// `FLASH_STATUS` bit signalling that `FLASH_DATA` holds the requested word.
pub const STATUS_READY_BIT: u32 = 0;

/// Flash word address of the serial record.
pub const SERIAL_RECORD_ADDRESS: u32 = 0x0147_0000;
/// Characters read from the serial record.
pub const SERIAL_RECORD_LENGTH: usize = 38;
/// Character offset of the serial number inside the record.
pub const SERIAL_OFFSET: usize = 33;
/// Number of decimal digits of the serial number.
pub const SERIAL_DIGITS: usize = 5;

/// Status polls allowed per flash word before giving up.
pub const MAX_FLASH_POLLS: u32 = 10_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_fits_in_record() {
        assert!(SERIAL_OFFSET + SERIAL_DIGITS <= SERIAL_RECORD_LENGTH);
        // Two characters per flash word.
        assert_eq!(SERIAL_RECORD_LENGTH % 2, 0);
    }
}
