//! C-RORC register accessors
//!
//! The C-RORC keeps its serial number in flash, behind the BAR 0 flash
//! controller. Reading one flash word is a request/poll/read sequence, so
//! even the serial accessor needs the window mutably.

use crate::bar::{BarBinding, RegisterReadWrite};
use crate::error::{Result, RocError};
use roc_chip::bar::CRORC_FLASH_BAR;
use roc_chip::crorc;
use roc_chip::get_bit;

/// Flash word value of erased flash
const ERASED: u16 = 0xffff;

/// Typed accessors over a C-RORC BAR
#[derive(Debug)]
pub struct CrorcBar<'a, W: RegisterReadWrite + ?Sized> {
    bar: BarBinding<'a, W>,
}

impl<'a, W: RegisterReadWrite + ?Sized> CrorcBar<'a, W> {
    /// Wrap a binding
    pub fn new(bar: BarBinding<'a, W>) -> Self {
        Self { bar }
    }

    /// Serial number from the flash record
    ///
    /// `None` when the flash is erased or the serial field is not a
    /// decimal number.
    ///
    /// # Errors
    ///
    /// Returns `RocError::InvalidAccess` unless bound to BAR 0 and
    /// `RocError::Timeout` if the flash never reports a word ready.
    pub fn serial(&mut self) -> Result<Option<i32>> {
        self.bar.assert_bar_index(CRORC_FLASH_BAR, "serial number")?;
        Ok(self.read_record()?.as_deref().and_then(parse_serial))
    }

    /// Serial record text, `None` when the flash is erased
    ///
    /// Bytes that are not valid UTF-8 show as U+FFFD.
    ///
    /// # Errors
    ///
    /// Returns `RocError::Timeout` if the flash never reports a word ready.
    pub fn serial_record(&mut self) -> Result<Option<String>> {
        Ok(self
            .read_record()?
            .map(|record| String::from_utf8_lossy(&record).into_owned()))
    }

    /// Raw record bytes, two per flash word, high byte first
    fn read_record(&mut self) -> Result<Option<Vec<u8>>> {
        let mut record = Vec::with_capacity(crorc::SERIAL_RECORD_LENGTH);

        for address in (crorc::SERIAL_RECORD_ADDRESS..).take(crorc::SERIAL_RECORD_LENGTH / 2) {
            let word = self.read_flash_word(address)?;
            if word == ERASED {
                tracing::debug!("C-RORC flash erased at word {address:#x}");
                return Ok(None);
            }
            record.extend_from_slice(&word.to_be_bytes());
        }

        tracing::debug!(
            "C-RORC flash record: {:?}",
            String::from_utf8_lossy(&record)
        );
        Ok(Some(record))
    }

    fn read_flash_word(&mut self, address: u32) -> Result<u16> {
        self.bar
            .write_register(crorc::FLASH_ADDRESS.index(), crorc::READ_COMMAND | address)?;

        for _ in 0..crorc::MAX_FLASH_POLLS {
            let status = self.bar.read_register(crorc::FLASH_STATUS.index())?;
            if get_bit(status, crorc::STATUS_READY_BIT) {
                let data = self.bar.read_register(crorc::FLASH_DATA.index())?;
                // Low 16 bits hold the word
                #[allow(clippy::cast_possible_truncation)]
                return Ok(data as u16);
            }
        }

        Err(RocError::timeout("C-RORC flash read", crorc::MAX_FLASH_POLLS))
    }
}

/// Serial number field of a flash record, located by byte offset
fn parse_serial(record: &[u8]) -> Option<i32> {
    let field = record.get(crorc::SERIAL_OFFSET..crorc::SERIAL_OFFSET + crorc::SERIAL_DIGITS)?;
    if !field.iter().all(u8::is_ascii_digit) {
        tracing::debug!("C-RORC serial field {field:02x?} is not numeric");
        return None;
    }
    std::str::from_utf8(field).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::CardType;
    use std::cell::{Cell, RefCell};

    /// Flash controller double: serves `flash` words, ready after `delay` polls
    struct FakeFlash {
        flash: Vec<u16>,
        delay: u32,
        polls: Cell<u32>,
        address: RefCell<Option<u32>>,
        bar: usize,
    }

    impl FakeFlash {
        fn with_record(record: impl AsRef<[u8]>) -> Self {
            let bytes = record.as_ref();
            let flash = bytes
                .chunks(2)
                .map(|pair| u16::from_be_bytes([pair[0], *pair.get(1).unwrap_or(&b' ')]))
                .collect();
            Self {
                flash,
                delay: 3,
                polls: Cell::new(0),
                address: RefCell::new(None),
                bar: 0,
            }
        }
    }

    impl RegisterReadWrite for FakeFlash {
        fn read_register(&self, index: usize) -> Result<u32> {
            if index == crorc::FLASH_STATUS.index() {
                self.polls.set(self.polls.get() + 1);
                return Ok(u32::from(self.polls.get() > self.delay));
            }
            if index == crorc::FLASH_DATA.index() {
                let address = self.address.borrow().unwrap();
                let word = (address - crorc::SERIAL_RECORD_ADDRESS) as usize;
                return Ok(0xabcd_0000 | u32::from(self.flash.get(word).copied().unwrap_or(ERASED)));
            }
            Ok(0)
        }

        fn write_register(&mut self, index: usize, value: u32) -> Result<()> {
            assert_eq!(index, crorc::FLASH_ADDRESS.index());
            assert_ne!(value & crorc::READ_COMMAND, 0);
            *self.address.borrow_mut() = Some(value & !crorc::READ_COMMAND);
            self.polls.set(0);
            Ok(())
        }

        fn bar_index(&self) -> usize {
            self.bar
        }
    }

    const RECORD: &str = "C-RORC board description text....12345";

    #[test]
    fn serial_from_flash_record() {
        assert_eq!(RECORD.len(), crorc::SERIAL_RECORD_LENGTH);
        let mut flash = FakeFlash::with_record(RECORD);
        let mut bar = CrorcBar::new(BarBinding::new(&mut flash, CardType::Crorc));

        assert_eq!(bar.serial().unwrap(), Some(12345));
        assert_eq!(bar.serial_record().unwrap().as_deref(), Some(RECORD));
    }

    #[test]
    fn high_bytes_do_not_shift_the_serial_field() {
        let mut record = RECORD.as_bytes().to_vec();
        record[0] = 0xc3;
        record[1] = 0x80;
        record[7] = 0xff;
        let mut flash = FakeFlash::with_record(&record);
        let mut bar = CrorcBar::new(BarBinding::new(&mut flash, CardType::Crorc));

        assert_eq!(bar.serial().unwrap(), Some(12345));
        let text = bar.serial_record().unwrap().unwrap();
        assert!(text.ends_with("....12345"));
    }

    #[test]
    fn erased_flash_has_no_serial() {
        let mut flash = FakeFlash::with_record("");
        let mut bar = CrorcBar::new(BarBinding::new(&mut flash, CardType::Crorc));
        assert_eq!(bar.serial().unwrap(), None);
    }

    #[test]
    fn non_numeric_serial_is_absent() {
        let mut flash = FakeFlash::with_record("C-RORC board description text....12a45");
        let mut bar = CrorcBar::new(BarBinding::new(&mut flash, CardType::Crorc));
        assert_eq!(bar.serial().unwrap(), None);
    }

    #[test]
    fn flash_never_ready_times_out() {
        let mut flash = FakeFlash::with_record(RECORD);
        flash.delay = u32::MAX;
        let mut bar = CrorcBar::new(BarBinding::new(&mut flash, CardType::Crorc));

        assert!(matches!(
            bar.serial(),
            Err(RocError::Timeout { iterations: crorc::MAX_FLASH_POLLS, .. })
        ));
        drop(bar);
        assert_eq!(flash.polls.get(), crorc::MAX_FLASH_POLLS);
    }

    #[test]
    fn serial_needs_bar_0() {
        let mut flash = FakeFlash::with_record(RECORD);
        flash.bar = 2;
        let mut bar = CrorcBar::new(BarBinding::new(&mut flash, CardType::Crorc));

        assert!(matches!(
            bar.serial(),
            Err(RocError::InvalidAccess { expected: 0, actual: 2, .. })
        ));
    }
}
