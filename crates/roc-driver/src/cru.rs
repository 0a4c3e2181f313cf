//! CRU register accessors
//!
//! Board-support registers (serial, temperature, firmware info, chip ID)
//! exist only in BAR 2; the accessors for them check the binding first.
//! Generator control is split into pure bit setters over a `u32` and
//! register-level operations that read-modify-write through them.

use crate::bar::{BarBinding, RegisterReadWrite};
use crate::error::{Result, RocError};
use crate::parameters::{GeneratorPattern, LinkMask, MAX_LINK};
use roc_chip::bar::CRU_BSP_BAR;
use roc_chip::cru::{self, features, generator, reset, temperature, wrapper_conf0};
use roc_chip::{get_bit, get_bits, set_bit, set_bits};

/// Features present in the loaded firmware
///
/// Integrated firmware has all of them; standalone builds may leave some out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct FirmwareFeatures {
    /// Standalone (development) firmware
    pub standalone: bool,
    /// Data source selection register present
    pub data_selection: bool,
    /// Temperature sensor present
    pub temperature: bool,
    /// Serial number register present
    pub serial: bool,
    /// Firmware info registers present
    pub firmware_info: bool,
    /// FPGA chip ID registers present
    pub chip_id: bool,
}

impl FirmwareFeatures {
    /// Decode the firmware features register
    #[must_use]
    pub const fn from_register(value: u32) -> Self {
        if get_bits(value, 16, 16) != features::STANDALONE_TAG {
            return Self {
                standalone: false,
                data_selection: true,
                temperature: true,
                serial: true,
                firmware_info: true,
                chip_id: true,
            };
        }

        // Active low: a set bit means the feature was left out
        Self {
            standalone: true,
            data_selection: !get_bit(value, features::DATA_SELECTION_DISABLED),
            temperature: !get_bit(value, features::TEMPERATURE_DISABLED),
            serial: !get_bit(value, features::SERIAL_DISABLED),
            firmware_info: !get_bit(value, features::FIRMWARE_INFO_DISABLED),
            chip_id: !get_bit(value, features::CHIP_ID_DISABLED),
        }
    }
}

/// Source of the data the DMA engine sends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// Data from the GBT links
    Gbt,
    /// Data from the internal generator
    Internal,
}

impl DataSource {
    const fn code(self) -> u32 {
        match self {
            Self::Gbt => 0,
            Self::Internal => 1,
        }
    }
}

/// Typed accessors over a CRU BAR
#[derive(Debug)]
pub struct CruBar<'a, W: RegisterReadWrite + ?Sized> {
    bar: BarBinding<'a, W>,
}

impl<'a, W: RegisterReadWrite + ?Sized> CruBar<'a, W> {
    /// Wrap a binding
    pub fn new(bar: BarBinding<'a, W>) -> Self {
        Self { bar }
    }

    /// The underlying binding
    pub fn binding(&mut self) -> &mut BarBinding<'a, W> {
        &mut self.bar
    }

    fn read(&self, register: roc_chip::Register) -> Result<u32> {
        self.bar.read_register(register.index())
    }

    /// Serial number, `None` when unprogrammed or left out of the firmware
    ///
    /// # Errors
    ///
    /// Returns `RocError::InvalidAccess` unless bound to BAR 2.
    pub fn serial(&self) -> Result<Option<i32>> {
        self.bar.assert_bar_index(CRU_BSP_BAR, "serial number")?;
        if !self.firmware_features()?.serial {
            return Ok(None);
        }

        let raw = self.read(cru::SERIAL_NUMBER)?;
        if raw == u32::MAX {
            return Ok(None);
        }
        Ok(i32::try_from(raw).ok())
    }

    /// Card temperature in °C, `None` when the sensor is absent or the raw
    /// value is outside its 10-bit range
    ///
    /// # Errors
    ///
    /// Returns `RocError::InvalidAccess` unless bound to BAR 2.
    pub fn temperature(&self) -> Result<Option<f32>> {
        self.bar.assert_bar_index(CRU_BSP_BAR, "temperature")?;
        if !self.firmware_features()?.temperature {
            return Ok(None);
        }
        Ok(convert_temperature(self.read(cru::TEMPERATURE)?))
    }

    /// Firmware build as `date-time-githash` (hex fields)
    ///
    /// # Errors
    ///
    /// Returns `RocError::InvalidAccess` unless bound to BAR 2.
    pub fn firmware_info(&self) -> Result<Option<String>> {
        self.bar.assert_bar_index(CRU_BSP_BAR, "firmware info")?;
        if !self.firmware_features()?.firmware_info {
            return Ok(None);
        }

        let date = self.read(cru::FIRMWARE_DATE)?;
        let time = self.read(cru::FIRMWARE_TIME)?;
        let hash = self.read(cru::FIRMWARE_GIT_HASH)?;
        Ok(Some(format!("{date:x}-{time:x}-{hash:x}")))
    }

    /// Unique FPGA chip ID as `high-low` (8 hex digits each)
    ///
    /// # Errors
    ///
    /// Returns `RocError::InvalidAccess` unless bound to BAR 2.
    pub fn card_id(&self) -> Result<Option<String>> {
        self.bar.assert_bar_index(CRU_BSP_BAR, "card ID")?;
        if !self.firmware_features()?.chip_id {
            return Ok(None);
        }

        let high = self.read(cru::FPGA_CHIP_HIGH)?;
        let low = self.read(cru::FPGA_CHIP_LOW)?;
        Ok(Some(format!("{high:08x}-{low:08x}")))
    }

    /// Decoded firmware features register
    ///
    /// # Errors
    ///
    /// Returns an error if the register cannot be read.
    pub fn firmware_features(&self) -> Result<FirmwareFeatures> {
        self.read(cru::FIRMWARE_FEATURES)
            .map(FirmwareFeatures::from_register)
    }

    /// Packets dropped by the DMA engine
    ///
    /// # Errors
    ///
    /// Returns an error if the register cannot be read.
    pub fn dropped_packets(&self) -> Result<u32> {
        self.read(cru::NUM_DROPPED_PACKETS)
    }

    /// Measured CTP clock frequency in Hz
    ///
    /// # Errors
    ///
    /// Returns an error if the register cannot be read.
    pub fn ctp_clock(&self) -> Result<u32> {
        self.read(cru::CTP_CLOCK)
    }

    /// Measured local clock frequency in Hz
    ///
    /// # Errors
    ///
    /// Returns an error if the register cannot be read.
    pub fn local_clock(&self) -> Result<u32> {
        self.read(cru::LOCAL_CLOCK)
    }

    /// Links provided by GBT wrapper `wrapper`
    ///
    /// # Errors
    ///
    /// Returns `RocError::Configuration` for a wrapper the card does not have.
    pub fn links_per_wrapper(&self, wrapper: u32) -> Result<u32> {
        let base = match wrapper {
            0 => cru::WRAPPER0,
            1 => cru::WRAPPER1,
            _ => {
                return Err(RocError::configuration(
                    "Wrapper",
                    format!("wrapper {wrapper} out of range (card has {})", cru::WRAPPER_COUNT),
                ))
            }
        };

        let conf = self.read(base.offset(cru::GBT_WRAPPER_CONF0))?;
        Ok(get_bits(conf, wrapper_conf0::LINKS_LSB, wrapper_conf0::LINKS_WIDTH))
    }

    /// Links provided by all GBT wrappers together
    ///
    /// # Errors
    ///
    /// Returns an error if a wrapper register cannot be read.
    pub fn links(&self) -> Result<u32> {
        let mut links = 0;
        for wrapper in 0..cru::WRAPPER_COUNT {
            links += self.links_per_wrapper(wrapper)?;
        }
        Ok(links)
    }

    /// Configure pattern, page size and random size of the data generator
    ///
    /// # Errors
    ///
    /// Returns `RocError::Configuration` for a pattern or size the CRU
    /// generator cannot produce; nothing is written in that case.
    pub fn set_data_generator_pattern(
        &mut self,
        pattern: GeneratorPattern,
        size: usize,
        random_size: bool,
    ) -> Result<()> {
        let mut bits = self.read(cru::DATA_GENERATOR_CONTROL)?;
        set_data_generator_pattern_bits(&mut bits, pattern)?;
        set_data_generator_size_bits(&mut bits, size)?;
        set_data_generator_random_size_bits(&mut bits, random_size);

        tracing::debug!("CRU generator: {pattern}, {size} bytes, random size {random_size}");
        self.bar
            .write_register(cru::DATA_GENERATOR_CONTROL.index(), bits)
    }

    /// Start or stop the data generator
    ///
    /// # Errors
    ///
    /// Returns an error on register access failure.
    pub fn set_data_generator_enabled(&mut self, enabled: bool) -> Result<()> {
        self.bar
            .modify_register(cru::DATA_GENERATOR_CONTROL.index(), |mut bits| {
                set_data_generator_enable_bits(&mut bits, enabled);
                bits
            })
            .map(drop)
    }

    /// Reset the data generator counter
    ///
    /// RESET_CONTROL is a command register: only the requested bit is written.
    ///
    /// # Errors
    ///
    /// Returns an error on register access failure.
    pub fn reset_data_generator_counter(&mut self) -> Result<()> {
        self.bar
            .write_register(cru::RESET_CONTROL.index(), 1 << reset::GENERATOR_COUNTER)
    }

    /// Inject a single error into the generated data
    ///
    /// # Errors
    ///
    /// Returns an error on register access failure.
    pub fn data_generator_inject_error(&mut self) -> Result<()> {
        self.bar
            .write_register(cru::DATA_GENERATOR_INJECT_ERROR.index(), 0x1)
    }

    /// Select where DMA data comes from
    ///
    /// # Errors
    ///
    /// Returns `RocError::Configuration` if the firmware has no data source
    /// selection.
    pub fn set_data_source(&mut self, source: DataSource) -> Result<()> {
        if !self.firmware_features()?.data_selection {
            return Err(RocError::configuration(
                "DataSource",
                "data source selection not available in this firmware",
            ));
        }
        self.bar
            .write_register(cru::DATA_SOURCE_SELECT.index(), source.code())
    }

    /// Enable exactly the links in `mask`
    ///
    /// # Errors
    ///
    /// Returns `RocError::Configuration` for link indices beyond 31.
    pub fn set_links_enabled(&mut self, mask: &LinkMask) -> Result<()> {
        let bits = link_enable_bits(mask)?;
        tracing::debug!("CRU link enable mask {bits:#010x}");
        self.bar.write_register(cru::LINK_ENABLE.index(), bits)
    }

    /// Reset the card
    ///
    /// # Errors
    ///
    /// Returns an error on register access failure.
    pub fn reset_card(&mut self) -> Result<()> {
        tracing::info!("Resetting CRU");
        self.bar
            .write_register(cru::RESET_CONTROL.index(), 1 << reset::CARD)
    }
}

/// Raw sensor value to °C, `None` outside `1..=1023`
#[must_use]
pub fn convert_temperature(raw: u32) -> Option<f32> {
    if raw == 0 || raw > temperature::RAW_MAX {
        return None;
    }
    // raw is at most 10 bits wide
    #[allow(clippy::cast_precision_loss)]
    let raw = raw as f32;
    Some(raw * temperature::A / 1024.0 - temperature::B)
}

/// One bit per enabled link
///
/// # Errors
///
/// Returns `RocError::Configuration` for link indices beyond 31.
pub fn link_enable_bits(mask: &LinkMask) -> Result<u32> {
    mask.iter().try_fold(0_u32, |bits, &link| {
        if link > MAX_LINK {
            return Err(RocError::configuration(
                "LinkMask",
                format!("link {link} out of range (max {MAX_LINK})"),
            ));
        }
        Ok(bits | (1 << link))
    })
}

/// Set the pattern field (bits 2:1) of the generator control word
///
/// # Errors
///
/// Returns `RocError::Configuration` for patterns the CRU cannot generate.
pub fn set_data_generator_pattern_bits(bits: &mut u32, pattern: GeneratorPattern) -> Result<()> {
    let code = match pattern {
        GeneratorPattern::Incremental => generator::PATTERN_INCREMENTAL,
        GeneratorPattern::Alternating => generator::PATTERN_ALTERNATING,
        GeneratorPattern::Constant => generator::PATTERN_CONSTANT,
        GeneratorPattern::Flying0
        | GeneratorPattern::Flying1
        | GeneratorPattern::Decremental
        | GeneratorPattern::Random => {
            return Err(RocError::configuration(
                "GeneratorPattern",
                format!("{pattern} not supported by the CRU generator"),
            ))
        }
    };
    *bits = set_bits(*bits, generator::PATTERN_LSB, generator::PATTERN_WIDTH, code);
    Ok(())
}

/// Set the size field (bits 15:8) of the generator control word
///
/// # Errors
///
/// Returns `RocError::Configuration` unless `size` is a multiple of 32 bytes
/// between 32 bytes and 8 KiB.
pub fn set_data_generator_size_bits(bits: &mut u32, size: usize) -> Result<()> {
    if size % generator::SIZE_GRANULARITY != 0
        || !(generator::SIZE_MIN..=generator::SIZE_MAX).contains(&size)
    {
        return Err(RocError::configuration(
            "GeneratorDataSize",
            format!(
                "{size} bytes: must be a multiple of {} between {} and {}",
                generator::SIZE_GRANULARITY,
                generator::SIZE_MIN,
                generator::SIZE_MAX
            ),
        ));
    }

    // At most SIZE_MAX / 32 - 1 = 255
    #[allow(clippy::cast_possible_truncation)]
    let code = (size / generator::SIZE_GRANULARITY - 1) as u32;
    *bits = set_bits(*bits, generator::SIZE_LSB, generator::SIZE_WIDTH, code);
    Ok(())
}

/// Set the enable bit (bit 0) of the generator control word
pub fn set_data_generator_enable_bits(bits: &mut u32, enabled: bool) {
    *bits = set_bit(*bits, generator::ENABLE_BIT, enabled);
}

/// Set the random size bit (bit 16) of the generator control word
pub fn set_data_generator_random_size_bits(bits: &mut u32, enabled: bool) {
    *bits = set_bit(*bits, generator::RANDOM_SIZE_BIT, enabled);
}
