//! CRU BAR 2 register map.
//!
//! Addresses are taken from the CRU firmware address table (`add_bsp_*`,
//! `add_ttc_*`, `add_gbt_*` entries). Only the registers the control plane
//! touches are listed.
//!
//! ```text
//! 0x0000_0004  firmware git hash
//! 0x0000_0008  firmware build date   (BCD-ish, printed as hex)
//! 0x0000_000c  firmware build time   (printed as hex)
//! 0x0000_0400  reset control         bit 0: card reset, bit 1: generator counter reset
//! 0x0000_041c  firmware features
//! 0x0000_0600  data generator control (see `generator`)
//! 0x0000_0604  data generator inject error
//! 0x0000_0608  link enable mask
//! 0x0001_0008  temperature           10-bit raw sensor value
//! 0x0001_0014  FPGA chip ID, high word
//! 0x0001_0018  FPGA chip ID, low word
//! 0x0002_000c  serial number
//! 0x0024_0000  CTP clock frequency
//! 0x0024_0004  local clock frequency
//! 0x0040_0000  GBT wrapper 0 base
//! 0x0050_0000  GBT wrapper 1 base
//! 0x0060_0000  data source selection
//! 0x0060_001c  dropped packets counter
//! ```

use crate::Register;

// ── Firmware identity ────────────────────────────────────────────────────────

/// Firmware git hash.
pub const FIRMWARE_GIT_HASH: Register = Register::new(0x0000_0004);
/// Firmware build date.
pub const FIRMWARE_DATE: Register = Register::new(0x0000_0008);
/// Firmware build time.
pub const FIRMWARE_TIME: Register = Register::new(0x0000_000C);
/// Firmware feature flags (see [`features`]).
pub const FIRMWARE_FEATURES: Register = Register::new(0x0000_041C);

// ── Control ──────────────────────────────────────────────────────────────────

/// Reset control (see [`reset`]).
pub const RESET_CONTROL: Register = Register::new(0x0000_0400);
/// Data generator control (see [`generator`]).
pub const DATA_GENERATOR_CONTROL: Register = Register::new(0x0000_0600);
/// Write 1 to inject a single error into the generated data.
pub const DATA_GENERATOR_INJECT_ERROR: Register = Register::new(0x0000_0604);
/// One bit per link; set to enable.
pub const LINK_ENABLE: Register = Register::new(0x0000_0608);
/// Data source selection (0 = GBT, 1 = internal generator).
pub const DATA_SOURCE_SELECT: Register = Register::new(0x0060_0000);

// ── Housekeeping ─────────────────────────────────────────────────────────────

/// Temperature sensor, raw 10-bit value.
pub const TEMPERATURE: Register = Register::new(0x0001_0008);
/// FPGA chip ID, high 32 bits.
pub const FPGA_CHIP_HIGH: Register = Register::new(0x0001_0014);
/// FPGA chip ID, low 32 bits.
pub const FPGA_CHIP_LOW: Register = Register::new(0x0001_0018);
/// Card serial number; reads `0xffffffff` when unprogrammed.
pub const SERIAL_NUMBER: Register = Register::new(0x0002_000C);

// ── TTC clocks ───────────────────────────────────────────────────────────────

/// Measured CTP (240 MHz TTC) clock frequency.
pub const CTP_CLOCK: Register = Register::new(0x0024_0000);
/// Measured local 240 MHz clock frequency.
pub const LOCAL_CLOCK: Register = Register::new(0x0024_0004);

// ── GBT ──────────────────────────────────────────────────────────────────────

/// Base of GBT wrapper 0.
pub const WRAPPER0: Register = Register::new(0x0040_0000);
/// Base of GBT wrapper 1.
pub const WRAPPER1: Register = Register::new(0x0050_0000);
/// Wrapper configuration word 0, relative to the wrapper base.
pub const GBT_WRAPPER_CONF0: u32 = 0x0000_0000;
/// Number of GBT wrappers on the card.
pub const WRAPPER_COUNT: u32 = 2;

/// Bit field of the links count inside `GBT_WRAPPER_CONF0`: bits [31:24].
pub mod wrapper_conf0 {
    /// Least significant bit of the links count.
    pub const LINKS_LSB: u32 = 24;
    /// Width of the links count.
    pub const LINKS_WIDTH: u32 = 8;
}

/// Dropped packets counter.
pub const NUM_DROPPED_PACKETS: Register = Register::new(0x0060_001C);

// ── Temperature conversion ───────────────────────────────────────────────────

/// Temperature register conversion (Altera temperature sensing diode).
pub mod temperature {
    /// Largest valid raw value; the sensor register is 10 bits wide.
    pub const RAW_MAX: u32 = 1023;
    /// Slope numerator of `°C = raw * A / 1024 - B`.
    pub const A: f32 = 693.0;
    /// Offset of `°C = raw * A / 1024 - B`.
    pub const B: f32 = 265.0;
}

// ── Bit definitions ──────────────────────────────────────────────────────────

/// Reset control register bits.
pub mod reset {
    /// Reset the whole card.
    pub const CARD: u32 = 0;
    /// Reset the data generator counter.
    pub const GENERATOR_COUNTER: u32 = 1;
}

/// Data generator control register bit fields.
///
/// ```text
/// bit  0      enable
/// bits 2:1    pattern (01 incremental, 10 alternating, 11 constant)
/// bits 15:8   size: (bytes / 32) - 1
/// bit  16     random size enable
/// ```
pub mod generator {
    /// Enable bit.
    pub const ENABLE_BIT: u32 = 0;
    /// Pattern field, least significant bit.
    pub const PATTERN_LSB: u32 = 1;
    /// Pattern field width.
    pub const PATTERN_WIDTH: u32 = 2;
    /// Pattern code: incremental.
    pub const PATTERN_INCREMENTAL: u32 = 0b01;
    /// Pattern code: alternating.
    pub const PATTERN_ALTERNATING: u32 = 0b10;
    /// Pattern code: constant.
    pub const PATTERN_CONSTANT: u32 = 0b11;
    /// Size field, least significant bit.
    pub const SIZE_LSB: u32 = 8;
    /// Size field width.
    pub const SIZE_WIDTH: u32 = 8;
    /// Size granularity in bytes.
    pub const SIZE_GRANULARITY: usize = 32;
    /// Smallest generated page in bytes.
    pub const SIZE_MIN: usize = 32;
    /// Largest generated page in bytes (8 KiB).
    pub const SIZE_MAX: usize = 8 * 1024;
    /// Random size enable bit.
    pub const RANDOM_SIZE_BIT: u32 = 16;
}

/// Firmware features register layout.
///
/// Standalone (development) firmware tags the upper half with
/// [`STANDALONE_TAG`](features::STANDALONE_TAG) and uses the low bits as
/// active-low "feature disabled" flags. Integrated firmware has every
/// feature.
pub mod features {
    /// Upper 16 bits of the register on standalone firmware.
    pub const STANDALONE_TAG: u32 = 0x5AFE;
    /// Data source selection disabled.
    pub const DATA_SELECTION_DISABLED: u32 = 0;
    /// Temperature sensor disabled.
    pub const TEMPERATURE_DISABLED: u32 = 1;
    /// Serial number disabled.
    pub const SERIAL_DISABLED: u32 = 2;
    /// Firmware info disabled.
    pub const FIRMWARE_INFO_DISABLED: u32 = 3;
    /// FPGA chip ID disabled.
    pub const CHIP_ID_DISABLED: u32 = 4;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_addresses_unique() {
        let regs = [
            FIRMWARE_GIT_HASH,
            FIRMWARE_DATE,
            FIRMWARE_TIME,
            FIRMWARE_FEATURES,
            RESET_CONTROL,
            DATA_GENERATOR_CONTROL,
            DATA_GENERATOR_INJECT_ERROR,
            LINK_ENABLE,
            DATA_SOURCE_SELECT,
            TEMPERATURE,
            FPGA_CHIP_HIGH,
            FPGA_CHIP_LOW,
            SERIAL_NUMBER,
            CTP_CLOCK,
            LOCAL_CLOCK,
            WRAPPER0,
            WRAPPER1,
            NUM_DROPPED_PACKETS,
        ];
        for (i, a) in regs.iter().enumerate() {
            assert_eq!(a.address % 4, 0, "{a:?} not word aligned");
            for b in &regs[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn generator_fields_disjoint() {
        use generator::*;
        let enable = 1 << ENABLE_BIT;
        let pattern = ((1 << PATTERN_WIDTH) - 1) << PATTERN_LSB;
        let size = ((1 << SIZE_WIDTH) - 1) << SIZE_LSB;
        let random = 1 << RANDOM_SIZE_BIT;
        assert_eq!(enable & pattern, 0);
        assert_eq!(pattern & size, 0);
        assert_eq!(size & random, 0);
        assert_eq!(enable | pattern | size | random, 0x0001_ff07);
    }

    #[test]
    fn size_field_covers_full_range() {
        use generator::*;
        let largest_code = (SIZE_MAX / SIZE_GRANULARITY) - 1;
        assert!(largest_code < (1 << SIZE_WIDTH));
    }
}
