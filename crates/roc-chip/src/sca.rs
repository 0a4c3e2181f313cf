//! SCA slow-control registers and command words.
//!
//! The SCA is reached through seven registers in BAR 2. A transaction writes
//! a data word and a command word, pulses CONTROL, waits for BUSY to drop and
//! reads back the response pair.
//!
//! Command word layout:
//!
//! ```text
//! bits 31:24  channel
//! bits 23:16  transaction ID
//! bits  7:0   command (request) / error flags (response); 0x40 = channel busy
//! ```

use crate::Register;

// ── Registers ────────────────────────────────────────────────────────────────

/// Data word of the next request.
pub const WRITE_DATA: Register = Register::new(0x1E0);
/// Command word of the next request.
pub const WRITE_COMMAND: Register = Register::new(0x1E4);
/// Control register (see [`control`]).
pub const CONTROL: Register = Register::new(0x1E8);
/// Non-zero while a request is in flight.
pub const BUSY: Register = Register::new(0x1EC);
/// Data word of the last response.
pub const READ_DATA: Register = Register::new(0x1F0);
/// Command word of the last response.
pub const READ_COMMAND: Register = Register::new(0x1F4);
/// Duration of the last transaction, in 4 ns ticks.
pub const TIME: Register = Register::new(0x1FC);

/// Nanoseconds per `TIME` tick.
pub const TIME_TICK_NS: u32 = 4;

/// Word offset added to every SCA register, per card family.
pub mod offset {
    /// C-RORC.
    pub const CRORC: usize = 0;
    /// CRU.
    pub const CRU: usize = 0;
    /// Anything else.
    pub const OTHER: usize = 0;
}

/// Upper bound on BUSY (and channel busy) polls per wait.
pub const MAX_BUSY_ITERATIONS: u32 = 10_000;

/// CONTROL register values.
pub mod control {
    /// Idle.
    pub const IDLE: u32 = 0x0;
    /// Reset/handshake step one.
    pub const INIT_1: u32 = 0x1;
    /// Reset/handshake step two.
    pub const INIT_2: u32 = 0x2;
    /// Execute the request held in WRITE_COMMAND / WRITE_DATA.
    pub const EXECUTE: u32 = 0x4;
}

// ── Command word layout ──────────────────────────────────────────────────────

/// Least significant bit of the channel field.
pub const CHANNEL_LSB: u32 = 24;
/// Least significant bit of the transaction ID field.
pub const TRANSACTION_LSB: u32 = 16;
/// Mask of the command / error flags byte.
pub const COMMAND_MASK: u32 = 0xFF;
/// Low byte value of a response whose channel is still busy.
pub const CHANNEL_BUSY: u32 = 0x40;
/// Number of error flag bits checked in a response (bits 0 to 6).
pub const ERROR_FLAG_BITS: u32 = 7;

/// Build a command word from its fields.
#[must_use]
pub const fn command_word(channel: u8, transaction: u8, command: u8) -> u32 {
    ((channel as u32) << CHANNEL_LSB) | ((transaction as u32) << TRANSACTION_LSB) | command as u32
}

/// A request: command word plus data word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    /// Command word.
    pub command: u32,
    /// Data word.
    pub data: u32,
}

/// GPIO requests used by the control plane.
pub mod gpio {
    use super::{command_word, Request};

    /// Node controller channel.
    const NODE_CONTROLLER: u8 = 0x00;
    /// GPIO channel.
    const GPIO: u8 = 0x02;

    /// Write node controller CONTROL REG B: enable the GPIO channel.
    pub const WR_CONTROL_REG_B: Request = Request {
        command: command_word(NODE_CONTROLLER, 0x01, 0x02),
        data: 0xFF00_0000,
    };
    /// Read back node controller CONTROL REG B.
    pub const RD_CONTROL_REG_B: Request = Request {
        command: command_word(NODE_CONTROLLER, 0x02, 0x03),
        data: 0xFF00_0000,
    };
    /// Write GPIO direction: all pins output.
    pub const WR_GPIO_DIR: Request = Request {
        command: command_word(GPIO, 0x03, 0x20),
        data: 0xFFFF_FFFF,
    };
    /// Read back GPIO direction.
    pub const RD_GPIO_DIR: Request = Request {
        command: command_word(GPIO, 0x04, 0x21),
        data: 0x0,
    };
    /// Write the GPIO output register; the data word is supplied by the caller.
    pub const WR_REGISTER_OUT_DATA: u32 = command_word(GPIO, 0x04, 0x10);
    /// Read the GPIO output register.
    pub const RD_DATA: Request = Request {
        command: command_word(GPIO, 0x05, 0x11),
        data: 0x0,
    };
    /// Read the GPIO input register.
    pub const RD_REGISTER_DATAIN: Request = Request {
        command: command_word(GPIO, 0x06, 0x01),
        data: 0x0,
    };

    /// GPIO enable sequence run after the CONTROL handshake.
    pub const ENABLE_SEQUENCE: [Request; 4] =
        [WR_CONTROL_REG_B, RD_CONTROL_REG_B, WR_GPIO_DIR, RD_GPIO_DIR];
}
