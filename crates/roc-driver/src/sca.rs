//! SCA slow-control engine
//!
//! The SCA is reached through seven BAR 2 registers. A transaction writes a
//! data word and a command word, pulses CONTROL, waits for BUSY to clear and
//! then reads the response pair back:
//!
//! ```text
//! write(cmd, data):  WRITE_DATA <- data
//!                    WRITE_COMMAND <- cmd
//!                    CONTROL <- 4, CONTROL <- 0
//!                    poll BUSY until 0             (TimeoutError after 10 000)
//! read():            READ_DATA, READ_COMMAND
//!                    re-poll READ_COMMAND while low byte == 0x40   (no error)
//!                    low byte bits 0..=6 set       (ProtocolError)
//! ```
//!
//! [`Sca`] holds the only mutable borrow of its register window for its
//! whole life, so nothing can interleave with the CONTROL handshake.

use crate::bar::RegisterReadWrite;
use crate::card::CardType;
use crate::error::{Result, RocError};
use roc_chip::sca::{self, control, gpio, offset, Request};
use roc_chip::{get_bit, get_bits, Register};
use std::fmt;

/// Protocol state of an [`Sca`] engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaState {
    /// Not initialized, or the last operation failed
    Uninitialized,
    /// Running the CONTROL handshake and GPIO enable sequence
    Initializing,
    /// Ready for a transaction
    Idle,
    /// A request is in flight
    Busy,
}

/// Response pair of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaResult {
    /// Response command word; the low byte holds the error flags
    pub command: u32,
    /// Response data word
    pub data: u32,
}

impl fmt::Display for ScaResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x} {:#010x}", self.command, self.data)
    }
}

/// Fields of a command word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaCommand {
    /// SCA channel, bits 31:24
    pub channel: u8,
    /// Transaction ID, bits 23:16
    pub transaction: u8,
    /// Command (request) or error flags (response), bits 7:0
    pub opcode: u8,
}

impl From<ScaCommand> for u32 {
    fn from(command: ScaCommand) -> Self {
        sca::command_word(command.channel, command.transaction, command.opcode)
    }
}

impl From<u32> for ScaCommand {
    // Each field is masked to 8 bits first
    #[allow(clippy::cast_possible_truncation)]
    fn from(word: u32) -> Self {
        Self {
            channel: get_bits(word, sca::CHANNEL_LSB, 8) as u8,
            transaction: get_bits(word, sca::TRANSACTION_LSB, 8) as u8,
            opcode: (word & sca::COMMAND_MASK) as u8,
        }
    }
}

/// Name of response error flag `bit`
///
/// Bits 6 and 7 both mean "channel busy".
#[must_use]
pub const fn error_flag_name(bit: u32) -> &'static str {
    match bit {
        1 => "invalid channel request",
        2 => "invalid command request",
        3 => "invalid transaction number",
        4 => "invalid length",
        5 => "channel not enabled",
        6 | 7 => "channel busy",
        _ => "generic error flag",
    }
}

/// Fail with `RocError::Protocol` if any of bits 0..=6 of the response's
/// low byte is set
///
/// # Errors
///
/// Returns `RocError::Protocol` listing the set flags in ascending bit order.
pub fn check_error(command: u32) -> Result<()> {
    let code = command & sca::COMMAND_MASK;
    let flags: Vec<_> = (0..sca::ERROR_FLAG_BITS)
        .filter(|&bit| get_bit(code, bit))
        .map(error_flag_name)
        .collect();

    if flags.is_empty() {
        Ok(())
    } else {
        Err(RocError::Protocol { code, flags })
    }
}

const fn is_channel_busy(command: u32) -> bool {
    command & sca::COMMAND_MASK == sca::CHANNEL_BUSY
}

/// SCA engine over a borrowed BAR 2 register window
#[derive(Debug)]
pub struct Sca<'a, W: RegisterReadWrite + ?Sized> {
    bar: &'a mut W,
    offset: usize,
    state: ScaState,
}

impl<'a, W: RegisterReadWrite + ?Sized> Sca<'a, W> {
    /// Engine for a card of type `card_type`
    pub fn new(bar: &'a mut W, card_type: CardType) -> Self {
        let offset = match card_type {
            CardType::Crorc => offset::CRORC,
            CardType::Cru => offset::CRU,
            CardType::Unknown => offset::OTHER,
        };
        Self {
            bar,
            offset,
            state: ScaState::Uninitialized,
        }
    }

    /// Current protocol state
    pub const fn state(&self) -> ScaState {
        self.state
    }

    /// Run the CONTROL handshake, then enable the GPIO channel
    ///
    /// # Errors
    ///
    /// Returns `RocError::Timeout` if BUSY never clears and
    /// `RocError::Protocol` if a GPIO enable response carries error flags.
    pub fn initialize(&mut self) -> Result<()> {
        tracing::debug!("SCA initialize");
        self.state = ScaState::Initializing;
        let result = self.handshake().and_then(|()| self.gpio_enable());
        self.settle(result)
    }

    /// Issue a request and wait for BUSY to clear
    ///
    /// # Errors
    ///
    /// Returns `RocError::Timeout` after
    /// [`MAX_BUSY_ITERATIONS`](sca::MAX_BUSY_ITERATIONS) polls.
    pub fn write(&mut self, command: u32, data: u32) -> Result<()> {
        let result = self.transmit(command, data);
        self.settle(result)
    }

    /// Read the response to the last request
    ///
    /// # Errors
    ///
    /// Returns `RocError::Protocol` if the response carries error flags.
    pub fn read(&mut self) -> Result<ScaResult> {
        let result = self.receive();
        self.settle(result)
    }

    /// Re-initialize, set the GPIO outputs to `data` and read back the inputs
    ///
    /// Returns the response to the final (input register) read.
    ///
    /// # Errors
    ///
    /// As [`initialize`](Self::initialize), [`write`](Self::write) and
    /// [`read`](Self::read).
    pub fn gpio_write(&mut self, data: u32) -> Result<ScaResult> {
        tracing::debug!("SCA GPIO write {data:#010x}");
        self.initialize()?;

        self.exchange(Request {
            command: gpio::WR_REGISTER_OUT_DATA,
            data,
        })?;
        self.exchange(gpio::RD_DATA)?;
        self.exchange(gpio::RD_REGISTER_DATAIN)
    }

    /// Read the GPIO register
    ///
    /// # Errors
    ///
    /// As [`write`](Self::write) and [`read`](Self::read).
    pub fn gpio_read(&mut self) -> Result<ScaResult> {
        self.exchange(gpio::RD_DATA)
    }

    /// Duration of the last transaction in nanoseconds
    ///
    /// # Errors
    ///
    /// Returns an error if the TIME register cannot be read.
    pub fn time(&self) -> Result<u64> {
        let ticks = self.bar_read(sca::TIME)?;
        Ok(u64::from(ticks) * u64::from(sca::TIME_TICK_NS))
    }

    fn exchange(&mut self, request: Request) -> Result<ScaResult> {
        self.write(request.command, request.data)?;
        self.read()
    }

    fn handshake(&mut self) -> Result<()> {
        self.bar_write(sca::CONTROL, control::INIT_1)?;
        self.wait_on_busy_clear()?;
        self.bar_write(sca::CONTROL, control::INIT_2)?;
        self.wait_on_busy_clear()?;
        self.bar_write(sca::CONTROL, control::INIT_1)?;
        self.wait_on_busy_clear()?;
        self.bar_write(sca::CONTROL, control::IDLE)
    }

    fn gpio_enable(&mut self) -> Result<()> {
        for request in gpio::ENABLE_SEQUENCE {
            self.transmit(request.command, request.data)?;
            self.receive()?;
        }
        Ok(())
    }

    fn transmit(&mut self, command: u32, data: u32) -> Result<()> {
        tracing::trace!("SCA write  {:?} data {data:#010x}", ScaCommand::from(command));
        self.bar_write(sca::WRITE_DATA, data)?;
        self.bar_write(sca::WRITE_COMMAND, command)?;
        self.execute_command()
    }

    fn receive(&mut self) -> Result<ScaResult> {
        let data = self.bar_read(sca::READ_DATA)?;
        let mut command = self.bar_read(sca::READ_COMMAND)?;

        // Silent on exhaustion: a response still busy after the budget
        // fails the error check below
        for _ in 0..sca::MAX_BUSY_ITERATIONS {
            if !is_channel_busy(command) {
                break;
            }
            command = self.bar_read(sca::READ_COMMAND)?;
        }

        tracing::trace!("SCA read   {:?} data {data:#010x}", ScaCommand::from(command));
        check_error(command)?;
        Ok(ScaResult { command, data })
    }

    fn execute_command(&mut self) -> Result<()> {
        if self.state != ScaState::Initializing {
            self.state = ScaState::Busy;
        }
        self.bar_write(sca::CONTROL, control::EXECUTE)?;
        self.bar_write(sca::CONTROL, control::IDLE)?;
        self.wait_on_busy_clear()
    }

    fn wait_on_busy_clear(&self) -> Result<()> {
        for _ in 0..sca::MAX_BUSY_ITERATIONS {
            if self.bar_read(sca::BUSY)? == 0 {
                return Ok(());
            }
        }
        Err(RocError::timeout("SCA busy wait", sca::MAX_BUSY_ITERATIONS))
    }

    /// State after an operation: idle on success, uninitialized on any error
    fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        self.state = match result {
            Ok(_) => ScaState::Idle,
            Err(ref e) => {
                tracing::debug!("SCA operation failed: {e}");
                ScaState::Uninitialized
            }
        };
        result
    }

    fn bar_write(&mut self, register: Register, value: u32) -> Result<()> {
        self.bar.write_register(register.index() + self.offset, value)
    }

    fn bar_read(&self, register: Register) -> Result<u32> {
        self.bar.read_register(register.index() + self.offset)
    }
}
