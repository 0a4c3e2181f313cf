//! SCA engine against a scripted register window
//!
//! The fake window records every access and answers reads from a small
//! model of the SCA: BUSY stays set for a configurable number of polls after
//! each CONTROL write, and READ_COMMAND answers with a configurable
//! sequence of low bytes.

use roc_chip::sca::{self, gpio, MAX_BUSY_ITERATIONS};
use roc_driver::{CardType, RegisterReadWrite, Result, RocError, Sca, ScaResult, ScaState};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read(usize),
    Write(usize, u32),
}

struct FakeSca {
    log: RefCell<Vec<Access>>,
    /// Polls for which BUSY reads non-zero after each CONTROL write
    busy_polls: u32,
    busy_left: Cell<u32>,
    /// Low bytes served by successive READ_COMMAND reads; the last repeats
    responses: RefCell<VecDeque<u32>>,
    last_command: Cell<u32>,
    read_data: u32,
}

impl FakeSca {
    fn new() -> Self {
        Self {
            log: RefCell::new(Vec::new()),
            busy_polls: 2,
            busy_left: Cell::new(0),
            responses: RefCell::new(VecDeque::from([0])),
            last_command: Cell::new(0),
            read_data: 0x0000_00ab,
        }
    }

    fn responding(mut self, low_bytes: &[u32]) -> Self {
        self.responses = RefCell::new(low_bytes.iter().copied().collect());
        self
    }

    fn writes(&self) -> Vec<(usize, u32)> {
        self.log
            .borrow()
            .iter()
            .filter_map(|access| match *access {
                Access::Write(index, value) => Some((index, value)),
                Access::Read(_) => None,
            })
            .collect()
    }

    fn reads_of(&self, index: usize) -> usize {
        self.log
            .borrow()
            .iter()
            .filter(|access| **access == Access::Read(index))
            .count()
    }
}

impl RegisterReadWrite for FakeSca {
    fn read_register(&self, index: usize) -> Result<u32> {
        self.log.borrow_mut().push(Access::Read(index));

        if index == sca::BUSY.index() {
            let left = self.busy_left.get();
            if left == 0 {
                return Ok(0);
            }
            self.busy_left.set(left.saturating_sub(1));
            return Ok(1);
        }
        if index == sca::READ_COMMAND.index() {
            let mut responses = self.responses.borrow_mut();
            let low = if responses.len() > 1 {
                responses.pop_front().unwrap_or(0)
            } else {
                responses.front().copied().unwrap_or(0)
            };
            return Ok((self.last_command.get() & !0xff) | low);
        }
        if index == sca::READ_DATA.index() {
            return Ok(self.read_data);
        }
        if index == sca::TIME.index() {
            return Ok(250);
        }
        Ok(0)
    }

    fn write_register(&mut self, index: usize, value: u32) -> Result<()> {
        self.log.borrow_mut().push(Access::Write(index, value));
        if index == sca::CONTROL.index() {
            self.busy_left.set(self.busy_polls);
        }
        if index == sca::WRITE_COMMAND.index() {
            self.last_command.set(value);
        }
        Ok(())
    }

    fn bar_index(&self) -> usize {
        2
    }
}

fn request_writes(command: u32, data: u32) -> Vec<(usize, u32)> {
    vec![
        (sca::WRITE_DATA.index(), data),
        (sca::WRITE_COMMAND.index(), command),
        (sca::CONTROL.index(), 4),
        (sca::CONTROL.index(), 0),
    ]
}

#[test]
fn initialize_issues_handshake_then_gpio_enable() {
    let mut fake = FakeSca::new();
    let mut engine = Sca::new(&mut fake, CardType::Cru);
    assert_eq!(engine.state(), ScaState::Uninitialized);

    engine.initialize().unwrap();
    assert_eq!(engine.state(), ScaState::Idle);
    drop(engine);

    let control = sca::CONTROL.index();
    let mut expected = vec![(control, 1), (control, 2), (control, 1), (control, 0)];
    for (command, data) in [
        (0x0001_0002, 0xff00_0000),
        (0x0002_0003, 0xff00_0000),
        (0x0203_0020, 0xffff_ffff),
        (0x0204_0021, 0x0),
    ] {
        expected.extend(request_writes(command, data));
    }
    assert_eq!(fake.writes(), expected);

    // One response pair per enable request
    assert_eq!(fake.reads_of(sca::READ_DATA.index()), 4);
}

#[test]
fn gpio_write_reinitializes_then_three_pairs() {
    let mut fake = FakeSca::new();
    let result = Sca::new(&mut fake, CardType::Cru).gpio_write(0x55).unwrap();

    assert_eq!(
        result,
        ScaResult {
            command: 0x0206_0000,
            data: 0xab
        }
    );

    let writes = fake.writes();
    let commands: Vec<u32> = writes
        .iter()
        .filter(|(index, _)| *index == sca::WRITE_COMMAND.index())
        .map(|(_, value)| *value)
        .collect();
    assert_eq!(
        commands,
        [
            0x0001_0002,
            0x0002_0003,
            0x0203_0020,
            0x0204_0021,
            gpio::WR_REGISTER_OUT_DATA,
            0x0205_0011,
            0x0206_0001
        ]
    );
    assert!(writes.contains(&(sca::WRITE_DATA.index(), 0x55)));
    assert_eq!(fake.reads_of(sca::READ_DATA.index()), 7);
}

#[test]
fn gpio_read_is_one_pair() {
    let mut fake = FakeSca::new();
    let result = Sca::new(&mut fake, CardType::Cru).gpio_read().unwrap();

    assert_eq!(result.data, 0xab);
    assert_eq!(fake.writes(), request_writes(0x0205_0011, 0));
}

#[test]
fn busy_never_clearing_times_out_after_cap() {
    let mut fake = FakeSca::new();
    fake.busy_polls = u32::MAX;

    let mut engine = Sca::new(&mut fake, CardType::Cru);
    let err = engine.write(0x0205_0011, 0).unwrap_err();
    assert!(matches!(
        err,
        RocError::Timeout {
            iterations: MAX_BUSY_ITERATIONS,
            ..
        }
    ));
    assert_eq!(engine.state(), ScaState::Uninitialized);
    drop(engine);

    assert_eq!(
        fake.reads_of(sca::BUSY.index()),
        MAX_BUSY_ITERATIONS as usize
    );
}

#[test]
fn busy_clearing_on_last_poll_succeeds() {
    let mut fake = FakeSca::new();
    fake.busy_polls = MAX_BUSY_ITERATIONS - 1;

    Sca::new(&mut fake, CardType::Cru).write(0x0205_0011, 0).unwrap();
    assert_eq!(
        fake.reads_of(sca::BUSY.index()),
        MAX_BUSY_ITERATIONS as usize
    );
}

#[test]
fn error_flags_raise_protocol_error() {
    let mut fake = FakeSca::new().responding(&[0x12]);
    let mut engine = Sca::new(&mut fake, CardType::Cru);

    engine.write(0x0205_0011, 0).unwrap();
    let err = engine.read().unwrap_err();
    assert_eq!(
        err.to_string(),
        "SCA error code 0x12: invalid channel request, invalid length"
    );
    assert_eq!(engine.state(), ScaState::Uninitialized);
}

#[test]
fn channel_busy_is_repolled_then_clears() {
    let mut fake = FakeSca::new().responding(&[0x40, 0x40, 0x40, 0x00]);

    let result = Sca::new(&mut fake, CardType::Cru).gpio_read().unwrap();
    assert_eq!(result.command & 0xff, 0);
    assert_eq!(fake.reads_of(sca::READ_COMMAND.index()), 4);
}

#[test]
fn channel_stuck_busy_stops_polling_and_reports_busy() {
    let mut fake = FakeSca::new().responding(&[0x40]);

    let err = Sca::new(&mut fake, CardType::Cru).gpio_read().unwrap_err();
    assert!(matches!(
        err,
        RocError::Protocol { code: 0x40, ref flags } if flags == &["channel busy"]
    ));
    // Initial read plus the bounded re-polls
    assert_eq!(
        fake.reads_of(sca::READ_COMMAND.index()),
        1 + MAX_BUSY_ITERATIONS as usize
    );
}

#[test]
fn time_is_reported_in_nanoseconds() {
    let mut fake = FakeSca::new();
    assert_eq!(Sca::new(&mut fake, CardType::Cru).time().unwrap(), 1000);
}
