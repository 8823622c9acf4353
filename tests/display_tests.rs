//! Tests for the bus arbiter, log timestamps and the display presenter.

use std::cell::{Cell, RefCell};

use door_controller::access::{self, AccessControl};
use door_controller::bus::{BusArbiter, Stamp};
use door_controller::config::{Holds, DEFAULT_ALLOWED_UIDS};
use door_controller::display::Presenter;
use door_controller::drivers::lcd::LCD_ADDRESS;
use door_controller::drivers::panel::I2cPanel;
use door_controller::drivers::{CharacterDisplay, RealTimeClock, TimeOfDay};
use door_controller::shared::{BacklightState, DetectionState, LockState, SharedState, Snapshot};
use door_controller::uid::{AllowList, TagUid};
use door_controller::Error;
use embassy_futures::block_on;
use embassy_futures::select::select;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Instant, Timer};
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{self, I2c, Operation};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Op {
    Init,
    Clear(u8, u8, u8),
    Write(u8, u8, String),
    Backlight(bool),
}

#[derive(Default)]
struct FakePanel {
    ops: Vec<Op>,
    fail_writes: bool,
    time: Option<TimeOfDay>,
}

impl CharacterDisplay for FakePanel {
    fn init(&mut self) -> Result<(), Error> {
        self.ops.push(Op::Init);
        Ok(())
    }

    fn clear_region(&mut self, line: u8, col: u8, width: u8) -> Result<(), Error> {
        self.ops.push(Op::Clear(line, col, width));
        Ok(())
    }

    fn write(&mut self, line: u8, col: u8, text: &str) -> Result<(), Error> {
        if self.fail_writes {
            return Err(Error::Bus);
        }
        self.ops.push(Op::Write(line, col, text.to_string()));
        Ok(())
    }

    fn backlight(&mut self, on: bool) -> Result<(), Error> {
        self.ops.push(Op::Backlight(on));
        Ok(())
    }
}

impl RealTimeClock for FakePanel {
    fn now(&mut self) -> Result<TimeOfDay, Error> {
        self.time.ok_or(Error::Bus)
    }
}

/// I2C bus that NACKs while `nack` is set and records every byte written.
struct FlakyI2c<'a> {
    nack: &'a Cell<bool>,
    sent: &'a RefCell<Vec<(u8, u8)>>,
}

impl i2c::ErrorType for FlakyI2c<'_> {
    type Error = i2c::ErrorKind;
}

impl I2c for FlakyI2c<'_> {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if self.nack.get() {
            return Err(i2c::ErrorKind::NoAcknowledge(
                i2c::NoAcknowledgeSource::Address,
            ));
        }
        for op in operations.iter_mut() {
            if let Operation::Write(bytes) = op {
                self.sent
                    .borrow_mut()
                    .extend(bytes.iter().map(|&b| (address, b)));
            }
        }
        Ok(())
    }
}

struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// HD44780 8-bit reset then 4-bit switch, each nibble strobed EN high then low.
const LCD_RESET_NIBBLES: [u8; 8] = [0x34, 0x30, 0x34, 0x30, 0x34, 0x30, 0x24, 0x20];

fn snapshot(detected: bool, lock: LockState, backlight: BacklightState) -> Snapshot {
    Snapshot {
        lock,
        backlight,
        detection: DetectionState {
            proximity: detected,
            motion: false,
        },
    }
}

fn boot_snapshot() -> Snapshot {
    snapshot(false, LockState::Locked, BacklightState::Off)
}

// ============================================================================
// Bus arbiter
// ============================================================================

#[test]
fn test_bus_acquire_when_free() {
    let bus = BusArbiter::new(FakePanel::default(), Duration::from_millis(50));
    let result = block_on(bus.with(|panel| panel.backlight(true)));
    assert_eq!(result, Ok(Ok(())));
}

#[test]
fn test_bus_held_externally_times_out_at_bound() {
    let bus = BusArbiter::new(FakePanel::default(), Duration::from_millis(50));
    let _held = block_on(bus.acquire()).unwrap();

    let start = std::time::Instant::now();
    let result = block_on(bus.with(|_| ()));
    let elapsed = start.elapsed();

    assert_eq!(result, Err(Error::BusTimeout));
    assert!(elapsed >= std::time::Duration::from_millis(49), "{:?}", elapsed);
    assert!(elapsed < std::time::Duration::from_millis(300), "{:?}", elapsed);
}

#[test]
fn test_bus_released_guard_allows_next_caller() {
    let bus = BusArbiter::new(FakePanel::default(), Duration::from_millis(50));
    {
        let _held = block_on(bus.acquire()).unwrap();
    }
    assert!(block_on(bus.acquire()).is_ok());
}

// ============================================================================
// Timestamps
// ============================================================================

#[test]
fn test_timestamp_reads_clock() {
    let time = TimeOfDay {
        hour: 7,
        minute: 5,
        second: 9,
    };
    let bus = BusArbiter::new(
        FakePanel {
            time: Some(time),
            ..Default::default()
        },
        Duration::from_millis(50),
    );
    let stamp = block_on(bus.timestamp());
    assert_eq!(stamp, Stamp(Some(time)));
    assert_eq!(stamp.to_string(), "07:05:09");
}

#[test]
fn test_timestamp_placeholder_when_bus_held() {
    let bus = BusArbiter::new(
        FakePanel {
            time: Some(TimeOfDay {
                hour: 1,
                minute: 2,
                second: 3,
            }),
            ..Default::default()
        },
        Duration::from_millis(50),
    );
    let _held = block_on(bus.acquire()).unwrap();

    let start = std::time::Instant::now();
    let stamp = block_on(bus.timestamp());
    assert_eq!(stamp, Stamp(None));
    assert_eq!(stamp.to_string(), "--:--:--");
    assert!(start.elapsed() < std::time::Duration::from_millis(300));
}

#[test]
fn test_timestamp_placeholder_when_clock_fails() {
    let bus = BusArbiter::new(FakePanel::default(), Duration::from_millis(50));
    assert_eq!(block_on(bus.timestamp()), Stamp(None));
}

#[test]
fn test_access_keeps_deciding_while_bus_is_held() {
    let shared = SharedState::new(Holds::default());
    let bus = BusArbiter::new(FakePanel::default(), Duration::from_millis(50));
    let tags: Channel<CriticalSectionRawMutex, TagUid, 5> = Channel::new();
    let access = AccessControl::new(AllowList::parse(DEFAULT_ALLOWED_UIDS));
    let _held = block_on(bus.acquire()).unwrap();

    tags.try_send(TagUid::parse("DE AD BE EF").unwrap()).unwrap();
    tags.try_send(TagUid::parse("DE AD BE EF").unwrap()).unwrap();
    tags.try_send(TagUid::parse("01 02 03 04").unwrap()).unwrap();

    block_on(select(
        access::run(access, &shared, &bus, tags.receiver()),
        // Re-scan and denial each wait out one bus bound for their stamp
        Timer::after(Duration::from_millis(400)),
    ));

    assert!(tags.is_empty());
    assert_eq!(shared.lock_state(), LockState::Locked);
    assert_eq!(shared.backlight(), BacklightState::On);
}

// ============================================================================
// Presenter
// ============================================================================

#[test]
fn test_first_render_draws_labels_values_and_backlight() {
    let mut panel = FakePanel::default();
    let mut presenter = Presenter::new();

    assert_eq!(presenter.render(&mut panel, boot_snapshot()), Ok(2));
    assert_eq!(
        panel.ops,
        vec![
            Op::Init,
            Op::Write(0, 0, "Status:".into()),
            Op::Write(1, 0, "Door:".into()),
            Op::Clear(0, 8, 8),
            Op::Write(0, 8, "None".into()),
            Op::Clear(1, 8, 8),
            Op::Write(1, 8, "Locked".into()),
            Op::Backlight(false),
        ]
    );
}

#[test]
fn test_unchanged_state_writes_nothing() {
    let mut panel = FakePanel::default();
    let mut presenter = Presenter::new();
    presenter.render(&mut panel, boot_snapshot()).unwrap();
    panel.ops.clear();

    assert_eq!(presenter.render(&mut panel, boot_snapshot()), Ok(0));
    assert!(panel.ops.is_empty());
}

#[test]
fn test_only_changed_line_is_rewritten() {
    let mut panel = FakePanel::default();
    let mut presenter = Presenter::new();
    presenter.render(&mut panel, boot_snapshot()).unwrap();
    panel.ops.clear();

    let unlocked = snapshot(false, LockState::Unlocked, BacklightState::Off);
    assert_eq!(presenter.render(&mut panel, unlocked), Ok(1));
    assert_eq!(
        panel.ops,
        vec![Op::Clear(1, 8, 8), Op::Write(1, 8, "Unlocked".into())]
    );
}

#[test]
fn test_backlight_follows_flag() {
    let mut panel = FakePanel::default();
    let mut presenter = Presenter::new();
    presenter.render(&mut panel, boot_snapshot()).unwrap();
    panel.ops.clear();

    let detected = snapshot(true, LockState::Locked, BacklightState::On);
    presenter.render(&mut panel, detected).unwrap();
    assert_eq!(
        panel.ops,
        vec![
            Op::Clear(0, 8, 8),
            Op::Write(0, 8, "Detected".into()),
            Op::Backlight(true),
        ]
    );
}

#[test]
fn test_render_error_forces_full_redraw() {
    let mut panel = FakePanel::default();
    let mut presenter = Presenter::new();
    presenter.render(&mut panel, boot_snapshot()).unwrap();

    panel.fail_writes = true;
    let unlocked = snapshot(false, LockState::Unlocked, BacklightState::Off);
    assert_eq!(presenter.render(&mut panel, unlocked), Err(Error::Bus));

    panel.fail_writes = false;
    panel.ops.clear();
    assert_eq!(presenter.render(&mut panel, unlocked), Ok(2));
    assert_eq!(panel.ops[0], Op::Init);
    assert_eq!(panel.ops[1], Op::Write(0, 0, "Status:".into()));
    assert_eq!(panel.ops.last(), Some(&Op::Backlight(false)));
}

#[test]
fn test_unchanged_state_does_not_reinitialize() {
    let mut panel = FakePanel::default();
    let mut presenter = Presenter::new();
    presenter.render(&mut panel, boot_snapshot()).unwrap();
    presenter.render(&mut panel, boot_snapshot()).unwrap();

    let inits = panel.ops.iter().filter(|op| **op == Op::Init).count();
    assert_eq!(inits, 1);
}

#[test]
fn test_panel_missing_at_boot_is_initialized_once_it_answers() {
    let nack = Cell::new(true);
    let sent = RefCell::new(Vec::new());
    let mut panel = I2cPanel::new(
        FlakyI2c {
            nack: &nack,
            sent: &sent,
        },
        NoDelay,
    );
    let mut presenter = Presenter::new();

    assert_eq!(presenter.render(&mut panel, boot_snapshot()), Err(Error::Bus));
    assert!(sent.borrow().is_empty());

    nack.set(false);
    assert_eq!(presenter.render(&mut panel, boot_snapshot()), Ok(2));
    {
        let sent = sent.borrow();
        assert!(sent.len() > LCD_RESET_NIBBLES.len());
        assert!(sent.iter().all(|&(addr, _)| addr == LCD_ADDRESS));
        let leading: Vec<u8> = sent[..LCD_RESET_NIBBLES.len()]
            .iter()
            .map(|&(_, b)| b)
            .collect();
        assert_eq!(leading, LCD_RESET_NIBBLES);
    }

    sent.borrow_mut().clear();
    assert_eq!(presenter.render(&mut panel, boot_snapshot()), Ok(0));
    assert!(sent.borrow().is_empty());
}

#[test]
fn test_panel_error_mid_render_reinitializes_next_cycle() {
    let nack = Cell::new(false);
    let sent = RefCell::new(Vec::new());
    let mut panel = I2cPanel::new(
        FlakyI2c {
            nack: &nack,
            sent: &sent,
        },
        NoDelay,
    );
    let mut presenter = Presenter::new();
    presenter.render(&mut panel, boot_snapshot()).unwrap();

    nack.set(true);
    let unlocked = snapshot(false, LockState::Unlocked, BacklightState::Off);
    assert_eq!(presenter.render(&mut panel, unlocked), Err(Error::Bus));

    nack.set(false);
    sent.borrow_mut().clear();
    assert_eq!(presenter.render(&mut panel, unlocked), Ok(2));
    let leading: Vec<u8> = sent.borrow()[..LCD_RESET_NIBBLES.len()]
        .iter()
        .map(|&(_, b)| b)
        .collect();
    assert_eq!(leading, LCD_RESET_NIBBLES);
}

#[test]
fn test_presenter_run_skips_cycles_while_bus_held() {
    let shared = SharedState::new(Holds::default());
    let bus = BusArbiter::new(FakePanel::default(), Duration::from_millis(50));

    block_on(select(Presenter::new().run(&shared, &bus), async {
        Timer::after(Duration::from_millis(50)).await;
        let held = bus.acquire().await.unwrap();
        let drawn = held.ops.len();
        shared.grant(Instant::now());
        Timer::after(Duration::from_millis(300)).await;
        assert_eq!(held.ops.len(), drawn);
    }));

    let panel = block_on(bus.acquire()).unwrap();
    assert!(!panel.ops.iter().any(|op| *op == Op::Write(1, 8, "Unlocked".into())));
}
