//! ESP32 board glue: echo-line interrupt, SPI chip-select adapter and the
//! hardware watchdog.

use core::cell::RefCell;

use critical_section::Mutex;
use door_controller::capture::PulseCapture;
use embassy_time::{Duration, Ticker};
use embedded_hal::spi::{ErrorType, Operation, SpiBus, SpiDevice};
use esp_hal::delay::Delay;
use esp_hal::gpio::{Event, Input, InputConfig, InputPin, Io, Output, Pull};
use esp_hal::handler;
use esp_hal::interrupt::Priority;
use esp_hal::peripherals::{IO_MUX, TIMG1};
use esp_hal::timer::timg::{MwdtStage, Wdt};

/// Echo pulse capture, fed from [`gpio_handler`].
pub static ECHO: PulseCapture = PulseCapture::new();

static ECHO_PIN: Mutex<RefCell<Option<Input<'static>>>> = Mutex::new(RefCell::new(None));

const WATCHDOG_TIMEOUT: Duration = Duration::from_secs(30);
const WATCHDOG_FEED_PERIOD: Duration = Duration::from_secs(10);

/// Both echo edges. The level read after the edge tells which one it was.
/// Highest priority keeps the timestamp close to the edge.
#[handler(priority = Priority::Priority3)]
fn gpio_handler() {
    let now_us = esp_hal::time::Instant::now()
        .duration_since_epoch()
        .as_micros() as u32;

    let level = critical_section::with(|cs| {
        let mut pin = ECHO_PIN.borrow_ref_mut(cs);
        let pin = pin.as_mut()?;
        if !pin.is_interrupt_set() {
            return None;
        }
        pin.clear_interrupt();
        Some(pin.is_high())
    });

    match level {
        Some(true) => ECHO.on_rising(now_us),
        Some(false) => ECHO.on_falling(now_us),
        None => {}
    }
}

/// Take the echo pin and route its edges to [`ECHO`].
///
/// GPIO34..39 have no internal pulls; the echo line needs an external
/// pull-down.
pub fn attach_echo<P: InputPin + 'static>(pin: P, io_mux: IO_MUX<'static>) {
    let mut echo = Input::new(pin, InputConfig::default().with_pull(Pull::None));
    echo.listen(Event::AnyEdge);

    critical_section::with(|cs| {
        ECHO_PIN.borrow_ref_mut(cs).replace(echo);
    });

    let mut io = Io::new(io_mux);
    io.set_interrupt_handler(gpio_handler);
}

/// `SpiDevice` over an exclusively owned bus and a manual chip select.
pub struct ExclusiveSpi<B> {
    bus: B,
    cs: Output<'static>,
    delay: Delay,
}

impl<B> ExclusiveSpi<B> {
    pub fn new(bus: B, cs: Output<'static>) -> Self {
        Self {
            bus,
            cs,
            delay: Delay::new(),
        }
    }
}

impl<B: SpiBus<u8>> ErrorType for ExclusiveSpi<B> {
    type Error = B::Error;
}

impl<B: SpiBus<u8>> SpiDevice for ExclusiveSpi<B> {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        self.cs.set_low();
        let result = self.run(operations);
        let flushed = self.bus.flush();
        self.cs.set_high();
        result.and(flushed)
    }
}

impl<B: SpiBus<u8>> ExclusiveSpi<B> {
    fn run(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), B::Error> {
        for op in operations.iter_mut() {
            match op {
                Operation::Read(buf) => self.bus.read(buf)?,
                Operation::Write(buf) => self.bus.write(buf)?,
                Operation::Transfer(read, write) => self.bus.transfer(read, write)?,
                Operation::TransferInPlace(buf) => self.bus.transfer_in_place(buf)?,
                Operation::DelayNs(ns) => {
                    self.bus.flush()?;
                    self.delay.delay_nanos(*ns);
                }
            }
        }
        Ok(())
    }
}

/// Arm the TIMG1 watchdog. A panic stops the feeder, so the board resets.
pub fn start_watchdog(mut wdt: Wdt<TIMG1<'static>>) -> Wdt<TIMG1<'static>> {
    wdt.set_timeout(
        MwdtStage::Stage0,
        esp_hal::time::Duration::from_millis(WATCHDOG_TIMEOUT.as_millis()),
    );
    wdt.enable();
    wdt
}

pub async fn feed_watchdog(mut wdt: Wdt<TIMG1<'static>>) -> ! {
    log::info!(
        "watchdog: armed, timeout={}s feed={}s",
        WATCHDOG_TIMEOUT.as_secs(),
        WATCHDOG_FEED_PERIOD.as_secs()
    );
    let mut ticker = Ticker::every(WATCHDOG_FEED_PERIOD);
    loop {
        wdt.feed();
        ticker.next().await;
    }
}
