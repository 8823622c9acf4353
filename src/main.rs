//! Door controller firmware for ESP32.
//!
//! Tasks (thread-mode executor):
//! - `sampler` -> (queue) -> `fusion`: ultrasonic + PIR presence detection
//! - `tag_reader` -> (queue) -> `access`: RFID access decisions
//! - `lock`, `display`: render the shared state to the servo and the LCD
//! - `watchdog`: feeds TIMG1
//!
//! The timer expiry service runs on an interrupt-mode executor so the lock and
//! backlight countdowns fire from interrupt context.
//!
//! Pins: trigger GPIO32, echo GPIO34 (external pull-down), PIR GPIO27, servo GPIO13,
//! I2C SDA GPIO21 / SCL GPIO22 (LCD 0x27, RTC 0x68),
//! SPI SCK GPIO18 / MOSI GPIO23 / MISO GPIO19 / CS GPIO5, RFID reset GPIO14.

#![no_std]
#![no_main]

use esp_bootloader_esp_idf::esp_app_desc;
esp_app_desc!();

mod board;

use door_controller::access::{self, AccessControl};
use door_controller::bus::BusArbiter;
use door_controller::config::{Config, SAMPLE_QUEUE_DEPTH, TAG_QUEUE_DEPTH};
use door_controller::display::Presenter;
use door_controller::drivers::mfrc522::Mfrc522;
use door_controller::drivers::panel::I2cPanel;
use door_controller::drivers::servo::Servo;
use door_controller::fusion::{self, FusionEngine};
use door_controller::lock::LockActuator;
use door_controller::sampler::{Sample, Sampler};
use door_controller::shared::SharedState;
use door_controller::tag_reader::TagReader;
use door_controller::timers;
use door_controller::uid::{AllowList, TagUid};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use esp_hal::{
    clock::CpuClock,
    delay::Delay,
    gpio::{DriveMode, Input, InputConfig, Level, Output, OutputConfig, Pull},
    i2c::master::{Config as I2cConfig, I2c},
    interrupt::{software::SoftwareInterruptControl, Priority},
    ledc::{
        channel::{self as ledc_channel, ChannelIFace as _},
        timer::{self as ledc_timer, TimerIFace as _},
        LSGlobalClkSource, Ledc, LowSpeed,
    },
    main,
    peripherals::TIMG1,
    spi::{
        master::{Config as SpiConfig, Spi},
        Mode as SpiMode,
    },
    time::Rate,
    timer::timg::{TimerGroup, Wdt},
    Blocking,
};
use esp_println::logger::init_logger;
use esp_rtos::embassy::{Executor, InterruptExecutor};
use static_cell::StaticCell;

use crate::board::ExclusiveSpi;

type Panel = I2cPanel<I2c<'static, Blocking>, Delay>;
type Rfid = Mfrc522<ExclusiveSpi<Spi<'static, Blocking>>>;
type DoorServo = Servo<ledc_channel::Channel<'static, LowSpeed>>;

static SAMPLES: Channel<CriticalSectionRawMutex, Sample, SAMPLE_QUEUE_DEPTH> = Channel::new();
static TAGS: Channel<CriticalSectionRawMutex, TagUid, TAG_QUEUE_DEPTH> = Channel::new();

static SHARED: StaticCell<SharedState> = StaticCell::new();
static BUS: StaticCell<BusArbiter<Panel>> = StaticCell::new();
static SERVO_TIMER: StaticCell<ledc_timer::Timer<'static, LowSpeed>> = StaticCell::new();
static EXECUTOR: StaticCell<Executor> = StaticCell::new();
static TIMER_EXECUTOR: StaticCell<InterruptExecutor<2>> = StaticCell::new();

#[main]
fn main() -> ! {
    init_logger(log::LevelFilter::Info);
    log::info!("door controller starting...");

    let config = Config::get();
    let allow_list = AllowList::parse(config.allowed_uids);
    if allow_list.is_empty() {
        log::warn!("config: allow-list is empty, every tag will be denied");
    }

    let peripherals = esp_hal::init(esp_hal::Config::default().with_cpu_clock(CpuClock::max()));

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    let timg1 = TimerGroup::new(peripherals.TIMG1);
    let wdt = board::start_watchdog(timg1.wdt);

    let shared: &'static SharedState = SHARED.init(SharedState::new(config.holds));

    // Ultrasonic ranger + PIR
    board::attach_echo(peripherals.GPIO34, peripherals.IO_MUX);
    let trigger = Output::new(peripherals.GPIO32, Level::Low, OutputConfig::default());
    let pir = Input::new(peripherals.GPIO27, InputConfig::default().with_pull(Pull::Down));
    let sampler = Sampler::new(&board::ECHO, trigger, pir, Delay::new());

    // LCD + RTC share I2C0
    let i2c = I2c::new(
        peripherals.I2C0,
        I2cConfig::default().with_frequency(Rate::from_khz(100)),
    )
    .unwrap_or_else(|e| fatal("i2c", e))
    .with_sda(peripherals.GPIO21)
    .with_scl(peripherals.GPIO22);
    // Initialized by the presenter on its first render
    let panel = I2cPanel::new(i2c, Delay::new());
    let bus: &'static BusArbiter<Panel> = BUS.init(BusArbiter::new(panel, config.bus_timeout));

    // MFRC522 on SPI2
    let _rfid_reset = Output::new(peripherals.GPIO14, Level::High, OutputConfig::default());
    let spi = Spi::new(
        peripherals.SPI2,
        SpiConfig::default()
            .with_frequency(Rate::from_mhz(4))
            .with_mode(SpiMode::_0),
    )
    .unwrap_or_else(|e| fatal("spi", e))
    .with_sck(peripherals.GPIO18)
    .with_mosi(peripherals.GPIO23)
    .with_miso(peripherals.GPIO19);
    let cs = Output::new(peripherals.GPIO5, Level::High, OutputConfig::default());
    let mut rfid = Mfrc522::new(ExclusiveSpi::new(spi, cs));
    match rfid.init().and_then(|()| rfid.version()) {
        Ok(version) => log::info!("rfid: mfrc522 version=0x{:02X}", version),
        Err(e) => log::error!("rfid: init failed: {}", e),
    }

    // Servo on LEDC, 50 Hz
    let mut ledc = Ledc::new(peripherals.LEDC);
    ledc.set_global_slow_clock(LSGlobalClkSource::APBClk);
    let mut servo_timer = ledc.timer::<LowSpeed>(ledc_timer::Number::Timer0);
    servo_timer
        .configure(ledc_timer::config::Config {
            duty: ledc_timer::config::Duty::Duty14Bit,
            clock_source: ledc_timer::LSClockSource::APBClk,
            frequency: Rate::from_hz(50),
        })
        .unwrap_or_else(|e| fatal("ledc timer", e));
    let servo_timer = SERVO_TIMER.init(servo_timer);
    let mut servo_channel = ledc.channel(ledc_channel::Number::Channel0, peripherals.GPIO13);
    servo_channel
        .configure(ledc_channel::config::Config {
            timer: &*servo_timer,
            duty_pct: 0,
            drive_mode: DriveMode::PushPull,
        })
        .unwrap_or_else(|e| fatal("ledc channel", e));
    let servo = Servo::new(servo_channel);

    // Timer expiry runs above the thread-mode tasks
    let sw_ints = SoftwareInterruptControl::new(peripherals.SW_INTERRUPT);
    let timer_executor = TIMER_EXECUTOR.init(InterruptExecutor::new(sw_ints.software_interrupt2));
    let timer_spawner = timer_executor.start(Priority::Priority2);
    timer_spawner.must_spawn(timers_task(shared));

    log::info!("spawning tasks, {} authorized uids", allow_list.len());
    let executor = EXECUTOR.init(Executor::new());
    executor.run(move |spawner| {
        spawner.must_spawn(sampler_task(sampler));
        spawner.must_spawn(fusion_task(shared, bus));
        spawner.must_spawn(tag_reader_task(TagReader::new(rfid)));
        spawner.must_spawn(access_task(AccessControl::new(allow_list), shared, bus));
        spawner.must_spawn(lock_task(LockActuator::new(servo), shared));
        spawner.must_spawn(display_task(shared, bus));
        spawner.must_spawn(watchdog_task(wdt));
    });
}

#[embassy_executor::task]
async fn sampler_task(
    sampler: Sampler<'static, Output<'static>, Input<'static>, Delay>,
) {
    sampler.run(SAMPLES.sender()).await
}

#[embassy_executor::task]
async fn fusion_task(shared: &'static SharedState, bus: &'static BusArbiter<Panel>) {
    fusion::run(FusionEngine::new(), shared, bus, SAMPLES.receiver()).await
}

#[embassy_executor::task]
async fn tag_reader_task(reader: TagReader<Rfid>) {
    reader.run(TAGS.sender()).await
}

#[embassy_executor::task]
async fn access_task(
    access: AccessControl,
    shared: &'static SharedState,
    bus: &'static BusArbiter<Panel>,
) {
    access::run(access, shared, bus, TAGS.receiver()).await
}

#[embassy_executor::task]
async fn lock_task(actuator: LockActuator<DoorServo>, shared: &'static SharedState) {
    actuator.run(shared).await
}

#[embassy_executor::task]
async fn display_task(shared: &'static SharedState, bus: &'static BusArbiter<Panel>) {
    Presenter::new().run(shared, bus).await
}

#[embassy_executor::task]
async fn timers_task(shared: &'static SharedState) {
    timers::run(shared).await
}

#[embassy_executor::task]
async fn watchdog_task(wdt: Wdt<TIMG1<'static>>) {
    board::feed_watchdog(wdt).await
}

/// Initialization failure: log and stop. Nothing feeds the watchdog yet, so
/// the board resets.
fn fatal(what: &str, err: impl core::fmt::Debug) -> ! {
    log::error!("init: {} failed: {:?}", what, err);
    loop {
        core::hint::spin_loop();
    }
}

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    critical_section::with(|_| {
        log::error!("PANIC: {}", info);
    });

    // Spin without feeding the watchdog; the 30s timeout resets the board.
    loop {
        core::hint::spin_loop();
    }
}
