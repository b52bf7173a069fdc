//! SoilGuard firmware entry point.
//!
//! Hexagonal architecture with a single cooperative control loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  SensorHub        RelayBoard      NvsAdapter      SystemClock  │
//! │  (SensorPort)     (ActuatorPort)  (Config+Calib)  (Clock)      │
//! │  StorageJournal   LogEventSink    Watchdog        Console      │
//! │  (RecordJournal)  (EventSink)     (Heartbeat)     (operator)   │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  Reader · Stability · Calibration · FSM · Relays       │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::io::BufRead;

use anyhow::Result;
use esp_idf_hal::delay::{Ets, FreeRtos};
use esp_idf_hal::gpio::{AnyIOPin, AnyOutputPin, PinDriver};
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::units::FromValueType;
use log::{error, info, warn};

use soilguard::adapters::device_id;
use soilguard::adapters::journal::{self, StorageJournal};
use soilguard::adapters::log_sink::LogEventSink;
use soilguard::adapters::nvs::NvsAdapter;
use soilguard::adapters::time::SystemClock;
use soilguard::app::commands::{CONTROL_CHANNEL, ShutdownSignal};
use soilguard::app::console::Console;
use soilguard::app::ports::{Clock, ConfigPort};
use soilguard::app::service::{AppService, CyclePorts};
use soilguard::app::status::StatusBoard;
use soilguard::calibration::CalibrationStore;
use soilguard::control::manual::ManualControl;
use soilguard::control::relay_manager::RelayManager;
use soilguard::drivers::relay::{Polarity, Relay, RelayBoard};
use soilguard::drivers::task_pin::{self, Core};
use soilguard::drivers::watchdog::Watchdog;
use soilguard::pins;
use soilguard::sensors::SensorHub;
use soilguard::sensors::air::Dht22;
use soilguard::sensors::soil_temp::Ds18b20;

static SHUTDOWN: ShutdownSignal = ShutdownSignal::new();

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  SoilGuard v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let clock = SystemClock::new();
    let started_at = clock.now();

    // ── 2. Load config and calibration from NVS ───────────────
    let nvs = NvsAdapter::new()?;
    let config = nvs.load()?;
    let calibration = CalibrationStore::load(&nvs);

    // ── 3. Peripherals ────────────────────────────────────────
    let peripherals = Peripherals::take()?;

    // SAFETY: every GPIO number in `pins` is used exactly once below.
    let (sda, scl, dht_pin, onewire_pin, pump_pin, light_pin) = unsafe {
        (
            AnyIOPin::new(pins::I2C_SDA_GPIO),
            AnyIOPin::new(pins::I2C_SCL_GPIO),
            AnyIOPin::new(pins::DHT22_DATA_GPIO),
            AnyIOPin::new(pins::ONEWIRE_GPIO),
            AnyOutputPin::new(pins::PUMP_RELAY_GPIO),
            AnyOutputPin::new(pins::LIGHT_RELAY_GPIO),
        )
    };

    let i2c = I2cDriver::new(
        peripherals.i2c0,
        sda,
        scl,
        &I2cConfig::new().baudrate(pins::I2C_BAUD_HZ.Hz()),
    )?;
    let mut hub = SensorHub::new(
        i2c,
        Ets,
        Dht22::new(PinDriver::input_output_od(dht_pin)?),
        Ds18b20::new(PinDriver::input_output_od(onewire_pin)?),
    );

    let board = RelayBoard::new(
        Relay::new(PinDriver::output(pump_pin)?, Polarity::ActiveLow)?,
        Relay::new(PinDriver::output(light_pin)?, Polarity::ActiveLow)?,
    );

    // ── 4. Shared surfaces (live for the whole program) ───────
    let relays: &'static _ = Box::leak(Box::new(RelayManager::new(board, &config)));
    let journal: &'static _ = Box::leak(Box::new(StorageJournal::open(
        NvsAdapter::new()?,
        journal::DEFAULT_CAPACITY,
    )?));

    let mac = device_id::read_mac();
    let dev_id = device_id::device_id(&mac);
    let boot_token = device_id::boot_token();
    info!("Device ID: {} (boot {})", dev_id, boot_token);
    let status: &'static _ = Box::leak(Box::new(StatusBoard::new(&dev_id, &boot_token, started_at)));

    if let Err(e) = relays.force_all_off(started_at, journal) {
        warn!("Boot safe-state incomplete: {}", e);
    }

    // ── 5. Operator console on the protocol core ──────────────
    let burst = config.manual_toggle_burst;
    task_pin::spawn_on_core(Core::Pro, 5, 8, "console\0", move || {
        let clock = SystemClock::new();
        let mut console = Console::new(
            ManualControl::new(relays, burst),
            journal,
            &clock,
            status,
            &CONTROL_CHANNEL,
            &SHUTDOWN,
        );
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let reply = console.dispatch(&line);
            if !reply.is_empty() {
                println!("{reply}");
            }
        }
    })?;

    // ── 6. Control loop ───────────────────────────────────────
    let watchdog = Watchdog::default();
    let mut sink = LogEventSink::new();
    let mut app = AppService::new(config, calibration, started_at);
    let mut io = CyclePorts {
        sensors: &mut hub,
        relays,
        journal,
        clock: &clock,
        status,
        store: &nvs,
    };

    info!("System ready. Entering control loop.");
    let outcome = app.run(
        &mut io,
        &mut sink,
        &mut FreeRtos,
        &watchdog,
        &SHUTDOWN,
        &CONTROL_CHANNEL,
    );
    drop(watchdog);

    match outcome {
        Ok(()) => info!("Control loop stopped by operator; relays are off"),
        Err(e) => error!("Control loop halted: {}; relays forced off", e),
    }

    // Stay up for the console and status pollers.  The relays are locked
    // out, so console toggles are refused until reboot.
    loop {
        FreeRtos::delay_ms(1_000);
    }
}
