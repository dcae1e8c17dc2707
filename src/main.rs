//! SmartCam firmware entry point
//!
//! Hexagonal architecture with a scheduler-driven event loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  SerialTransport  LogEventSink  NvsAdapter   Esp32TimeAdapter  │
//! │  (LineTransport)  (EventSink)   (Config+     (Clock+WallClock) │
//! │  Camera           FirmwareFile   State)      FlashManager      │
//! │  (PhotoSource)    (FirmwareStore)            (FlashWriter)     │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │          AppService (workflows over AtEngine)          │    │
//! │  │   photo push · daily report · OTA · storage clean-up   │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Scheduler (delegate-driven) ──▶ event queue ──▶ main loop     │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::gpio::{AnyIOPin, PinDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::uart::{UartDriver, config::Config as UartConfig};
use esp_idf_svc::hal::units::Hertz;
use log::{debug, error, info, warn};

use smartcam::adapters::camera::Camera;
use smartcam::adapters::firmware_file::{FIRMWARE_FILE, FirmwareFile};
use smartcam::adapters::log_sink::LogEventSink;
use smartcam::adapters::nvs::NvsAdapter;
use smartcam::adapters::sdcard;
use smartcam::adapters::serial::SerialTransport;
use smartcam::adapters::time::Esp32TimeAdapter;
use smartcam::app::ports::{
    Clock, ConfigPort, PersistedState, ScheduleFiredKind, SchedulerDelegate, StatePort,
    WallClock,
};
use smartcam::app::service::AppService;
use smartcam::config::SystemConfig;
use smartcam::events::{self, Event, push_event};
use smartcam::modem::{AtEngine, device};
use smartcam::ota::flash::{self, ChipControl, FlashManager};
use smartcam::ota::OtaTargets;
use smartcam::pins;
use smartcam::report::Environment;
use smartcam::scheduler::Scheduler;

/// Optional JSON overlay for [`SystemConfig`].
const CONFIG_FILE: &str = "/sdcard/config.json";
const LOG_FILE: &str = "/sdcard/log.txt";

// ── Scheduler delegate ────────────────────────────────────────
//
// Bridges the scheduler (which knows nothing about the event system)
// to the lock-free event queue.

struct EventQueueDelegate;

impl SchedulerDelegate for EventQueueDelegate {
    fn on_schedule_fired(&mut self, label: &str, kind: ScheduleFiredKind) {
        info!("Schedule fired: '{}' ({:?})", label, kind);
        match Event::from_label(label) {
            Some(event) => {
                if !push_event(event) {
                    warn!("Event queue full, '{}' dropped", label);
                }
            }
            None => warn!("No event for schedule '{}'", label),
        }
    }
}

fn interval_secs(config: &SystemConfig, event: Event) -> u32 {
    match event {
        Event::PhotoDue => config.photo_interval_secs,
        Event::ReportDue => config.report_interval_secs,
        Event::OtaCheckDue => config.ota_check_interval_secs,
        Event::StorageClearDue => config.storage_clear_interval_secs,
    }
}

/// Seconds since a persisted timestamp; `None` (run now) if it never
/// happened or the wall clock cannot be trusted.
fn since(last: Option<i64>, clock: &Esp32TimeAdapter) -> Option<u64> {
    if !clock.wall_clock_valid() {
        return None;
    }
    last.map(|t| clock.unix_secs().saturating_sub(t).max(0) as u64)
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  SmartCam v{}                     ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 1b. OTA rollback check ─────────────────────────────────
    flash::check_rollback();

    let peripherals = Peripherals::take().context("taking peripherals")?;
    let gpio = peripherals.pins;
    let clock = Esp32TimeAdapter::new();

    // ── 2. SD card (firmware file, log, config overlay) ───────
    let sd = match sdcard::mount(
        peripherals.spi2,
        gpio.gpio39,
        gpio.gpio38,
        gpio.gpio40,
        gpio.gpio47,
    ) {
        Ok(card) => Some(card),
        Err(e) => {
            warn!("SD card unavailable ({}), continuing without it", e);
            None
        }
    };

    // ── 3. Config and persisted state ─────────────────────────
    let mut nvs = NvsAdapter::new().map_err(|e| anyhow!("NVS init: {e}"))?;
    let mut config = nvs.load().unwrap_or_else(|e| {
        warn!("NVS config load failed ({}), using defaults", e);
        SystemConfig::default()
    });
    if sd.is_some() && Path::new(CONFIG_FILE).exists() {
        match SystemConfig::load_overrides(Path::new(CONFIG_FILE)) {
            Ok(overlay) => {
                if overlay != config {
                    info!("Config overlay applied from {}", CONFIG_FILE);
                    if let Err(e) = nvs.save(&overlay) {
                        warn!("Caching config in NVS failed: {}", e);
                    }
                }
                config = overlay;
            }
            Err(e) => warn!("Ignoring config overlay: {:#}", e),
        }
    }
    let state = nvs.load_state().unwrap_or_else(|e| {
        warn!("Persisted state unreadable ({}), starting fresh", e);
        PersistedState::default()
    });

    // ── 4. Peripherals ────────────────────────────────────────
    let mut sink = if sd.is_some() {
        LogEventSink::with_file(LOG_FILE, clock.clone())
    } else {
        LogEventSink::new()
    };

    let mut camera = Camera::init()
        .map_err(|e| error!("Camera init failed: {}", e))
        .ok();

    let mut firmware = FirmwareFile::new(FIRMWARE_FILE);
    if sd.is_some() {
        if let Err(e) = firmware.remove() {
            warn!("Removing stale {} failed: {}", FIRMWARE_FILE, e);
        }
    }
    let mut flash_writer = FlashManager::new();
    let mut system = ChipControl::default();

    // ── 5. Modem bring-up ─────────────────────────────────────
    let mut delay = FreeRtos;
    let mut pwrkey = PinDriver::output(gpio.gpio48).context("modem power key")?;
    device::power_on(&mut pwrkey, &mut delay).context("modem power key")?;

    let uart = UartDriver::new(
        peripherals.uart1,
        gpio.gpio45,
        gpio.gpio46,
        Option::<AnyIOPin>::None,
        Option::<AnyIOPin>::None,
        &UartConfig::new()
            .baudrate(Hertz(config.modem_baud))
            .rx_fifo_size(pins::MODEM_UART_RX_BUFFER),
    )
    .context("modem UART")?;
    let mut engine = AtEngine::new(SerialTransport::new(uart, clock.clone()), clock.clone());

    device::wait_ready(&mut engine, &mut delay, device::READY_ATTEMPTS)
        .context("modem did not answer AT")?;
    device::configure(&mut engine, config.network_mode);

    match device::network_time(&mut engine) {
        Ok(t) if clock.set_unix_secs(t) && clock.wall_clock_valid() => {
            info!("Wall clock set from network: {}", t);
        }
        Ok(t) => warn!("Network time {} not usable", t),
        Err(e) => warn!("Network time unavailable: {}", e),
    }

    // ── 6. App service ────────────────────────────────────────
    let mut app = AppService::new(config.clone(), state);
    app.start(&mut sink);
    app.refresh_identity(&mut engine, &mut sink);

    // ── 7. Schedules ──────────────────────────────────────────
    let mut sched = Scheduler::new();
    let mut sched_delegate = EventQueueDelegate;
    for event in Event::ALL {
        if sched
            .add_periodic(event.label(), interval_secs(&config, event))
            .is_none()
        {
            warn!("No scheduler slot for '{}'", event.label());
        }
    }
    sched.prime(
        Event::ReportDue.label(),
        since(app.state().last_report_unix, &clock),
    );
    sched.prime(
        Event::OtaCheckDue.label(),
        since(app.state().last_ota_check_unix, &clock),
    );

    info!("System ready. Entering event loop.");

    // ── 8. Event loop ─────────────────────────────────────────
    let mut last_tick = clock.now_ms();
    loop {
        let now = clock.now_ms();
        let elapsed = now.saturating_sub(last_tick).min(u64::from(u32::MAX)) as u32;
        last_tick = now;
        sched.tick(elapsed, &mut sched_delegate);

        // Outcomes are already logged and emitted through `sink`.
        events::drain_events(|event| match event {
            Event::PhotoDue => {
                if let Err(e) =
                    app.capture_and_upload(&mut engine, &mut delay, &mut camera, &clock, &mut sink)
                {
                    debug!("Photo cycle ended: {}", e);
                }
            }
            Event::ReportDue => {
                let env = Environment {
                    sd: sd.as_ref().and_then(|_| sdcard::usage()),
                    ..Environment::default()
                };
                if let Err(e) = app.send_report(&mut engine, &mut delay, &clock, env, &mut nvs, &mut sink)
                {
                    debug!("Report cycle ended: {}", e);
                }
            }
            Event::OtaCheckDue => {
                let targets = OtaTargets {
                    store: &mut firmware,
                    flash: &mut flash_writer,
                    state_port: &mut nvs,
                    system: &mut system,
                };
                if let Err(e) = app.check_for_update(&mut engine, &mut delay, &clock, targets, &mut sink)
                {
                    debug!("Update cycle ended: {}", e);
                }
            }
            Event::StorageClearDue => {
                if let Err(e) = app.clear_modem_storage(&mut engine, &mut sink) {
                    debug!("Storage clear ended: {}", e);
                }
            }
        });

        FreeRtos::delay_ms(config.loop_interval_ms);
    }
}
