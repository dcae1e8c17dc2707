//! ESP32 time adapter.
//!
//! - **`espidf`** wraps `esp_timer_get_time()` for the monotonic clock and
//!   `gettimeofday()` for wall-clock time.
//! - **host** uses `std::time::Instant` / `SystemTime` for simulation and
//!   tests.
//!
//! Delays on the device come from `esp_idf_hal::delay::FreeRtos`; the host
//! gets [`ThreadDelay`].

use crate::app::ports::{Clock, WallClock};

/// Time adapter for the ESP32-S3 platform.
#[derive(Debug, Clone)]
pub struct Esp32TimeAdapter {
    #[cfg(not(feature = "espidf"))]
    start: std::time::Instant,
}

impl Default for Esp32TimeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32TimeAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(not(feature = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Microseconds since boot (monotonic).
    #[cfg(feature = "espidf")]
    pub fn uptime_us(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
    }

    /// Microseconds since boot (monotonic).
    #[cfg(not(feature = "espidf"))]
    pub fn uptime_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    /// Set the system wall clock (from the modem's network time).
    #[cfg(feature = "espidf")]
    pub fn set_unix_secs(&self, secs: i64) -> bool {
        let tv = esp_idf_svc::sys::timeval {
            tv_sec: secs as esp_idf_svc::sys::time_t,
            tv_usec: 0,
        };
        unsafe { esp_idf_svc::sys::settimeofday(&tv, core::ptr::null()) == 0 }
    }

    /// Whether the wall clock looks synchronised (after 2020-01-01).
    pub fn wall_clock_valid(&self) -> bool {
        const EPOCH_2020: i64 = 1_577_836_800;
        self.unix_secs() >= EPOCH_2020
    }
}

impl Clock for Esp32TimeAdapter {
    fn now_ms(&self) -> u64 {
        self.uptime_us() / 1000
    }
}

impl WallClock for Esp32TimeAdapter {
    #[cfg(feature = "espidf")]
    fn unix_secs(&self) -> i64 {
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return 0;
        }
        tv.tv_sec as i64
    }

    #[cfg(not(feature = "espidf"))]
    fn unix_secs(&self) -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |d| d.as_secs() as i64)
    }
}

/// Sleeping delay for host runs.
#[cfg(not(feature = "espidf"))]
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadDelay;

#[cfg(not(feature = "espidf"))]
impl embedded_hal::delay::DelayNs for ThreadDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(u64::from(ns)));
    }
}
