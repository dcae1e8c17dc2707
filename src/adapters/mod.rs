//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter         | Implements          | Connects to                 |
//! |-----------------|---------------------|-----------------------------|
//! | `serial`        | LineTransport       | UART to the SIM7600 modem   |
//! | `time`          | Clock, WallClock    | ESP32 system timer / RTC    |
//! | `nvs`           | ConfigPort          | NVS / in-memory store       |
//! |                 | StatePort           |                             |
//! | `firmware_file` | FirmwareStore       | `/sdcard/firmware.bin`      |
//! | `log_sink`      | EventSink           | Serial log + SD log file    |
//! | `camera`        | PhotoSource         | esp32-camera driver         |
//! | `sdcard`        |                     | SPI microSD, FAT mount      |
//!
//! Flash writing and restart (`FlashWriter`, `SystemControl`) live in
//! [`crate::ota::flash`].

#[cfg(feature = "espidf")]
pub mod camera;
pub mod firmware_file;
pub mod log_sink;
pub mod nvs;
#[cfg(feature = "espidf")]
pub mod sdcard;
pub mod serial;
pub mod time;
