//! SmartCam firmware library.
//!
//! Exposes the modem engine, transfer pipelines and application core for
//! integration testing.  ESP-IDF specific code is guarded by the `espidf`
//! feature within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod modem;
pub mod ota;
pub mod pins;
pub mod report;
pub mod scheduler;
pub mod util;
