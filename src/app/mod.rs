//! Application core: workflows over ports, zero direct I/O.
//!
//! This module contains the business rules for the SmartCam: photo upload,
//! daily report, firmware update and modem storage housekeeping.  All
//! interaction with hardware happens through **port traits** defined in
//! [`ports`], keeping this layer fully testable without real peripherals.

pub mod events;
pub mod ports;
pub mod service;
