//! Modem power-up and identity queries.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use log::{info, warn};

use super::command;
use super::engine::AtEngine;
use super::response;
use crate::app::ports::{Clock, LineTransport};
use crate::error::TransactionError;

const PWRKEY_PULSE_MS: u32 = 300;
const POWER_SETTLE_MS: u32 = 3_000;
const PROBE_RETRY_MS: u32 = 3_000;
/// Probe attempts before bring-up gives up (about one minute).
pub const READY_ATTEMPTS: u8 = 20;

/// Pulse the modem's power key: high for 300 ms, then low, then let the
/// modem boot.
pub fn power_on<P: OutputPin>(pwrkey: &mut P, delay: &mut impl DelayNs) -> Result<(), P::Error> {
    pwrkey.set_high()?;
    delay.delay_ms(PWRKEY_PULSE_MS);
    pwrkey.set_low()?;
    delay.delay_ms(POWER_SETTLE_MS);
    Ok(())
}

/// Probe with `AT` until the modem answers, at most `attempts` times.
pub fn wait_ready<T: LineTransport, C: Clock>(
    engine: &mut AtEngine<T, C>,
    delay: &mut impl DelayNs,
    attempts: u8,
) -> Result<(), TransactionError> {
    let mut last = TransactionError::Timeout;
    for attempt in 1..=attempts {
        match engine.execute(&command::probe()) {
            Ok(_) => {
                info!("modem ready after {} probe(s)", attempt);
                delay.delay_ms(POWER_SETTLE_MS);
                return Ok(());
            }
            Err(e) => {
                warn!("modem not ready ({}), retrying in 3 s", e);
                last = e;
            }
        }
        if attempt < attempts {
            delay.delay_ms(PROBE_RETRY_MS);
        }
    }
    Err(last)
}

/// Disable command echo and select the preferred network mode.
/// Both are best-effort: the engine tolerates echo either way.
pub fn configure<T: LineTransport, C: Clock>(engine: &mut AtEngine<T, C>, network_mode: u8) {
    if let Err(e) = engine.execute(&command::echo_off()) {
        warn!("ATE0 failed: {}", e);
    }
    if let Err(e) = engine.execute(&command::network_mode(network_mode)) {
        warn!("setting network mode {} failed: {}", network_mode, e);
    }
}

pub fn imei<T: LineTransport, C: Clock>(
    engine: &mut AtEngine<T, C>,
) -> Result<heapless::String<15>, TransactionError> {
    let reply = engine.execute(&command::imei())?;
    response::imei(&reply)
}

/// RSSI index (0-31), or `None` if the modem does not know yet.
pub fn signal_quality<T: LineTransport, C: Clock>(
    engine: &mut AtEngine<T, C>,
) -> Result<Option<u8>, TransactionError> {
    let reply = engine.execute(&command::signal_quality())?;
    response::signal(&reply)
}

/// Network time as Unix seconds (UTC).
pub fn network_time<T: LineTransport, C: Clock>(
    engine: &mut AtEngine<T, C>,
) -> Result<i64, TransactionError> {
    let reply = engine.execute(&command::network_clock())?;
    response::network_time(&reply)
}
