//! AT transaction engine.
//!
//! One `execute` call is one transaction: write the command line, then scan
//! incoming lines until the expected token, an `ERROR` marker, or the
//! deadline.  The engine never retries; retry policy belongs to the
//! pipelines above it.
//!
//! ```text
//!   execute(cmd) ──▶ write "cmd\r" ──▶ read_line ─┬─ echo        → capture, keep scanning
//!                                                ├─ has token   → Ok(Response)
//!                                                ├─ has ERROR   → Err(Protocol)
//!                                                ├─ other       → capture, keep scanning
//!                                                └─ deadline    → discard partial, Err(Timeout)
//! ```

use log::{debug, warn};

use super::command::Command;
use super::response::Response;
use crate::app::ports::{Clock, LineTransport};
use crate::error::TransactionError;

const ERROR_MARKER: &str = "ERROR";

/// Owns the modem transport for the lifetime of the process.
pub struct AtEngine<T, C> {
    transport: T,
    clock: C,
}

impl<T: LineTransport, C: Clock> AtEngine<T, C> {
    pub fn new(transport: T, clock: C) -> Self {
        Self { transport, clock }
    }

    /// Send `command` and wait for its completion token.
    ///
    /// Every line read is captured, including the modem's echo of the
    /// command, which is never matched against the token or the error
    /// marker.
    pub fn execute(&mut self, command: &Command) -> Result<Response, TransactionError> {
        debug!("AT> {}", command);
        let mut line = Vec::with_capacity(command.text().len() + 1);
        line.extend_from_slice(command.text().as_bytes());
        line.push(b'\r');
        self.send(&line)?;
        let result = self.scan(command.expected(), command.timeout_ms(), Some(command.text()));
        if let Err(e) = &result {
            warn!("AT {} failed: {}", command, e);
        }
        result
    }

    /// Scan for `token` without sending anything.
    pub fn await_token(
        &mut self,
        token: &str,
        timeout_ms: u32,
    ) -> Result<Response, TransactionError> {
        self.scan(token, timeout_ms, None)
    }

    /// Write raw bytes and flush them out of the device.
    pub fn write_payload(&mut self, data: &[u8]) -> Result<(), TransactionError> {
        if !data.is_empty() {
            self.transport.write(data).map_err(io_error)?;
        }
        self.transport.flush().map_err(io_error)
    }

    /// Read exactly `len` raw bytes within `timeout_ms`.
    pub fn read_payload(&mut self, len: usize, timeout_ms: u32) -> Result<Vec<u8>, TransactionError> {
        let deadline = self.deadline(timeout_ms);
        let mut buf = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            let remaining = self.remaining(deadline);
            if remaining == 0 {
                warn!("AT raw read timed out at {}/{} bytes", filled, len);
                return Err(TransactionError::Timeout);
            }
            let n = self
                .transport
                .read_bytes(&mut buf[filled..], remaining)
                .map_err(io_error)?;
            if n == 0 {
                warn!("AT raw read timed out at {}/{} bytes", filled, len);
                return Err(TransactionError::Timeout);
            }
            filled += n;
        }
        Ok(buf)
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn into_parts(self) -> (T, C) {
        (self.transport, self.clock)
    }

    fn send(&mut self, data: &[u8]) -> Result<(), TransactionError> {
        self.transport.write(data).map_err(io_error)?;
        self.transport.flush().map_err(io_error)
    }

    fn scan(
        &mut self,
        token: &str,
        timeout_ms: u32,
        echo: Option<&str>,
    ) -> Result<Response, TransactionError> {
        let deadline = self.deadline(timeout_ms);
        let mut response = Response::default();
        loop {
            let remaining = self.remaining(deadline);
            if remaining == 0 {
                self.transport.discard_partial();
                return Err(TransactionError::Timeout);
            }
            let Some(line) = self.transport.read_line(remaining).map_err(io_error)? else {
                // The transport waited out the whole remaining window.
                self.transport.discard_partial();
                return Err(TransactionError::Timeout);
            };
            debug!("AT< {}", line);
            let is_echo = echo.is_some_and(|cmd| line.trim() == cmd);
            let found = !is_echo && line.contains(token);
            let failed = !is_echo && !found && line.contains(ERROR_MARKER);
            response.push(line);
            if found {
                return Ok(response);
            }
            if failed {
                return Err(TransactionError::Protocol);
            }
        }
    }

    fn deadline(&self, timeout_ms: u32) -> u64 {
        self.clock.now_ms() + u64::from(timeout_ms)
    }

    fn remaining(&self, deadline: u64) -> u32 {
        let left = deadline.saturating_sub(self.clock.now_ms());
        u32::try_from(left).unwrap_or(u32::MAX)
    }
}

fn io_error<E: core::fmt::Debug>(e: E) -> TransactionError {
    warn!("modem serial error: {:?}", e);
    TransactionError::Io
}
