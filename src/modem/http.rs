//! HTTP GET over the modem's HTTP(S) service.
//!
//! A body is never read in one piece: callers ask for `(offset, len)`
//! ranges.  Each `AT+HTTPREAD` reply is framed as
//!
//! ```text
//!   OK
//!   +HTTPREAD: <n>
//!   <n raw bytes>
//!   +HTTPREAD: 0
//! ```

use log::{debug, warn};

use super::command::{self, HTTP_READ_END};
use super::engine::AtEngine;
use super::response;
use crate::app::ports::{Clock, LineTransport};
use crate::error::TransactionError;

/// Time allowed for the raw bytes of one chunk after its header line.
const DATA_TIMEOUT_MS: u32 = 10_000;
const TRAILER_TIMEOUT_MS: u32 = 5_000;

const HTTP_OK: u16 = 200;

/// Initialise the HTTP service.  A failed init usually means a previous
/// session was never terminated: terminate it and init once more.
pub fn open<T: LineTransport, C: Clock>(engine: &mut AtEngine<T, C>) -> Result<(), TransactionError> {
    if engine.execute(&command::http_init()).is_ok() {
        return Ok(());
    }
    warn!("HTTPINIT failed, terminating stale session");
    let _ = engine.execute(&command::http_term());
    engine.execute(&command::http_init()).map(|_| ())
}

/// Terminate the HTTP service.  Best-effort.
pub fn close<T: LineTransport, C: Clock>(engine: &mut AtEngine<T, C>) {
    if let Err(e) = engine.execute(&command::http_term()) {
        warn!("HTTPTERM failed: {}", e);
    }
}

/// GET `url`.  Returns the body length announced by the server; any status
/// other than 200 is a protocol error.
pub fn get<T: LineTransport, C: Clock>(
    engine: &mut AtEngine<T, C>,
    url: &str,
) -> Result<u32, TransactionError> {
    engine.execute(&command::http_url(url))?;
    let reply = engine.execute(&command::http_get())?;
    let action = response::http_action(&reply)?;
    if action.status != HTTP_OK {
        warn!("GET {} returned status {}", url, action.status);
        return Err(TransactionError::Protocol);
    }
    debug!("GET {}: {} bytes", url, action.length);
    Ok(action.length)
}

/// Read up to `len` body bytes at `offset`.  An empty result means the
/// modem had nothing more to give.
pub fn read<T: LineTransport, C: Clock>(
    engine: &mut AtEngine<T, C>,
    offset: u32,
    len: u32,
) -> Result<Vec<u8>, TransactionError> {
    let reply = engine.execute(&command::http_read(offset, len))?;
    let header = reply.last().ok_or(TransactionError::Protocol)?;
    let n = response::http_read_len(header)?;
    if n == 0 {
        return Ok(Vec::new());
    }
    if n > len {
        warn!("HTTPREAD announced {} bytes, asked for {}", n, len);
        return Err(TransactionError::Protocol);
    }
    let data = engine.read_payload(n as usize, DATA_TIMEOUT_MS)?;
    engine.await_token(HTTP_READ_END, TRAILER_TIMEOUT_MS)?;
    Ok(data)
}
