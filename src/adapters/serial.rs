//! UART line transport for the modem.
//!
//! Bytes from the UART are staged in a fixed ring and split into lines by a
//! [`LineAssembler`].  Raw reads (HTTP bodies) take bytes straight from the
//! ring so binary data that happens to contain `\r\n` is never framed.
//!
//! ```text
//!  UART ──▶ rx ring ──▶ LineAssembler ──▶ read_line()
//!              └──────────────────────────▶ read_bytes()
//! ```

use heapless::{Deque, Vec as HVec};
use log::warn;

use crate::app::ports::{Clock, LineTransport};

/// Longest line kept; longer lines are dropped up to their terminator.
pub const LINE_CAPACITY: usize = 512;
const RX_CAPACITY: usize = 1024;
const READ_CHUNK: usize = 128;

/// Byte-level access to a serial port.
pub trait SerialPort {
    type Error: core::fmt::Debug;

    /// Read what is available into `buf`, waiting at most `timeout_ms` for
    /// the first byte.  Returns 0 on timeout.
    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Self::Error>;

    fn write_all(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Block until the TX FIFO is empty.
    fn flush(&mut self) -> Result<(), Self::Error>;
}

// ───────────────────────────────────────────────────────────────
// Line assembly
// ───────────────────────────────────────────────────────────────

/// Splits a byte stream into `\r`/`\n` terminated lines.
///
/// Blank lines are swallowed.  A line is handed out on its `\r`; the `\n`
/// of a `\r\n` pair is then owed and dropped whenever it shows up, by
/// [`push`](Self::push) or by a raw read.  While `skipping` is set every
/// byte up to the next `\n` is dropped; that is how an overlong or
/// abandoned line is resynchronised.
#[derive(Debug, Default)]
pub struct LineAssembler {
    partial: HVec<u8, LINE_CAPACITY>,
    skipping: bool,
    after_cr: bool,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte.  Returns a line when `byte` completes one.
    pub fn push(&mut self, byte: u8) -> Option<String> {
        if core::mem::take(&mut self.after_cr) && byte == b'\n' {
            return None;
        }
        if self.skipping {
            if byte == b'\n' {
                self.skipping = false;
            }
            return None;
        }
        match byte {
            b'\r' | b'\n' => {
                self.after_cr = byte == b'\r';
                if self.partial.is_empty() {
                    return None;
                }
                let line = String::from_utf8_lossy(&self.partial).into_owned();
                self.partial.clear();
                Some(line)
            }
            _ => {
                if self.partial.push(byte).is_err() {
                    warn!("Serial: line longer than {} bytes dropped", LINE_CAPACITY);
                    self.partial.clear();
                    self.skipping = true;
                }
                None
            }
        }
    }

    /// Consume a pending `>` data prompt (the modem sends it without a
    /// terminator).
    pub fn take_prompt(&mut self) -> bool {
        if matches!(self.partial.as_slice(), b">" | b"> ") {
            self.partial.clear();
            true
        } else {
            false
        }
    }

    /// Abandon the partial line and drop input up to the next `\n`.
    /// A clean line boundary is left alone.
    pub fn discard(&mut self) {
        if !self.partial.is_empty() {
            self.partial.clear();
            self.skipping = true;
        }
    }

    /// Whether the last byte seen was a line-ending `\r`, so a `\n` may
    /// still be on its way.
    pub fn owes_lf(&self) -> bool {
        self.after_cr
    }

    /// Settle the owed `\n` against the next byte of the stream.  Returns
    /// `true` when `next` is that `\n` and must be dropped.
    pub fn settle_lf(&mut self, next: u8) -> bool {
        core::mem::take(&mut self.after_cr) && next == b'\n'
    }

    /// Move buffered bytes of an unterminated line into `buf`.
    fn drain_into(&mut self, buf: &mut [u8]) -> usize {
        let n = self.partial.len().min(buf.len());
        buf[..n].copy_from_slice(&self.partial[..n]);
        self.partial.rotate_left(n);
        self.partial.truncate(self.partial.len() - n);
        n
    }

    pub fn pending(&self) -> usize {
        self.partial.len()
    }
}

// ───────────────────────────────────────────────────────────────
// Transport
// ───────────────────────────────────────────────────────────────

/// [`LineTransport`] over any [`SerialPort`].
pub struct SerialTransport<P, C> {
    port: P,
    clock: C,
    rx: Deque<u8, RX_CAPACITY>,
    assembler: LineAssembler,
}

impl<P: SerialPort, C: Clock> SerialTransport<P, C> {
    pub fn new(port: P, clock: C) -> Self {
        Self {
            port,
            clock,
            rx: Deque::new(),
            assembler: LineAssembler::new(),
        }
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Pull at most one chunk from the port into the ring.
    fn fill(&mut self, timeout_ms: u32) -> Result<usize, P::Error> {
        let want = (RX_CAPACITY - self.rx.len()).min(READ_CHUNK);
        if want == 0 {
            return Ok(0);
        }
        let mut chunk = [0u8; READ_CHUNK];
        let n = self.port.read(&mut chunk[..want], timeout_ms)?;
        for &b in &chunk[..n] {
            // Cannot overflow: `want` bounds the read.
            let _ = self.rx.push_back(b);
        }
        Ok(n)
    }

    fn remaining(&self, deadline: u64) -> u32 {
        deadline
            .saturating_sub(self.clock.now_ms())
            .min(u64::from(u32::MAX)) as u32
    }
}

impl<P: SerialPort, C: Clock> LineTransport for SerialTransport<P, C> {
    type Error = P::Error;

    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.port.write_all(data)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.port.flush()
    }

    fn read_line(&mut self, timeout_ms: u32) -> Result<Option<String>, Self::Error> {
        let deadline = self.clock.now_ms() + u64::from(timeout_ms);
        loop {
            while let Some(b) = self.rx.pop_front() {
                if let Some(line) = self.assembler.push(b) {
                    return Ok(Some(line));
                }
            }
            if self.assembler.take_prompt() {
                return Ok(Some(">".into()));
            }
            let remaining = self.remaining(deadline);
            if remaining == 0 {
                return Ok(None);
            }
            self.fill(remaining)?;
        }
    }

    fn read_bytes(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.assembler.owes_lf() {
            // The header's `\n` may not have arrived yet.
            if self.rx.is_empty() && self.fill(timeout_ms)? == 0 {
                return Ok(0);
            }
            if let Some(&next) = self.rx.front() {
                if self.assembler.settle_lf(next) {
                    self.rx.pop_front();
                }
            }
        }
        let mut n = self.assembler.drain_into(buf);
        while n < buf.len() {
            match self.rx.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        if n > 0 {
            return Ok(n);
        }
        self.port.read(buf, timeout_ms)
    }

    fn discard_partial(&mut self) {
        self.assembler.discard();
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF UART
// ───────────────────────────────────────────────────────────────

#[cfg(feature = "espidf")]
mod uart {
    use esp_idf_hal::delay::{BLOCK, TickType};
    use esp_idf_hal::sys::EspError;
    use esp_idf_hal::uart::UartDriver;

    use super::SerialPort;

    impl SerialPort for UartDriver<'_> {
        type Error = EspError;

        fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, EspError> {
            if buf.is_empty() {
                return Ok(0);
            }
            let ready = self.remaining_read()?;
            if ready > 0 {
                let n = ready.min(buf.len());
                return UartDriver::read(self, &mut buf[..n], 0);
            }
            let ticks = TickType::new_millis(u64::from(timeout_ms)).ticks();
            UartDriver::read(self, &mut buf[..1], ticks)
        }

        fn write_all(&mut self, mut data: &[u8]) -> Result<(), EspError> {
            while !data.is_empty() {
                let n = UartDriver::write(self, data)?;
                data = &data[n..];
            }
            Ok(())
        }

        fn flush(&mut self) -> Result<(), EspError> {
            self.wait_tx_done(BLOCK)
        }
    }
}
