//! Scripted transport for unit tests.
//!
//! Incoming traffic is a queue of lines, raw byte blocks and silences.
//! Every `read_line` call advances the shared clock by the time it "waited",
//! so deadlines behave as on hardware without sleeping.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::app::ports::{Clock, LineTransport};

#[derive(Debug, Clone)]
pub(crate) enum Incoming {
    Line(String),
    Bytes(Vec<u8>),
    /// Nothing arrives for the rest of the current wait.
    Silence,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ManualClock(pub(crate) Rc<Cell<u64>>);

impl ManualClock {
    pub(crate) fn advance(&self, ms: u64) {
        self.0.set(self.0.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.get()
    }
}

#[derive(Debug, Default)]
pub(crate) struct ScriptedTransport {
    pub(crate) incoming: VecDeque<Incoming>,
    /// Everything written, in order, one entry per `write` call.
    pub(crate) written: Vec<Vec<u8>>,
    pub(crate) flushes: usize,
    pub(crate) discards: usize,
    pub(crate) fail_writes: bool,
    pub(crate) clock: ManualClock,
}

impl ScriptedTransport {
    pub(crate) fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            ..Self::default()
        }
    }

    pub(crate) fn lines(mut self, lines: &[&str]) -> Self {
        for l in lines {
            self.incoming.push_back(Incoming::Line((*l).to_owned()));
        }
        self
    }

    pub(crate) fn bytes(mut self, data: &[u8]) -> Self {
        self.incoming.push_back(Incoming::Bytes(data.to_vec()));
        self
    }

    pub(crate) fn silence(mut self) -> Self {
        self.incoming.push_back(Incoming::Silence);
        self
    }

    /// Written command lines (entries ending in `\r`), without the `\r`.
    pub(crate) fn commands(&self) -> Vec<String> {
        self.written
            .iter()
            .filter_map(|w| w.strip_suffix(b"\r"))
            .map(|w| String::from_utf8_lossy(w).into_owned())
            .collect()
    }

    /// Raw payload writes (everything that is not a command line).
    pub(crate) fn payload(&self) -> Vec<u8> {
        self.written
            .iter()
            .filter(|w| !w.ends_with(b"\r"))
            .flatten()
            .copied()
            .collect()
    }
}

impl LineTransport for ScriptedTransport {
    type Error = ();

    fn write(&mut self, data: &[u8]) -> Result<(), ()> {
        if self.fail_writes && !data.ends_with(b"\r") {
            return Err(());
        }
        self.written.push(data.to_vec());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ()> {
        self.flushes += 1;
        Ok(())
    }

    fn read_line(&mut self, timeout_ms: u32) -> Result<Option<String>, ()> {
        match self.incoming.front() {
            Some(Incoming::Line(_)) => {
                self.clock.advance(1);
                match self.incoming.pop_front() {
                    Some(Incoming::Line(l)) => Ok(Some(l)),
                    _ => Ok(None),
                }
            }
            Some(Incoming::Silence) => {
                self.incoming.pop_front();
                self.clock.advance(u64::from(timeout_ms));
                Ok(None)
            }
            Some(Incoming::Bytes(_)) | None => {
                self.clock.advance(u64::from(timeout_ms));
                Ok(None)
            }
        }
    }

    fn read_bytes(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, ()> {
        let Some(Incoming::Bytes(data)) = self.incoming.front_mut() else {
            self.clock.advance(u64::from(timeout_ms));
            return Ok(0);
        };
        let n = buf.len().min(data.len());
        buf[..n].copy_from_slice(&data[..n]);
        *data = data.split_off(n);
        if data.is_empty() {
            self.incoming.pop_front();
        }
        self.clock.advance(1);
        Ok(n)
    }

    fn discard_partial(&mut self) {
        self.discards += 1;
    }
}
