//! Simulated SIM7600 for integration tests.
//!
//! Implements [`LineTransport`] with a small model of the modem: a file
//! store fed by `AT+CFTRANRX`, an FTP client that always succeeds, and an
//! HTTP client serving registered bodies.  Tests inject faults with
//! overrides that replace the modeled reply for a command prefix.
//!
//! Every read advances a shared [`SharedClock`], so timeouts elapse
//! instantly but deterministically.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use smartcam::app::ports::{Clock, LineTransport};
use smartcam::modem::AtEngine;

pub const IMEI: &str = "867584030123456";

// ── Clock ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct SharedClock(Rc<Cell<u64>>);

impl SharedClock {
    pub fn advance(&self, ms: u64) {
        self.0.set(self.0.get() + ms);
    }
}

impl Clock for SharedClock {
    fn now_ms(&self) -> u64 {
        self.0.get()
    }
}

/// Delay that records each wait and moves the shared clock.
#[derive(Debug, Default)]
pub struct RecordingDelay {
    pub waits_ms: Vec<u32>,
    clock: SharedClock,
}

impl RecordingDelay {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            waits_ms: Vec::new(),
            clock,
        }
    }
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.clock.advance(u64::from(ns / 1_000_000));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.waits_ms.push(ms);
        self.clock.advance(u64::from(ms));
    }
}

// ── Modem model ───────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Reply {
    Line(String),
    Bytes(Vec<u8>),
}

#[derive(Debug)]
struct Override {
    prefix: String,
    lines: Vec<String>,
    /// `None` = forever.
    remaining: Option<usize>,
}

#[derive(Debug)]
struct Receiving {
    path: String,
    expected: usize,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct MockModem {
    clock: SharedClock,
    overrides: Vec<Override>,
    pending: VecDeque<Reply>,
    receiving: Option<Receiving>,
    http_url: Option<String>,
    http_bodies: HashMap<String, Vec<u8>>,
    http_limit: Option<usize>,

    /// Command lines as written, without `\r`.
    pub commands: Vec<String>,
    /// Files in modem storage (full paths) with their contents.
    pub storage: Vec<(String, Vec<u8>)>,
    /// Names pushed with `AT+CFTPSPUTFILE`.
    pub sent: Vec<String>,
    /// `(offset, len)` of every `AT+HTTPREAD`.
    pub reads: Vec<(u32, u32)>,
    pub discards: usize,
}

impl MockModem {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            ..Self::default()
        }
    }

    /// Answer commands starting with `prefix` with `lines`, always.
    pub fn on(mut self, prefix: &str, lines: &[&str]) -> Self {
        self.push_override(prefix, lines, None);
        self
    }

    /// Answer the next `times` matching commands with `lines`; later ones
    /// fall through to the model.
    pub fn on_times(mut self, prefix: &str, times: usize, lines: &[&str]) -> Self {
        self.push_override(prefix, lines, Some(times));
        self
    }

    /// Never answer commands starting with `prefix`.
    pub fn silent(self, prefix: &str) -> Self {
        self.on(prefix, &[])
    }

    /// Serve `body` for GET requests to `url`.
    pub fn serve(mut self, url: &str, body: &[u8]) -> Self {
        self.http_bodies.insert(url.to_owned(), body.to_vec());
        self
    }

    /// Behave as if the connection dropped after `offset` body bytes.
    pub fn cut_http_at(mut self, offset: usize) -> Self {
        self.http_limit = Some(offset);
        self
    }

    pub fn with_files(mut self, names: &[&str]) -> Self {
        for n in names {
            self.storage.push(((*n).to_owned(), Vec::new()));
        }
        self
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.commands.iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn file(&self, path: &str) -> Option<&[u8]> {
        self.storage
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, d)| d.as_slice())
    }

    fn push_override(&mut self, prefix: &str, lines: &[&str], remaining: Option<usize>) {
        self.overrides.push(Override {
            prefix: prefix.to_owned(),
            lines: lines.iter().map(|l| (*l).to_owned()).collect(),
            remaining,
        });
    }

    fn reply(&mut self, lines: &[&str]) {
        for l in lines {
            self.pending.push_back(Reply::Line((*l).to_owned()));
        }
    }

    fn respond(&mut self, cmd: &str) {
        if let Some(range) = cmd.strip_prefix("AT+HTTPREAD=").and_then(parse_range) {
            self.reads.push(range);
        }
        if let Some(o) = self
            .overrides
            .iter_mut()
            .find(|o| cmd.starts_with(&o.prefix) && o.remaining != Some(0))
        {
            if let Some(n) = o.remaining.as_mut() {
                *n -= 1;
            }
            let lines = o.lines.clone();
            self.pending.extend(lines.into_iter().map(Reply::Line));
            return;
        }

        let (name, args) = match cmd.split_once(['=', '?']) {
            Some((name, args)) => (name, args),
            None => (cmd, ""),
        };
        match name {
            "AT" | "ATE0" | "AT+CNMP" | "AT+CFTPSTYPE" | "AT+FSCD" | "AT+HTTPINIT"
            | "AT+HTTPTERM" => self.reply(&["OK"]),
            "AT+CGSN" => self.reply(&[IMEI, "OK"]),
            "AT+CSQ" => self.reply(&["+CSQ: 21,99", "OK"]),
            "AT+CCLK" => self.reply(&["+CCLK: \"26/10/16,14:05:09+08\"", "OK"]),
            "AT+FSLS" => {
                let mut lines = vec!["+FSLS: SUBDIRECTORIES:".to_owned()];
                if !self.storage.is_empty() {
                    lines.push("+FSLS: FILES:".to_owned());
                    lines.extend(self.storage.iter().map(|(p, _)| p.clone()));
                }
                lines.push("OK".to_owned());
                self.pending.extend(lines.into_iter().map(Reply::Line));
            }
            "AT+FSDEL" => {
                self.storage.clear();
                self.reply(&["OK"]);
            }
            "AT+CFTRANRX" => {
                let (path, len) = args.rsplit_once(',').unwrap_or((args, "0"));
                self.receiving = Some(Receiving {
                    path: path.trim_matches('"').to_owned(),
                    expected: len.parse().unwrap_or(0),
                    data: Vec::new(),
                });
                self.reply(&[">"]);
            }
            "AT+CFTPSSTART" => self.reply(&["OK", "+CFTPSSTART: 0"]),
            "AT+CFTPSSTOP" => self.reply(&["OK", "+CFTPSSTOP: 0"]),
            "AT+CFTPSLOGIN" => self.reply(&["OK", "+CFTPSLOGIN: 0"]),
            "AT+CFTPSLOGOUT" => self.reply(&["OK", "+CFTPSLOGOUT: 0"]),
            "AT+CFTPSPUTFILE" => {
                let file = args.split(',').next().unwrap_or("").trim_matches('"');
                self.sent.push(file.to_owned());
                self.reply(&["OK", "+CFTPSPUTFILE: 0"]);
            }
            "AT+HTTPPARA" => {
                self.http_url = args
                    .strip_prefix("\"URL\",")
                    .map(|u| u.trim_matches('"').to_owned());
                self.reply(&["OK"]);
            }
            "AT+HTTPACTION" => {
                let body = self.http_url.as_ref().and_then(|u| self.http_bodies.get(u));
                let line = match body {
                    Some(b) => format!("+HTTPACTION: 0,200,{}", b.len()),
                    None => "+HTTPACTION: 0,404,0".to_owned(),
                };
                self.reply(&["OK", &line]);
            }
            "AT+HTTPREAD" => {
                let (off, len) = parse_range(args).unwrap_or((0, 0));
                let body = self
                    .http_url
                    .as_ref()
                    .and_then(|u| self.http_bodies.get(u))
                    .cloned()
                    .unwrap_or_default();
                let end = self.http_limit.unwrap_or(body.len()).min(body.len());
                let start = (off as usize).min(end);
                let chunk = body[start..(start + len as usize).min(end)].to_vec();
                if chunk.is_empty() {
                    self.reply(&["OK", "+HTTPREAD: 0"]);
                } else {
                    self.reply(&["OK", &format!("+HTTPREAD: {}", chunk.len())]);
                    self.pending.push_back(Reply::Bytes(chunk));
                    self.reply(&["+HTTPREAD: 0"]);
                }
            }
            _ => self.reply(&["ERROR"]),
        }
    }

    fn finish_upload(&mut self) {
        let done = self
            .receiving
            .as_ref()
            .is_some_and(|r| r.data.len() >= r.expected);
        if done {
            if let Some(r) = self.receiving.take() {
                self.storage.retain(|(p, _)| *p != r.path);
                self.storage.push((r.path, r.data));
                self.reply(&["OK"]);
            }
        }
    }
}

impl LineTransport for MockModem {
    type Error = ();

    fn write(&mut self, data: &[u8]) -> Result<(), ()> {
        if let Some(cmd) = data.strip_suffix(b"\r") {
            if self.receiving.as_ref().is_none_or(|r| r.expected == r.data.len()) {
                let cmd = String::from_utf8_lossy(cmd).into_owned();
                self.commands.push(cmd.clone());
                self.respond(&cmd);
                return Ok(());
            }
        }
        if let Some(r) = self.receiving.as_mut() {
            r.data.extend_from_slice(data);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ()> {
        // An upload completes once the prompt was consumed and the data is in.
        let prompt_pending = self
            .pending
            .iter()
            .any(|r| matches!(r, Reply::Line(l) if l == ">"));
        if !prompt_pending {
            self.finish_upload();
        }
        Ok(())
    }

    fn read_line(&mut self, timeout_ms: u32) -> Result<Option<String>, ()> {
        match self.pending.pop_front() {
            Some(Reply::Line(l)) => {
                self.clock.advance(1);
                Ok(Some(l))
            }
            Some(Reply::Bytes(b)) => {
                self.clock.advance(1);
                Ok(Some(String::from_utf8_lossy(&b).into_owned()))
            }
            None => {
                self.clock.advance(u64::from(timeout_ms));
                Ok(None)
            }
        }
    }

    fn read_bytes(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, ()> {
        let mut data = match self.pending.pop_front() {
            Some(Reply::Bytes(b)) => b,
            Some(Reply::Line(l)) => format!("{l}\r\n").into_bytes(),
            None => {
                self.clock.advance(u64::from(timeout_ms));
                return Ok(0);
            }
        };
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        if n < data.len() {
            self.pending.push_front(Reply::Bytes(data.split_off(n)));
        }
        self.clock.advance(1);
        Ok(n)
    }

    fn discard_partial(&mut self) {
        self.discards += 1;
    }
}

fn parse_range(args: &str) -> Option<(u32, u32)> {
    let (off, len) = args.split_once(',')?;
    Some((off.parse().ok()?, len.parse().ok()?))
}

/// Engine over a fresh simulated modem, plus the clock both share.
pub fn engine_with(
    build: impl FnOnce(MockModem) -> MockModem,
) -> (AtEngine<MockModem, SharedClock>, SharedClock) {
    let clock = SharedClock::default();
    let modem = build(MockModem::new(clock.clone()));
    (AtEngine::new(modem, clock.clone()), clock)
}
