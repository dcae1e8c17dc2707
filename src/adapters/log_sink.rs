//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing one line per application event to
//! the `log` facade (UART / USB-CDC in production).  Optionally the same
//! line is appended to a log file on the SD card, prefixed with the wall
//! clock.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, WallClock};

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink {
    file: Option<(PathBuf, Box<dyn WallClock>)>,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self { file: None }
    }

    /// Also append every record to `path`.
    pub fn with_file(path: impl Into<PathBuf>, clock: impl WallClock + 'static) -> Self {
        Self {
            file: Some((path.into(), Box::new(clock))),
        }
    }
}

/// One-line rendering of an event: `TAG | details`.
pub fn describe(event: &AppEvent) -> String {
    match event {
        AppEvent::Started(version) => format!("START | firmware={}", version),
        AppEvent::IdentityRefreshed { imei, signal } => match signal {
            Some(csq) => format!("MODEM | imei={} csq={}", imei, csq),
            None => format!("MODEM | imei={} csq=unknown", imei),
        },
        AppEvent::PhotoCaptured { bytes } => format!("PHOTO | captured {} bytes", bytes),
        AppEvent::CaptureFailed => "PHOTO | capture failed".into(),
        AppEvent::Uploaded { name, bytes } => format!("FTP   | sent {} ({} bytes)", name, bytes),
        AppEvent::UploadFailed { name, error } => format!("FTP   | {} failed: {}", name, error),
        AppEvent::UpToDate(version) => format!("OTA   | up to date at {}", version),
        AppEvent::UpdateApplied(version) => format!("OTA   | installed {}, restarting", version),
        AppEvent::UpdateFailed(error) => format!("OTA   | failed: {}", error),
        AppEvent::StorageCleared { files } => format!("STORE | cleared {} file(s)", files),
        AppEvent::StorageClearFailed(error) => format!("STORE | clear failed: {}", error),
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        let line = describe(event);
        info!("{}", line);
        let Some((path, clock)) = &self.file else {
            return;
        };
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut f| writeln!(f, "[{}] {}", clock.unix_secs(), line));
        if let Err(e) = written {
            warn!("Log file {} not writable: {}", path.display(), e);
        }
    }
}
