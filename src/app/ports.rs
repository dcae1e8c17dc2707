//! Port traits: the hexagonal boundary between the workflows and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AT engine / pipelines / AppService
//! ```
//!
//! Driven adapters (serial line, clocks, flash, NVS, SD card, camera)
//! implement these traits.  The engine and pipelines consume them via
//! generics, so the protocol logic never touches hardware directly and runs
//! unchanged against the scripted modem doubles in `tests/`.
//!
//! Delays are not a port of their own: every retry loop takes an
//! [`embedded_hal::delay::DelayNs`], which ESP-IDF's `FreeRtos` delay and
//! the test doubles both implement.

use crate::config::SystemConfig;
use crate::ota::version::Version;
use serde::{Deserialize, Serialize};

// ───────────────────────────────────────────────────────────────
// Modem transport (driven adapter: domain ↔ UART)
// ───────────────────────────────────────────────────────────────

/// Line-oriented byte channel to the modem.
///
/// Lines are delivered without their `\r\n` terminator and blank framing
/// lines are never returned.  The modem's bare `>` data prompt counts as a
/// complete line even though it carries no terminator.
pub trait LineTransport {
    /// Error type for this transport.
    type Error: core::fmt::Debug;

    /// Write `data` in full.
    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Block until all written bytes have left the device.
    fn flush(&mut self) -> Result<(), Self::Error>;

    /// Read one line, waiting at most `timeout_ms`.
    /// Returns `Ok(None)` if no complete line arrived in time.
    fn read_line(&mut self, timeout_ms: u32) -> Result<Option<String>, Self::Error>;

    /// Read raw bytes into `buf`, waiting at most `timeout_ms`.
    /// Returns the number of bytes read (0 on timeout).
    fn read_bytes(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Self::Error>;

    /// Drop any partially received line and skip input up to the next line
    /// boundary.  Called after a timed-out transaction.
    fn discard_partial(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Time (driven adapter: domain → system timer / RTC)
// ───────────────────────────────────────────────────────────────

/// Monotonic millisecond clock used for transaction deadlines.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Wall-clock time used for file names and persisted timestamps.
pub trait WallClock {
    /// Seconds since the Unix epoch (UTC).  Before SNTP sync this is
    /// whatever the RTC holds, usually close to zero.
    fn unix_secs(&self) -> i64;
}

// ───────────────────────────────────────────────────────────────
// Firmware image (driven adapters: domain → SD card / flash)
// ───────────────────────────────────────────────────────────────

/// Destination file for a firmware download.
///
/// Writes are append-only so the file size always equals the number of
/// bytes downloaded so far.
pub trait FirmwareStore {
    /// Create the file, truncating any previous content.
    fn create(&mut self) -> Result<(), StorageError>;

    /// Append `data` at the end of the file.
    fn append(&mut self, data: &[u8]) -> Result<(), StorageError>;

    /// Current file size in bytes.
    fn len(&self) -> Result<u32, StorageError>;

    /// Whether the file is empty.
    fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }

    /// Read up to `buf.len()` bytes at `offset`.  Returns the count read.
    fn read_at(&mut self, offset: u32, buf: &mut [u8]) -> Result<usize, StorageError>;
}

/// Sink that writes a firmware image into the inactive app partition.
pub trait FlashWriter {
    /// Open a new image of `size` bytes.
    fn begin(&mut self, size: u32) -> Result<(), crate::ota::flash::FlashError>;

    /// Write the next slice.  Returns the number of bytes accepted.
    fn write(&mut self, data: &[u8]) -> Result<usize, crate::ota::flash::FlashError>;

    /// Verify the image and mark it bootable.
    fn finalize(&mut self) -> Result<(), crate::ota::flash::FlashError>;

    /// Discard the partially written image.
    fn abort(&mut self);
}

/// System-level controls.
pub trait SystemControl {
    /// Restart into the (possibly new) boot partition.
    fn restart(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Camera (driven adapter: domain ← camera sensor)
// ───────────────────────────────────────────────────────────────

/// Produces one JPEG frame per call.
pub trait PhotoSource {
    fn capture(&mut self) -> Option<Vec<u8>>;
}

/// A camera that failed to initialise never yields a frame.
impl<P: PhotoSource> PhotoSource for Option<P> {
    fn capture(&mut self) -> Option<Vec<u8>> {
        self.as_mut().and_then(PhotoSource::capture)
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The service emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Persistence (driven adapter: domain ↔ NVS)
// ───────────────────────────────────────────────────────────────

/// State that must survive a reboot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Version of the firmware currently installed.
    pub firmware_version: Version,
    /// Unix time of the last successfully pushed daily report.
    pub last_report_unix: Option<i64>,
    /// Unix time of the last completed OTA check.
    pub last_ota_check_unix: Option<i64>,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            firmware_version: Version::running(),
            last_report_unix: None,
            last_ota_check_unix: None,
        }
    }
}

/// Loads and persists [`PersistedState`].
pub trait StatePort {
    /// Returns [`PersistedState::default()`] if nothing is stored yet.
    fn load_state(&self) -> Result<PersistedState, StorageError>;

    /// Write atomically.
    fn save_state(&mut self, state: &PersistedState) -> Result<(), StorageError>;
}

/// Loads and persists system configuration.
///
/// Implementations MUST validate before persisting.
pub trait ConfigPort {
    /// Returns [`SystemConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Scheduler delegate (decouples scheduler from event system)
// ───────────────────────────────────────────────────────────────

/// Callback trait that the scheduler invokes when a schedule fires.
///
/// The main loop implements this by forwarding to
/// [`push_event`](crate::events::push_event); the scheduler itself knows
/// nothing about events or queues.
pub trait SchedulerDelegate {
    fn on_schedule_fired(&mut self, label: &str, kind: ScheduleFiredKind);
}

/// Discriminant passed to [`SchedulerDelegate::on_schedule_fired`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleFiredKind {
    /// A recurring periodic schedule fired.
    Periodic,
    /// A one-shot schedule fired (auto-disables after).
    OneShot,
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// Stored config failed integrity / deserialization check.
    Corrupted,
    /// A config field failed validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from storage ports ([`StatePort`], [`FirmwareStore`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key or file does not exist.
    NotFound,
    /// Storage is full.
    Full,
    /// Stored blob failed to deserialize.
    Corrupted,
    /// Generic I/O error.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::Full => write!(f, "storage full"),
            Self::Corrupted => write!(f, "stored data corrupted"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
