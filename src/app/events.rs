//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them (log to serial, append to the SD
//! card log, etc.).

use crate::error::{OtaError, PushError, TransactionError};
use crate::ota::version::Version;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The service has started (carries the installed firmware version).
    Started(Version),

    /// Modem identity and signal were read.
    IdentityRefreshed { imei: String, signal: Option<u8> },

    /// A frame was captured.
    PhotoCaptured { bytes: usize },

    /// The camera returned no frame.
    CaptureFailed,

    /// A file reached the FTP server.
    Uploaded { name: String, bytes: u32 },

    /// A file could not be pushed.
    UploadFailed { name: String, error: PushError },

    /// The installed firmware matches the published one.
    UpToDate(Version),

    /// A new image was installed; a restart follows.
    UpdateApplied(Version),

    /// The update check or the update itself failed.
    UpdateFailed(OtaError),

    /// Files were removed from modem storage.
    StorageCleared { files: usize },

    StorageClearFailed(TransactionError),
}
