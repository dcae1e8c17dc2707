//! Error types for the SmartCam firmware.
//!
//! One enum per layer, each convertible into the layer above it, so a
//! workflow outcome always tells which step failed.  All variants are `Copy`
//! so they travel through events and logs without allocation.
//!
//! ```text
//!   TransactionError ──▶ TransferError ──▶ PushError
//!          │
//!          └───────────▶ OtaError ◀── ApplyError ◀── FlashError
//! ```

use core::fmt;

use crate::app::ports::StorageError;
use crate::modem::staging::JobError;
use crate::ota::flash::FlashError;

// ---------------------------------------------------------------------------
// AT transaction errors
// ---------------------------------------------------------------------------

/// Outcome of a single failed send-and-wait cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionError {
    /// Neither the expected token nor an error marker arrived in time.
    Timeout,
    /// The modem reported `ERROR`, or the reply did not have the expected shape.
    Protocol,
    /// The underlying serial channel failed.
    Io,
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timed out waiting for modem reply"),
            Self::Protocol => write!(f, "modem reported an error"),
            Self::Io => write!(f, "serial I/O failure"),
        }
    }
}

// ---------------------------------------------------------------------------
// Staging transfer errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferError {
    /// Selecting the modem storage directory failed.
    SelectDirectory(TransactionError),
    /// The modem refused the transfer initiation; no payload was written.
    Initiate(TransactionError),
    /// Writing the raw payload to the serial channel failed.
    Write,
    /// The length was declared but the completion sentinel never arrived.
    Incomplete,
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelectDirectory(e) => write!(f, "select storage directory: {e}"),
            Self::Initiate(e) => write!(f, "transfer initiation: {e}"),
            Self::Write => write!(f, "payload write failed"),
            Self::Incomplete => write!(f, "transfer incomplete (no completion sentinel)"),
        }
    }
}

// ---------------------------------------------------------------------------
// FTP push errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushError {
    /// The file name or payload cannot be sent.
    Job(JobError),
    /// The FTP service could not be started, even after a restart.
    Start(TransactionError),
    /// Login to the FTP server failed.
    Login(TransactionError),
    /// The file could not be staged into modem storage.
    Stage(TransferError),
    /// Every put attempt failed.
    Put { attempts: u8 },
}

impl fmt::Display for PushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Job(e) => write!(f, "invalid upload: {e}"),
            Self::Start(e) => write!(f, "FTP start: {e}"),
            Self::Login(e) => write!(f, "FTP login: {e}"),
            Self::Stage(e) => write!(f, "staging: {e}"),
            Self::Put { attempts } => write!(f, "FTP put failed after {attempts} attempts"),
        }
    }
}

impl From<TransferError> for PushError {
    fn from(e: TransferError) -> Self {
        Self::Stage(e)
    }
}

// ---------------------------------------------------------------------------
// OTA errors
// ---------------------------------------------------------------------------

/// Failure while writing the downloaded image to flash.  Always terminal for
/// the attempt; the persisted version is never touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyError {
    /// The flash writer accepted fewer bytes than offered.
    ShortWrite { expected: u32, written: u32 },
    /// The flash writer reported an error.
    Flash(FlashError),
    /// The new version could not be persisted after a successful flash.
    Persist,
}

impl fmt::Display for ApplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShortWrite { expected, written } => {
                write!(f, "short flash write ({written} of {expected} bytes)")
            }
            Self::Flash(e) => write!(f, "flash: {e}"),
            Self::Persist => write!(f, "could not persist new version"),
        }
    }
}

impl From<FlashError> for ApplyError {
    fn from(e: FlashError) -> Self {
        Self::Flash(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaError {
    /// The version check transaction failed.
    Check(TransactionError),
    /// A download transaction failed before any chunk could be requested.
    Download(TransactionError),
    /// The download stopped short of the declared length.
    TransferIncomplete { expected: u32, received: u32 },
    /// The local destination file failed.
    Storage(StorageError),
    /// Writing the image to flash failed.
    Apply(ApplyError),
    /// Every attempt failed; the device stays on its current firmware.
    RetriesExhausted { attempts: u8 },
}

impl fmt::Display for OtaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Check(e) => write!(f, "version check: {e}"),
            Self::Download(e) => write!(f, "download: {e}"),
            Self::TransferIncomplete { expected, received } => {
                write!(f, "download incomplete ({received} of {expected} bytes)")
            }
            Self::Storage(e) => write!(f, "firmware file: {e}"),
            Self::Apply(e) => write!(f, "apply: {e}"),
            Self::RetriesExhausted { attempts } => {
                write!(f, "update abandoned after {attempts} attempts")
            }
        }
    }
}

impl From<ApplyError> for OtaError {
    fn from(e: ApplyError) -> Self {
        Self::Apply(e)
    }
}

impl From<StorageError> for OtaError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl std::error::Error for TransactionError {}
impl std::error::Error for TransferError {}
impl std::error::Error for PushError {}
impl std::error::Error for ApplyError {}
impl std::error::Error for OtaError {}
