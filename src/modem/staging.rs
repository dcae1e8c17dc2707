//! Binary staging into modem-local storage.
//!
//! A payload is declared with its exact length before a single byte is
//! written; the modem then consumes that many raw bytes off the line and
//! confirms with `OK`.

use log::{info, warn};

use super::command::{self, OK};
use super::engine::AtEngine;
use crate::app::ports::{Clock, LineTransport};
use crate::error::TransferError;
use crate::util::is_quotable;

/// Base completion window after the last payload byte.
const COMPLETION_BASE_MS: u32 = 10_000;
/// Extra completion time per [`COMPLETION_STEP_BYTES`] of payload.
const COMPLETION_STEP_MS: u32 = 1_000;
const COMPLETION_STEP_BYTES: u32 = 8 * 1024;

/// What the payload is; selects the FTP transfer type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// JPEG photos and other binary data (`TYPE I`).
    Binary,
    /// Text reports (`TYPE A`).
    Text,
}

impl PayloadKind {
    pub fn ftp_type(self) -> char {
        match self {
            Self::Binary => 'I',
            Self::Text => 'A',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobError {
    EmptyName,
    InvalidName,
    TooLarge,
}

impl core::fmt::Display for JobError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "file name is empty"),
            Self::InvalidName => write!(f, "file name must be printable, without quotes or '/'"),
            Self::TooLarge => write!(f, "payload exceeds 4 GiB"),
        }
    }
}

/// A named payload bound for modem storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferJob {
    name: String,
    payload: Vec<u8>,
    kind: PayloadKind,
}

impl TransferJob {
    pub fn new(
        name: impl Into<String>,
        payload: Vec<u8>,
        kind: PayloadKind,
    ) -> Result<Self, JobError> {
        let name = name.into();
        if name.is_empty() {
            return Err(JobError::EmptyName);
        }
        if !is_quotable(&name) || name.contains(['/', '\\']) {
            return Err(JobError::InvalidName);
        }
        if u32::try_from(payload.len()).is_err() {
            return Err(JobError::TooLarge);
        }
        Ok(Self {
            name,
            payload,
            kind,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn kind(&self) -> PayloadKind {
        self.kind
    }

    /// Declared length; always the payload length.
    pub fn total_length(&self) -> u32 {
        // Bounded at construction.
        self.payload.len() as u32
    }
}

/// Time allowed for the modem's `OK` after the payload was flushed.
pub fn completion_window_ms(len: u32) -> u32 {
    COMPLETION_BASE_MS.saturating_add((len / COMPLETION_STEP_BYTES).saturating_mul(COMPLETION_STEP_MS))
}

/// Stage `job` into `dir` on the modem (`dir` such as `C:`).
///
/// A failure selecting the directory or initiating the transfer returns
/// before any payload byte is written.  A missing completion `OK` leaves
/// the partial file on the modem.
pub fn stage<T: LineTransport, C: Clock>(
    engine: &mut AtEngine<T, C>,
    job: &TransferJob,
    dir: &str,
) -> Result<(), TransferError> {
    let len = job.total_length();

    engine
        .execute(&command::change_dir(dir))
        .map_err(TransferError::SelectDirectory)?;

    let path = format!("{dir}/{}", job.name());
    engine
        .execute(&command::receive_file(&path, len))
        .map_err(TransferError::Initiate)?;

    engine.write_payload(job.payload()).map_err(|e| {
        warn!("staging {}: payload write failed: {}", job.name(), e);
        TransferError::Write
    })?;

    engine
        .await_token(OK, completion_window_ms(len))
        .map_err(|e| {
            warn!("staging {}: no completion after {} bytes: {}", job.name(), len, e);
            TransferError::Incomplete
        })?;

    info!("staged {} ({} bytes) into {}", job.name(), len, dir);
    Ok(())
}
