//! Firmware image writer backed by the `esp-ota` crate.
//!
//! Flow: begin(size) → N × write → finalize → restart
//!
//! On ESP-IDF the image goes into the inactive OTA partition.  The host
//! build keeps it in memory so the apply path can be exercised in tests.

use core::fmt;
use log::{info, warn};

use crate::app::ports::{FlashWriter, SystemControl};

const MAX_FIRMWARE_SIZE: u32 = 4 * 1024 * 1024; // 4 MB

// ── Error type ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashError {
    AlreadyInProgress,
    InvalidSize,
    BeginFailed,
    WriteFailed,
    VerifyFailed,
    BootSetFailed,
    IncompleteTransfer,
    NotReceiving,
    Overflow,
}

impl fmt::Display for FlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyInProgress => write!(f, "image write already in progress"),
            Self::InvalidSize => write!(f, "firmware size out of range (max 4 MB)"),
            Self::BeginFailed => write!(f, "OTA begin failed"),
            Self::WriteFailed => write!(f, "OTA write failed"),
            Self::VerifyFailed => write!(f, "OTA verification failed"),
            Self::BootSetFailed => write!(f, "set boot partition failed"),
            Self::IncompleteTransfer => write!(f, "finalize called before all bytes written"),
            Self::NotReceiving => write!(f, "no image write in progress"),
            Self::Overflow => write!(f, "write would exceed declared firmware size"),
        }
    }
}

// ── State machine ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashState {
    Idle,
    Receiving { expected_size: u32, bytes_written: u32 },
    ReadyToReboot,
    Failed,
}

/// Writes one firmware image at a time into the inactive partition.
pub struct FlashManager {
    state: FlashState,
    #[cfg(feature = "espidf")]
    update: Option<esp_ota::OtaUpdate>,
    #[cfg(not(feature = "espidf"))]
    image: Vec<u8>,
}

impl FlashManager {
    pub fn new() -> Self {
        Self {
            state: FlashState::Idle,
            #[cfg(feature = "espidf")]
            update: None,
            #[cfg(not(feature = "espidf"))]
            image: Vec::new(),
        }
    }

    pub fn state(&self) -> FlashState {
        self.state
    }

    /// Image written so far (simulation only).
    #[cfg(not(feature = "espidf"))]
    pub fn image(&self) -> &[u8] {
        &self.image
    }
}

impl Default for FlashManager {
    fn default() -> Self {
        Self::new()
    }
}

impl FlashWriter for FlashManager {
    fn begin(&mut self, size: u32) -> Result<(), FlashError> {
        if matches!(self.state, FlashState::Receiving { .. }) {
            return Err(FlashError::AlreadyInProgress);
        }
        if size == 0 || size > MAX_FIRMWARE_SIZE {
            return Err(FlashError::InvalidSize);
        }

        #[cfg(feature = "espidf")]
        {
            let update = esp_ota::OtaUpdate::begin().map_err(|e| {
                warn!("esp-ota begin failed: {:?}", e);
                FlashError::BeginFailed
            })?;
            self.update = Some(update);
        }
        #[cfg(not(feature = "espidf"))]
        self.image.clear();

        self.state = FlashState::Receiving {
            expected_size: size,
            bytes_written: 0,
        };
        info!("flash: begin ({} bytes)", size);
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, FlashError> {
        let FlashState::Receiving {
            expected_size,
            bytes_written,
        } = self.state
        else {
            return Err(FlashError::NotReceiving);
        };
        let len = u32::try_from(data.len()).map_err(|_| FlashError::Overflow)?;
        if bytes_written.saturating_add(len) > expected_size {
            return Err(FlashError::Overflow);
        }

        #[cfg(feature = "espidf")]
        {
            let Some(update) = self.update.as_mut() else {
                return Err(FlashError::NotReceiving);
            };
            if let Err(e) = update.write(data) {
                warn!("esp-ota write failed: {:?}", e);
                self.abort();
                return Err(FlashError::WriteFailed);
            }
        }
        #[cfg(not(feature = "espidf"))]
        self.image.extend_from_slice(data);

        self.state = FlashState::Receiving {
            expected_size,
            bytes_written: bytes_written + len,
        };
        Ok(data.len())
    }

    fn finalize(&mut self) -> Result<(), FlashError> {
        match self.state {
            FlashState::Receiving {
                expected_size,
                bytes_written,
            } if bytes_written == expected_size => {}
            FlashState::Receiving { .. } => return Err(FlashError::IncompleteTransfer),
            _ => return Err(FlashError::NotReceiving),
        }

        #[cfg(feature = "espidf")]
        {
            let Some(update) = self.update.take() else {
                self.state = FlashState::Failed;
                return Err(FlashError::NotReceiving);
            };
            let mut completed = update.finalize().map_err(|e| {
                warn!("esp-ota finalize failed: {:?}", e);
                self.state = FlashState::Failed;
                FlashError::VerifyFailed
            })?;
            completed.set_as_boot_partition().map_err(|e| {
                warn!("esp-ota set_as_boot_partition failed: {:?}", e);
                self.state = FlashState::Failed;
                FlashError::BootSetFailed
            })?;
        }

        self.state = FlashState::ReadyToReboot;
        info!("flash: image finalized, ready to reboot");
        Ok(())
    }

    fn abort(&mut self) {
        #[cfg(feature = "espidf")]
        {
            // Dropping the handle aborts the update.
            self.update.take();
        }
        #[cfg(not(feature = "espidf"))]
        self.image.clear();
        self.state = FlashState::Idle;
        warn!("flash: image write aborted");
    }
}

// ── Restart ───────────────────────────────────────────────────

/// Chip-level [`SystemControl`].
#[derive(Debug, Default)]
pub struct ChipControl {
    /// Set instead of restarting in the host build.
    pub restart_requested: bool,
}

impl SystemControl for ChipControl {
    #[cfg(feature = "espidf")]
    fn restart(&mut self) {
        info!("restarting into new firmware");
        esp_ota::restart();
    }

    #[cfg(not(feature = "espidf"))]
    fn restart(&mut self) {
        info!("restart requested (simulation)");
        self.restart_requested = true;
    }
}

// ── Boot validation ───────────────────────────────────────────

/// Mark the running image as valid so the bootloader does not roll back
/// to the previous one.
#[cfg(feature = "espidf")]
pub fn check_rollback() {
    match esp_ota::mark_app_valid() {
        Ok(()) => info!("OTA: firmware marked valid (rollback cancelled)"),
        Err(e) => warn!("OTA: mark_app_valid failed: {:?}", e),
    }
}

#[cfg(not(feature = "espidf"))]
pub fn check_rollback() {
    info!("OTA rollback check (simulation): skipped");
}

// ── Tests ─────────────────────────────────────────────────────
