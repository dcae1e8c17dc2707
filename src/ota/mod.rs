//! Over-the-air firmware updates through the modem's HTTP client.
//!
//! ```text
//!   Idle ──▶ Checking ──┬──▶ NoUpdate ──▶ Idle
//!                       └──▶ Downloading ──▶ Applying ──▶ Reboot
//!                                 ▲              │
//!                                 └── delay ─────┘  (bounded attempts)
//! ```
//!
//! A failed check goes straight back to `Idle`; it is retried by the next
//! scheduled check, not here.  Download and apply failures retry the whole
//! attempt after a fixed delay.  The persisted version only changes after a
//! finalized image, and only to the version the check reported.

pub mod flash;
pub mod version;

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};

use crate::app::ports::{
    Clock, FirmwareStore, FlashWriter, LineTransport, PersistedState, StatePort, StorageError,
    SystemControl,
};
use crate::config::SystemConfig;
use crate::error::{ApplyError, OtaError, TransactionError};
use crate::modem::{AtEngine, http};
use version::Version;

/// Endpoints and retry budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtaConfig {
    pub version_url: String,
    pub firmware_url: String,
    /// Bytes per `AT+HTTPREAD` and per flash write.
    pub chunk_size: u32,
    pub max_attempts: u8,
    pub retry_delay_ms: u32,
}

impl From<&SystemConfig> for OtaConfig {
    fn from(cfg: &SystemConfig) -> Self {
        Self {
            version_url: cfg.version_url(),
            firmware_url: cfg.firmware_url(),
            chunk_size: cfg.ota_chunk_size.max(1),
            max_attempts: cfg.ota_max_attempts.max(1),
            retry_delay_ms: cfg.ota_retry_delay_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaPhase {
    Idle,
    Checking,
    NoUpdate,
    Downloading,
    Applying,
    Reboot,
}

/// Progress of one download/apply attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtaSession {
    pub current_version: Version,
    pub remote_version: Version,
    /// Length announced by the server, 0 until the download starts.
    pub total_length: u32,
    bytes_downloaded: u32,
}

impl OtaSession {
    pub fn new(current_version: Version, remote_version: Version) -> Self {
        Self {
            current_version,
            remote_version,
            total_length: 0,
            bytes_downloaded: 0,
        }
    }

    pub fn bytes_downloaded(&self) -> u32 {
        self.bytes_downloaded
    }

    pub fn is_complete(&self) -> bool {
        self.total_length > 0 && self.bytes_downloaded == self.total_length
    }

    fn advance(&mut self, n: u32) {
        self.bytes_downloaded = self.bytes_downloaded.saturating_add(n);
    }
}

/// What a completed run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtaOutcome {
    UpToDate,
    /// The image was flashed and the version persisted; a restart was
    /// requested.
    Applied { version: Version },
}

/// Local resources the update writes to.
pub struct OtaTargets<'a, S, F, P, R> {
    pub store: &'a mut S,
    pub flash: &'a mut F,
    pub state_port: &'a mut P,
    pub system: &'a mut R,
}

pub struct OtaUpdater {
    config: OtaConfig,
    phase: OtaPhase,
}

impl OtaUpdater {
    pub fn new(config: OtaConfig) -> Self {
        Self {
            config,
            phase: OtaPhase::Idle,
        }
    }

    pub fn phase(&self) -> OtaPhase {
        self.phase
    }

    pub fn config(&self) -> &OtaConfig {
        &self.config
    }

    /// Check, and if a different version is published, download, apply,
    /// persist and restart.
    pub fn run<T, C, S, F, P, R>(
        &mut self,
        engine: &mut AtEngine<T, C>,
        delay: &mut impl DelayNs,
        state: &mut PersistedState,
        targets: OtaTargets<'_, S, F, P, R>,
    ) -> Result<OtaOutcome, OtaError>
    where
        T: LineTransport,
        C: Clock,
        S: FirmwareStore,
        F: FlashWriter,
        P: StatePort,
        R: SystemControl,
    {
        self.phase = OtaPhase::Checking;
        let remote = match self.check(engine, &state.firmware_version) {
            Ok(Some(remote)) => remote,
            Ok(None) => {
                self.phase = OtaPhase::NoUpdate;
                info!("OTA: firmware {} is current", state.firmware_version);
                self.phase = OtaPhase::Idle;
                return Ok(OtaOutcome::UpToDate);
            }
            Err(e) => {
                warn!("OTA: check failed: {}", e);
                self.phase = OtaPhase::Idle;
                return Err(e);
            }
        };
        info!("OTA: update {} -> {}", state.firmware_version, remote);

        let attempts = self.config.max_attempts;
        for attempt in 1..=attempts {
            let mut session = OtaSession::new(state.firmware_version.clone(), remote.clone());
            let outcome = self.attempt(
                engine,
                &mut session,
                state,
                &mut *targets.store,
                &mut *targets.flash,
                &mut *targets.state_port,
            );
            match outcome {
                Ok(()) => {
                    self.phase = OtaPhase::Reboot;
                    info!("OTA: {} installed, restarting", session.remote_version);
                    targets.system.restart();
                    return Ok(OtaOutcome::Applied {
                        version: session.remote_version,
                    });
                }
                Err(e) => {
                    warn!("OTA: attempt {}/{} failed: {}", attempt, attempts, e);
                }
            }
            if attempt < attempts {
                delay.delay_ms(self.config.retry_delay_ms);
            }
        }

        self.phase = OtaPhase::Idle;
        warn!("OTA: giving up, staying on {}", state.firmware_version);
        Err(OtaError::RetriesExhausted { attempts })
    }

    fn attempt<T, C, S, F, P>(
        &mut self,
        engine: &mut AtEngine<T, C>,
        session: &mut OtaSession,
        state: &mut PersistedState,
        store: &mut S,
        flash: &mut F,
        state_port: &mut P,
    ) -> Result<(), OtaError>
    where
        T: LineTransport,
        C: Clock,
        S: FirmwareStore,
        F: FlashWriter,
        P: StatePort,
    {
        self.phase = OtaPhase::Downloading;
        self.download(engine, session, store)?;

        self.phase = OtaPhase::Applying;
        self.apply(session, store, flash)?;

        let previous = core::mem::replace(
            &mut state.firmware_version,
            session.remote_version.clone(),
        );
        if let Err(e) = state_port.save_state(state) {
            warn!("OTA: persisting version {} failed: {}", session.remote_version, e);
            state.firmware_version = previous;
            return Err(ApplyError::Persist.into());
        }
        Ok(())
    }

    /// Fetch the published version.  `Some` if it differs from `current`.
    pub fn check<T: LineTransport, C: Clock>(
        &mut self,
        engine: &mut AtEngine<T, C>,
        current: &Version,
    ) -> Result<Option<Version>, OtaError> {
        http::open(engine).map_err(OtaError::Check)?;
        let result = fetch_version(engine, &self.config.version_url);
        http::close(engine);

        let remote = result.map_err(OtaError::Check)?;
        debug!("OTA: published {}, installed {}", remote, current);
        Ok((remote != *current).then_some(remote))
    }

    /// Download the image into `store`, chunk by chunk from offset 0.
    pub fn download<T: LineTransport, C: Clock, S: FirmwareStore>(
        &mut self,
        engine: &mut AtEngine<T, C>,
        session: &mut OtaSession,
        store: &mut S,
    ) -> Result<(), OtaError> {
        http::open(engine).map_err(OtaError::Download)?;
        let result = self.fetch_image(engine, session, store);
        http::close(engine);
        result
    }

    fn fetch_image<T: LineTransport, C: Clock, S: FirmwareStore>(
        &self,
        engine: &mut AtEngine<T, C>,
        session: &mut OtaSession,
        store: &mut S,
    ) -> Result<(), OtaError> {
        let total = http::get(engine, &self.config.firmware_url).map_err(OtaError::Download)?;
        if total == 0 {
            warn!("OTA: server announced an empty image");
            return Err(OtaError::Download(TransactionError::Protocol));
        }
        session.total_length = total;
        store.create()?;
        info!("OTA: downloading {} bytes", total);

        while session.bytes_downloaded() < total {
            let offset = session.bytes_downloaded();
            let want = self.config.chunk_size.min(total - offset);
            let incomplete = OtaError::TransferIncomplete {
                expected: total,
                received: offset,
            };
            let chunk = match http::read(engine, offset, want) {
                Ok(chunk) if !chunk.is_empty() => chunk,
                Ok(_) => {
                    warn!("OTA: empty chunk at {}/{}", offset, total);
                    return Err(incomplete);
                }
                Err(e) => {
                    warn!("OTA: read at {}/{} failed: {}", offset, total, e);
                    return Err(incomplete);
                }
            };
            store.append(&chunk)?;
            session.advance(chunk.len() as u32);
            if store.len()? != session.bytes_downloaded() {
                warn!("OTA: firmware file out of step with download");
                return Err(OtaError::Storage(StorageError::Corrupted));
            }
            debug!("OTA: {}/{} bytes", session.bytes_downloaded(), total);
        }
        Ok(())
    }

    /// Stream the downloaded file into flash and mark it bootable.
    pub fn apply<S: FirmwareStore, F: FlashWriter>(
        &mut self,
        session: &OtaSession,
        store: &mut S,
        flash: &mut F,
    ) -> Result<(), OtaError> {
        let size = store.len()?;
        if size != session.total_length {
            return Err(OtaError::TransferIncomplete {
                expected: session.total_length,
                received: size,
            });
        }
        flash.begin(size).map_err(ApplyError::from)?;

        if let Err(e) = stream_image(store, flash, size, self.config.chunk_size as usize) {
            flash.abort();
            return Err(e);
        }
        if let Err(e) = flash.finalize() {
            flash.abort();
            return Err(ApplyError::from(e).into());
        }
        info!("OTA: {} bytes written to flash", size);
        Ok(())
    }
}

fn fetch_version<T: LineTransport, C: Clock>(
    engine: &mut AtEngine<T, C>,
    url: &str,
) -> Result<Version, TransactionError> {
    let len = http::get(engine, url)?;
    let body = http::read(engine, 0, len)?;
    Version::from_body(&body).map_err(|e| {
        warn!("OTA: bad version document: {}", e);
        TransactionError::Protocol
    })
}

fn stream_image<S: FirmwareStore, F: FlashWriter>(
    store: &mut S,
    flash: &mut F,
    size: u32,
    chunk: usize,
) -> Result<(), OtaError> {
    let mut buf = vec![0u8; chunk];
    let mut written: u32 = 0;
    while written < size {
        let n = store.read_at(written, &mut buf)?;
        if n == 0 {
            break;
        }
        let accepted = flash.write(&buf[..n]).map_err(ApplyError::from)?;
        if accepted != n {
            return Err(ApplyError::ShortWrite {
                expected: n as u32,
                written: accepted as u32,
            }
            .into());
        }
        written += n as u32;
    }
    if written != size {
        return Err(ApplyError::ShortWrite {
            expected: size,
            written,
        }
        .into());
    }
    Ok(())
}
