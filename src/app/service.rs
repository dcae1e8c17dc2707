//! Application service, the hexagonal core.
//!
//! [`AppService`] owns the configuration, the persisted state and the
//! upload counters, and runs one workflow per call.  All I/O flows through
//! port traits and the AT engine injected at call sites, so every workflow
//! runs unchanged against the scripted modem in `tests/`.
//!
//! ```text
//!  PhotoSource ──▶ ┌────────────────────────┐ ──▶ EventSink
//!    WallClock ──▶ │       AppService       │
//!     AtEngine ◀──▶│ photo · report · OTA   │ ──▶ StatePort
//!                  └────────────────────────┘
//! ```
//!
//! Workflows never fail the process: each returns its outcome, logs it,
//! and emits an [`AppEvent`].

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use crate::config::SystemConfig;
use crate::error::{OtaError, PushError, TransactionError};
use crate::modem::ftp::{self, FtpPusher, FtpSettings};
use crate::modem::{AtEngine, PayloadKind, TransferJob, device};
use crate::ota::{OtaConfig, OtaOutcome, OtaTargets, OtaUpdater};
use crate::report::{self, Environment, LocalTime, ReportInputs};

use super::events::AppEvent;
use super::ports::{
    Clock, EventSink, FirmwareStore, FlashWriter, LineTransport, PersistedState, PhotoSource,
    StatePort, SystemControl, WallClock,
};

/// Pictures captured and pictures delivered since boot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub pictures_taken: u32,
    pub pictures_sent: u32,
}

/// The application service orchestrates all domain workflows.
pub struct AppService {
    config: SystemConfig,
    state: PersistedState,
    ftp: FtpPusher,
    ota: OtaUpdater,
    counters: Counters,
    imei: Option<heapless::String<15>>,
    signal: Option<u8>,
}

impl AppService {
    /// Construct the service from configuration and the state loaded at
    /// boot.
    pub fn new(config: SystemConfig, state: PersistedState) -> Self {
        let ftp = FtpPusher::new(FtpSettings::from(&config));
        let ota = OtaUpdater::new(OtaConfig::from(&config));
        Self {
            config,
            state,
            ftp,
            ota,
            counters: Counters::default(),
            imei: None,
            signal: None,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self, sink: &mut impl EventSink) {
        info!(
            "AppService started as '{}', firmware {}",
            self.config.device_name, self.state.firmware_version
        );
        sink.emit(&AppEvent::Started(self.state.firmware_version.clone()));
    }

    /// Read the IMEI (once) and the current signal quality.
    pub fn refresh_identity<T: LineTransport, C: Clock>(
        &mut self,
        engine: &mut AtEngine<T, C>,
        sink: &mut impl EventSink,
    ) {
        if self.imei.is_none() {
            match device::imei(engine) {
                Ok(imei) => {
                    info!("IMEI: {}", imei);
                    self.imei = Some(imei);
                }
                Err(e) => warn!("Failed to get IMEI: {}", e),
            }
        }
        match device::signal_quality(engine) {
            Ok(signal) => self.signal = signal,
            Err(e) => warn!("Signal quality query failed: {}", e),
        }
        sink.emit(&AppEvent::IdentityRefreshed {
            imei: self.imei.as_deref().unwrap_or_default().into(),
            signal: self.signal,
        });
    }

    // ── Workflows ─────────────────────────────────────────────

    /// Capture a frame and push it as `<device>-<stamp>.jpg`.
    pub fn capture_and_upload<T: LineTransport, C: Clock>(
        &mut self,
        engine: &mut AtEngine<T, C>,
        delay: &mut impl DelayNs,
        camera: &mut impl PhotoSource,
        clock: &impl WallClock,
        sink: &mut impl EventSink,
    ) -> Result<(), PushError> {
        let Some(frame) = camera.capture() else {
            warn!("Camera capture failed");
            sink.emit(&AppEvent::CaptureFailed);
            return Ok(());
        };
        self.counters.pictures_taken += 1;
        sink.emit(&AppEvent::PhotoCaptured { bytes: frame.len() });

        let name = report::photo_name(&self.config.device_name, self.local_time(clock));
        self.upload(engine, delay, name, frame, PayloadKind::Binary, sink)?;
        self.counters.pictures_sent += 1;
        Ok(())
    }

    /// Render and push the daily report; on success the report time is
    /// persisted.
    pub fn send_report<T: LineTransport, C: Clock>(
        &mut self,
        engine: &mut AtEngine<T, C>,
        delay: &mut impl DelayNs,
        clock: &impl WallClock,
        env: Environment,
        state_port: &mut impl StatePort,
        sink: &mut impl EventSink,
    ) -> Result<(), PushError> {
        self.refresh_identity(engine, sink);

        let at = self.local_time(clock);
        let inputs = ReportInputs {
            imei: self.imei.as_deref().map(Into::into),
            signal: self.signal,
            env,
            pictures_taken: self.counters.pictures_taken,
            pictures_sent: self.counters.pictures_sent,
        };
        let body = report::render(&self.config.device_name, at, &inputs);
        info!("Report content:\n{}", body);

        let name = report::report_name(&self.config.device_name, at);
        self.upload(engine, delay, name, body.into_bytes(), PayloadKind::Text, sink)?;

        self.state.last_report_unix = Some(clock.unix_secs());
        if let Err(e) = state_port.save_state(&self.state) {
            warn!("Persisting report time failed: {}", e);
        }
        Ok(())
    }

    /// Check for, and if available install, new firmware.
    ///
    /// A successful install restarts the device through
    /// [`SystemControl`]; on the host the call returns afterwards.
    pub fn check_for_update<T, C, S, F, P, R>(
        &mut self,
        engine: &mut AtEngine<T, C>,
        delay: &mut impl DelayNs,
        clock: &impl WallClock,
        targets: OtaTargets<'_, S, F, P, R>,
        sink: &mut impl EventSink,
    ) -> Result<OtaOutcome, OtaError>
    where
        T: LineTransport,
        C: Clock,
        S: FirmwareStore,
        F: FlashWriter,
        P: StatePort,
        R: SystemControl,
    {
        let OtaTargets {
            store,
            flash,
            state_port,
            system,
        } = targets;

        let result = self.ota.run(
            engine,
            delay,
            &mut self.state,
            OtaTargets {
                store,
                flash,
                state_port: &mut *state_port,
                system,
            },
        );

        match &result {
            Ok(OtaOutcome::UpToDate) => {
                self.record_check(clock, state_port);
                sink.emit(&AppEvent::UpToDate(self.state.firmware_version.clone()));
            }
            Ok(OtaOutcome::Applied { version }) => {
                self.record_check(clock, state_port);
                sink.emit(&AppEvent::UpdateApplied(version.clone()));
            }
            Err(e @ OtaError::Check(_)) => sink.emit(&AppEvent::UpdateFailed(*e)),
            Err(e) => {
                // The check itself succeeded; only the install failed.
                self.record_check(clock, state_port);
                sink.emit(&AppEvent::UpdateFailed(*e));
            }
        }
        result
    }

    /// Empty the modem's staging directory.
    pub fn clear_modem_storage<T: LineTransport, C: Clock>(
        &mut self,
        engine: &mut AtEngine<T, C>,
        sink: &mut impl EventSink,
    ) -> Result<usize, TransactionError> {
        match ftp::clear_storage(engine, &self.config.storage_dir) {
            Ok(files) => {
                sink.emit(&AppEvent::StorageCleared { files });
                Ok(files)
            }
            Err(e) => {
                warn!("Clearing modem storage failed: {}", e);
                sink.emit(&AppEvent::StorageClearFailed(e));
                Err(e)
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn state(&self) -> &PersistedState {
        &self.state
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn imei(&self) -> Option<&str> {
        self.imei.as_deref()
    }

    // ── Internal ──────────────────────────────────────────────

    fn record_check(&mut self, clock: &impl WallClock, state_port: &mut impl StatePort) {
        self.state.last_ota_check_unix = Some(clock.unix_secs());
        if let Err(e) = state_port.save_state(&self.state) {
            warn!("Persisting OTA check time failed: {}", e);
        }
    }

    fn local_time(&self, clock: &impl WallClock) -> LocalTime {
        LocalTime::new(clock.unix_secs(), self.config.utc_offset_secs)
    }

    fn upload<T: LineTransport, C: Clock>(
        &mut self,
        engine: &mut AtEngine<T, C>,
        delay: &mut impl DelayNs,
        name: String,
        payload: Vec<u8>,
        kind: PayloadKind,
        sink: &mut impl EventSink,
    ) -> Result<(), PushError> {
        let job = match TransferJob::new(name.clone(), payload, kind) {
            Ok(job) => job,
            Err(e) => {
                warn!("Refusing to upload {:?}: {}", name, e);
                let error = PushError::Job(e);
                sink.emit(&AppEvent::UploadFailed { name, error });
                return Err(error);
            }
        };
        match self.ftp.push(engine, delay, &job) {
            Ok(()) => {
                sink.emit(&AppEvent::Uploaded {
                    name,
                    bytes: job.total_length(),
                });
                Ok(())
            }
            Err(error) => {
                sink.emit(&AppEvent::UploadFailed { name, error });
                Err(error)
            }
        }
    }
}
