//! FTP push over the modem's built-in FTP(S) client.
//!
//! ```text
//!   start ──▶ login ──▶ type ──▶ stage ──▶ put ×N ──▶ logout ──▶ stop
//!     │          │                 │          │
//!     └─ stop, start once more     └──────────┴──▶ logout/stop still attempted
//! ```
//!
//! Logout and stop are best-effort: their failures are logged and never
//! change the outcome of the push.

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use super::command::{self, Command};
use super::engine::AtEngine;
use super::response::{self, Response};
use super::staging::{self, TransferJob};
use crate::app::ports::{Clock, LineTransport};
use crate::config::SystemConfig;
use crate::error::{PushError, TransactionError};

/// Connection and retry parameters for [`FtpPusher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpSettings {
    pub server: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Modem storage directory used for staging.
    pub storage_dir: String,
    pub put_attempts: u8,
    pub put_retry_delay_ms: u32,
}

impl From<&SystemConfig> for FtpSettings {
    fn from(cfg: &SystemConfig) -> Self {
        Self {
            server: cfg.ftp_server.clone(),
            port: cfg.ftp_port,
            user: cfg.ftp_user.clone(),
            password: cfg.ftp_password.clone(),
            storage_dir: cfg.storage_dir.clone(),
            put_attempts: cfg.ftp_put_attempts.max(1),
            put_retry_delay_ms: cfg.ftp_put_retry_delay_ms,
        }
    }
}

/// Index of a modem drive in `AT+CFTPSPUTFILE` (`C:` = 1, `D:` = 2, ...).
pub fn drive_index(dir: &str) -> u8 {
    match dir.bytes().next().map(|b| b.to_ascii_uppercase()) {
        Some(letter @ b'C'..=b'Z') => letter - b'C' + 1,
        _ => 1,
    }
}

pub struct FtpPusher {
    settings: FtpSettings,
}

impl FtpPusher {
    pub fn new(settings: FtpSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &FtpSettings {
        &self.settings
    }

    /// Upload `job` to the FTP server.
    pub fn push<T: LineTransport, C: Clock>(
        &self,
        engine: &mut AtEngine<T, C>,
        delay: &mut impl DelayNs,
        job: &TransferJob,
    ) -> Result<(), PushError> {
        info!(
            "FTP push {} ({} bytes) to {}:{}",
            job.name(),
            job.total_length(),
            self.settings.server,
            self.settings.port
        );

        if let Err(e) = start_session(engine) {
            stop_session(engine);
            return Err(PushError::Start(e));
        }

        let s = &self.settings;
        if let Err(e) = service_call(engine, &command::ftp_login(&s.server, s.port, &s.user, &s.password)) {
            warn!("FTP login to {} failed: {}", s.server, e);
            stop_session(engine);
            return Err(PushError::Login(e));
        }

        let result = self.transfer(engine, delay, job);

        if let Err(e) = service_call(engine, &command::ftp_logout()) {
            warn!("FTP logout failed: {}", e);
        }
        stop_session(engine);

        match &result {
            Ok(()) => info!("FTP push {} done", job.name()),
            Err(e) => warn!("FTP push {} failed: {}", job.name(), e),
        }
        result
    }

    fn transfer<T: LineTransport, C: Clock>(
        &self,
        engine: &mut AtEngine<T, C>,
        delay: &mut impl DelayNs,
        job: &TransferJob,
    ) -> Result<(), PushError> {
        if let Err(e) = engine.execute(&command::ftp_type(job.kind().ftp_type())) {
            warn!("FTP type {} not accepted: {}", job.kind().ftp_type(), e);
        }

        staging::stage(engine, job, &self.settings.storage_dir)?;

        let put = command::ftp_put(job.name(), drive_index(&self.settings.storage_dir));
        let attempts = self.settings.put_attempts;
        for attempt in 1..=attempts {
            match service_call(engine, &put) {
                Ok(_) => return Ok(()),
                Err(e) => {
                    warn!("FTP put {} attempt {}/{} failed: {}", job.name(), attempt, attempts, e);
                }
            }
            if attempt < attempts {
                delay.delay_ms(self.settings.put_retry_delay_ms);
            }
        }
        Err(PushError::Put { attempts })
    }
}

/// Remove every file in `dir` on the modem.  Returns how many files the
/// listing showed (0 means nothing was deleted).
pub fn clear_storage<T: LineTransport, C: Clock>(
    engine: &mut AtEngine<T, C>,
    dir: &str,
) -> Result<usize, TransactionError> {
    engine.execute(&command::change_dir(dir))?;
    let listing = engine.execute(&command::list_dir())?;
    let files = response::file_listing(&listing);
    if files.is_empty() {
        info!("modem storage {} already empty", dir);
        return Ok(0);
    }
    engine.execute(&command::delete_all())?;
    info!("cleared {} files from modem storage {}", files.len(), dir);
    Ok(files.len())
}

/// Run a service command whose `+NAME: <code>` reply must carry code 0.
fn service_call<T: LineTransport, C: Clock>(
    engine: &mut AtEngine<T, C>,
    cmd: &Command,
) -> Result<Response, TransactionError> {
    let reply = engine.execute(cmd)?;
    match response::result_code(&reply, cmd.expected())? {
        0 => Ok(reply),
        code => {
            warn!("{} returned code {}", cmd, code);
            Err(TransactionError::Protocol)
        }
    }
}

/// Start the FTP service; if the first start fails (usually because a
/// previous session is still open), stop it and start once more.
fn start_session<T: LineTransport, C: Clock>(
    engine: &mut AtEngine<T, C>,
) -> Result<(), TransactionError> {
    if service_call(engine, &command::ftp_start()).is_ok() {
        return Ok(());
    }
    warn!("FTP start failed, restarting service");
    stop_session(engine);
    service_call(engine, &command::ftp_start()).map(|_| ())
}

fn stop_session<T: LineTransport, C: Clock>(engine: &mut AtEngine<T, C>) {
    if let Err(e) = service_call(engine, &command::ftp_stop()) {
        warn!("FTP stop failed: {}", e);
    }
}
