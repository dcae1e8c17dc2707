//! System configuration parameters
//!
//! All tunable parameters for the SmartCam device.  Defaults are compiled
//! in; a JSON file on the SD card may override any subset of them, and the
//! validated result is cached in NVS.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::util::is_quotable;

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    // --- Identity ---
    /// Camera name, used in file names and update endpoints
    pub device_name: String,
    /// Offset of local time from UTC (seconds), applied to file names
    pub utc_offset_secs: i32,

    // --- Modem ---
    /// UART baud rate towards the modem
    pub modem_baud: u32,
    /// Preferred network mode code passed to `AT+CNMP`
    pub network_mode: u8,
    /// Modem-local storage directory used for staging (e.g. `C:`)
    pub storage_dir: String,

    // --- FTP ---
    pub ftp_server: String,
    pub ftp_port: u16,
    pub ftp_user: String,
    pub ftp_password: String,
    /// Put attempts per push before giving up
    pub ftp_put_attempts: u8,
    /// Fixed delay between put attempts (milliseconds)
    pub ftp_put_retry_delay_ms: u32,

    // --- OTA ---
    /// Base URL of the update server, without trailing slash
    pub ota_base_url: String,
    pub ota_port: u16,
    /// Bytes requested per `AT+HTTPREAD`
    pub ota_chunk_size: u32,
    /// Download/apply attempts per update check
    pub ota_max_attempts: u8,
    /// Fixed delay between update attempts (milliseconds)
    pub ota_retry_delay_ms: u32,

    // --- Timing ---
    /// Main loop tick (milliseconds)
    pub loop_interval_ms: u32,
    pub photo_interval_secs: u32,
    pub report_interval_secs: u32,
    pub ota_check_interval_secs: u32,
    /// Modem storage clean-up interval (seconds)
    pub storage_clear_interval_secs: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Identity
            device_name: "sanwildsmartcam04".into(),
            utc_offset_secs: 2 * 3600, // UTC+2

            // Modem
            modem_baud: 115_200,
            network_mode: 38,
            storage_dir: "C:".into(),

            // FTP
            ftp_server: "ftp.example.com".into(),
            ftp_port: 21,
            ftp_user: "smartcam".into(),
            ftp_password: String::new(),
            ftp_put_attempts: 3,
            ftp_put_retry_delay_ms: 2_000,

            // OTA
            ota_base_url: "http://13.246.234.82".into(),
            ota_port: 80,
            ota_chunk_size: 1024,
            ota_max_attempts: 5,
            ota_retry_delay_ms: 10_000,

            // Timing
            loop_interval_ms: 1000,
            photo_interval_secs: 300,         // 5 min
            report_interval_secs: 86_400,     // daily
            ota_check_interval_secs: 21_600,  // 6 h
            storage_clear_interval_secs: 43_200, // 12 h
        }
    }
}

impl SystemConfig {
    /// Parse a (possibly partial) JSON document; missing fields keep their
    /// defaults.  The result is validated.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(text).map_err(|_| ConfigError::Corrupted)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load the JSON override file at `path`.
    pub fn load_overrides(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_json(&text)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("parsing {}", path.display()))
    }

    /// URL of the small text document holding the published version token.
    pub fn version_url(&self) -> String {
        format!(
            "{}:{}/{}-version.txt",
            self.ota_base_url, self.ota_port, self.device_name
        )
    }

    /// URL of the firmware binary.
    pub fn firmware_url(&self) -> String {
        format!(
            "{}:{}/{}-firmware.bin",
            self.ota_base_url, self.ota_port, self.device_name
        )
    }

    /// Range-check every field.  Strings that end up inside quoted AT
    /// arguments must not contain quotes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_name.is_empty()
            || self.device_name.len() > 32
            || !is_quotable(&self.device_name)
            || self.device_name.contains(['/', ' '])
        {
            return Err(ConfigError::ValidationFailed(
                "device_name must be 1-32 printable characters without quotes, spaces or '/'",
            ));
        }
        if !(-14 * 3600..=14 * 3600).contains(&self.utc_offset_secs) {
            return Err(ConfigError::ValidationFailed(
                "utc_offset_secs must be within ±14 h",
            ));
        }
        if !matches!(self.modem_baud, 9600 | 19_200 | 38_400 | 57_600 | 115_200 | 230_400 | 460_800 | 921_600) {
            return Err(ConfigError::ValidationFailed(
                "modem_baud must be a standard UART rate",
            ));
        }
        if self.storage_dir.is_empty() || !is_quotable(&self.storage_dir) {
            return Err(ConfigError::ValidationFailed(
                "storage_dir must be non-empty and quotable",
            ));
        }
        if self.ftp_server.is_empty() || !is_quotable(&self.ftp_server) {
            return Err(ConfigError::ValidationFailed(
                "ftp_server must be non-empty and quotable",
            ));
        }
        if !is_quotable(&self.ftp_user) || !is_quotable(&self.ftp_password) {
            return Err(ConfigError::ValidationFailed(
                "ftp credentials must be printable and contain no quotes",
            ));
        }
        if self.ftp_port == 0 || self.ota_port == 0 {
            return Err(ConfigError::ValidationFailed("ports must be non-zero"));
        }
        if !(1..=10).contains(&self.ftp_put_attempts) {
            return Err(ConfigError::ValidationFailed(
                "ftp_put_attempts must be 1-10",
            ));
        }
        if !self.ota_base_url.starts_with("http://") || !is_quotable(&self.ota_base_url) {
            return Err(ConfigError::ValidationFailed(
                "ota_base_url must be a quotable http:// URL",
            ));
        }
        if !(64..=4096).contains(&self.ota_chunk_size) {
            return Err(ConfigError::ValidationFailed(
                "ota_chunk_size must be 64-4096",
            ));
        }
        if !(1..=10).contains(&self.ota_max_attempts) {
            return Err(ConfigError::ValidationFailed(
                "ota_max_attempts must be 1-10",
            ));
        }
        if !(100..=10_000).contains(&self.loop_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "loop_interval_ms must be 100-10000",
            ));
        }
        if self.photo_interval_secs < 10
            || self.report_interval_secs < 60
            || self.ota_check_interval_secs < 60
            || self.storage_clear_interval_secs < 60
        {
            return Err(ConfigError::ValidationFailed(
                "schedule intervals are too short",
            ));
        }
        Ok(())
    }
}
