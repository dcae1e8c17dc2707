//! Daily status report and upload file names.
//!
//! The report is a short `Key:Value` text file, one pair per line, in the
//! order the server-side parser expects:
//!
//! ```text
//! IMEI:861234567890123
//! CSQ:17
//! CamID:sanwildsmartcam04
//! Temp:9C
//! Date:16/10/2026 14:05:09
//! Bat:100%
//! SD:812/29819M
//! Total:288
//! Send:285
//! GPS:
//! ```

use core::fmt::Write as _;

use chrono::{DateTime, FixedOffset, Offset, Utc};

const STAMP_FORMAT: &str = "%d%m%Y%H%M%S";
const DATE_FORMAT: &str = "%d/%m/%Y %H:%M:%S";
const UNKNOWN: &str = "NA";

/// SD card usage in MiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdUsage {
    pub used_mb: u64,
    pub total_mb: u64,
}

/// Readings from collaborators outside the modem (sensors, SD card, GPS).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    pub temperature_c: Option<i16>,
    pub battery_pct: Option<u8>,
    pub sd: Option<SdUsage>,
    pub gps: Option<String>,
}

/// Everything a report line is built from.  Readings that are not
/// available are rendered as `NA`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportInputs {
    pub imei: Option<String>,
    pub signal: Option<u8>,
    pub env: Environment,
    pub pictures_taken: u32,
    pub pictures_sent: u32,
}

/// Local time used in names and report dates.
#[derive(Debug, Clone, Copy)]
pub struct LocalTime(DateTime<FixedOffset>);

impl LocalTime {
    /// `unix_secs` shifted by `utc_offset_secs`.  Out-of-range inputs fall
    /// back to the epoch in UTC.
    pub fn new(unix_secs: i64, utc_offset_secs: i32) -> Self {
        let utc = DateTime::<Utc>::from_timestamp(unix_secs, 0).unwrap_or_default();
        let offset = FixedOffset::east_opt(utc_offset_secs).unwrap_or_else(|| Utc.fix());
        Self(utc.with_timezone(&offset))
    }

    /// `ddmmyyyyHHMMSS`
    pub fn stamp(&self) -> String {
        self.0.format(STAMP_FORMAT).to_string()
    }

    /// `dd/mm/yyyy HH:MM:SS`
    pub fn date(&self) -> String {
        self.0.format(DATE_FORMAT).to_string()
    }
}

/// `<device>-<ddmmyyyyHHMMSS>.jpg`
pub fn photo_name(device: &str, at: LocalTime) -> String {
    format!("{device}-{}.jpg", at.stamp())
}

/// `<ddmmyyyyHHMMSS>-<device>-DailyReport.txt`
pub fn report_name(device: &str, at: LocalTime) -> String {
    format!("{}-{device}-DailyReport.txt", at.stamp())
}

/// Render the report body.
pub fn render(device: &str, at: LocalTime, inputs: &ReportInputs) -> String {
    let env = &inputs.env;
    let sd = env.sd.map_or_else(
        || UNKNOWN.to_owned(),
        |sd| format!("{}/{}M", sd.used_mb, sd.total_mb),
    );
    let mut out = String::with_capacity(256);
    let _ = writeln!(out, "IMEI:{}", inputs.imei.as_deref().unwrap_or(UNKNOWN));
    let _ = writeln!(out, "CSQ:{}", reading(inputs.signal, ""));
    let _ = writeln!(out, "CamID:{device}");
    let _ = writeln!(out, "Temp:{}", reading(env.temperature_c, "C"));
    let _ = writeln!(out, "Date:{}", at.date());
    let _ = writeln!(out, "Bat:{}", reading(env.battery_pct, "%"));
    let _ = writeln!(out, "SD:{sd}");
    let _ = writeln!(out, "Total:{}", inputs.pictures_taken);
    let _ = writeln!(out, "Send:{}", inputs.pictures_sent);
    let _ = writeln!(out, "GPS:{}", env.gps.as_deref().unwrap_or(""));
    out
}

fn reading<T: core::fmt::Display>(v: Option<T>, unit: &str) -> String {
    v.map_or_else(|| UNKNOWN.to_owned(), |v| format!("{v}{unit}"))
}
