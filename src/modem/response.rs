//! Captured replies and the field tokenizer.
//!
//! Modem replies are parsed by header and field, never by character
//! offset: a `+NAME: a,"b",c` line is split on commas, unquoted, and its
//! field count checked before any value is used.  Every shape mismatch is a
//! [`TransactionError::Protocol`].

use core::str::FromStr;

use log::warn;

use crate::error::TransactionError;

/// Every line read during one transaction, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    lines: Vec<String>,
}

impl Response {
    pub(crate) fn push(&mut self, line: String) {
        self.lines.push(line);
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The last line captured (the one that ended the transaction).
    pub fn last(&self) -> Option<&str> {
        self.lines.last().map(String::as_str)
    }

    /// First line that starts with `header`.
    pub fn find(&self, header: &str) -> Option<&str> {
        self.lines
            .iter()
            .map(|l| l.trim())
            .find(|l| l.starts_with(header))
    }

    /// All lines joined with `\n`.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

// ── Tokenizer ─────────────────────────────────────────────────

/// Split the fields of a `header value,value,...` line.
pub fn fields<'a>(line: &'a str, header: &str) -> Result<Vec<&'a str>, TransactionError> {
    let rest = line
        .trim()
        .strip_prefix(header)
        .ok_or_else(|| malformed(line, header))?
        .trim();
    if rest.is_empty() {
        return Err(malformed(line, header));
    }
    Ok(rest.split(',').map(|f| unquote(f.trim())).collect())
}

/// Like [`fields`], but the line must carry exactly `N` fields.
pub fn exact_fields<'a, const N: usize>(
    line: &'a str,
    header: &str,
) -> Result<[&'a str; N], TransactionError> {
    fields(line, header)?
        .try_into()
        .map_err(|_| malformed(line, header))
}

/// Parse one numeric field.
pub fn number<T: FromStr>(field: &str) -> Result<T, TransactionError> {
    field.parse().map_err(|_| {
        warn!("modem: expected a number, got {:?}", field);
        TransactionError::Protocol
    })
}

fn unquote(field: &str) -> &str {
    field
        .strip_prefix('"')
        .and_then(|f| f.strip_suffix('"'))
        .unwrap_or(field)
}

fn malformed(line: &str, header: &str) -> TransactionError {
    warn!("modem: malformed {} reply: {:?}", header, line);
    TransactionError::Protocol
}

// ── Reply shapes ──────────────────────────────────────────────

/// Result code of an asynchronous service reply such as `+CFTPSSTART: 0`.
pub fn result_code(response: &Response, header: &str) -> Result<u16, TransactionError> {
    let line = response.find(header).ok_or_else(|| {
        warn!("modem: no {} line in reply", header);
        TransactionError::Protocol
    })?;
    let [code] = exact_fields::<1>(line, header)?;
    number(code)
}

/// `+HTTPACTION: <method>,<status>,<length>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpAction {
    pub method: u8,
    pub status: u16,
    pub length: u32,
}

pub fn http_action(response: &Response) -> Result<HttpAction, TransactionError> {
    let header = super::command::HTTP_ACTION;
    let line = response.find(header).ok_or(TransactionError::Protocol)?;
    let [method, status, length] = exact_fields::<3>(line, header)?;
    Ok(HttpAction {
        method: number(method)?,
        status: number(status)?,
        length: number(length)?,
    })
}

/// Payload length announced by a `+HTTPREAD: <n>` (or `+HTTPREAD: DATA,<n>`)
/// header line.
pub fn http_read_len(line: &str) -> Result<u32, TransactionError> {
    let header = super::command::HTTP_READ;
    match fields(line, header)?.as_slice() {
        [len] | ["DATA", len] => number(len),
        _ => Err(malformed(line, header)),
    }
}

/// The 15-digit IMEI line of an `AT+CGSN` reply.
pub fn imei(response: &Response) -> Result<heapless::String<15>, TransactionError> {
    let line = response
        .lines()
        .iter()
        .map(|l| l.trim())
        .find(|l| l.len() == 15 && l.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| {
            warn!("modem: no IMEI in reply {:?}", response.text());
            TransactionError::Protocol
        })?;
    let mut out = heapless::String::new();
    out.push_str(line).map_err(|()| TransactionError::Protocol)?;
    Ok(out)
}

/// RSSI index of a `+CSQ: <rssi>,<ber>` reply; `None` when the modem
/// reports 99 (not known).
pub fn signal(response: &Response) -> Result<Option<u8>, TransactionError> {
    let header = super::command::SIGNAL;
    let line = response.find(header).ok_or(TransactionError::Protocol)?;
    let [rssi, _ber] = exact_fields::<2>(line, header)?;
    let rssi: u8 = number(rssi)?;
    Ok((rssi != 99).then_some(rssi))
}

/// Unix time from a `+CCLK: "yy/MM/dd,hh:mm:ss±zz"` reply.  The zone is
/// in quarter hours and is removed, so the result is UTC.
pub fn network_time(response: &Response) -> Result<i64, TransactionError> {
    let header = super::command::CLOCK;
    let line = response.find(header).ok_or(TransactionError::Protocol)?;
    let value = line
        .trim()
        .strip_prefix(header)
        .map(|v| v.trim().trim_matches('"'))
        .ok_or_else(|| malformed(line, header))?;
    let (stamp, zone) = value
        .split_at_checked(17)
        .ok_or_else(|| malformed(line, header))?;
    let local = chrono::NaiveDateTime::parse_from_str(stamp, "%y/%m/%d,%H:%M:%S")
        .map_err(|_| malformed(line, header))?;
    let quarters: i64 = number(zone.trim_start_matches('+'))?;
    Ok(local.and_utc().timestamp() - quarters * 15 * 60)
}

/// File names from an `AT+FSLS` listing (entries after `+FSLS: FILES:`).
pub fn file_listing(response: &Response) -> Vec<String> {
    let mut in_files = false;
    let mut names = Vec::new();
    for line in response.lines().iter().map(|l| l.trim()) {
        if let Some(section) = line.strip_prefix(super::command::FS_LIST) {
            in_files = section.trim() == "FILES:";
            continue;
        }
        if line == "OK" || line.is_empty() || line.starts_with("AT") {
            continue;
        }
        if in_files {
            names.push(line.to_owned());
        }
    }
    names
}
