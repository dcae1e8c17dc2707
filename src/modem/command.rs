//! AT command vocabulary.
//!
//! Every command is a `(text, expected_token, timeout)` triple.  The
//! constructors below cover the SIM7600 subset the firmware uses; string
//! arguments are assumed to have been validated as quotable by the caller
//! (config validation, [`TransferJob`](super::staging::TransferJob)).

use core::fmt;

/// A single AT command line and the reply token that completes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    text: String,
    expected: &'static str,
    timeout_ms: u32,
    secret: bool,
}

impl Command {
    pub fn new(text: impl Into<String>, expected: &'static str, timeout_ms: u32) -> Self {
        Self {
            text: text.into(),
            expected,
            timeout_ms,
            secret: false,
        }
    }

    /// Mark the arguments as confidential; [`Display`](fmt::Display) then
    /// prints only the command name.
    pub fn secret(mut self) -> Self {
        self.secret = true;
        self
    }

    /// Command text without the trailing `\r`.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn expected(&self) -> &'static str {
        self.expected
    }

    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.text.split_once('=') {
            Some((name, _)) if self.secret => write!(f, "{name}=<redacted>"),
            _ => f.write_str(&self.text),
        }
    }
}

// ── Timeouts ──────────────────────────────────────────────────

const SHORT_MS: u32 = 5_000;
const GENERAL_MS: u32 = 10_000;
const LOGIN_MS: u32 = 30_000;
const NETWORK_MS: u32 = 60_000;
const PUT_MS: u32 = 120_000;

// ── Reply tokens ──────────────────────────────────────────────

pub const OK: &str = "OK";
pub const DATA_PROMPT: &str = ">";
pub const FTP_START: &str = "+CFTPSSTART:";
pub const FTP_STOP: &str = "+CFTPSSTOP:";
pub const FTP_LOGIN: &str = "+CFTPSLOGIN:";
pub const FTP_LOGOUT: &str = "+CFTPSLOGOUT:";
pub const FTP_PUT: &str = "+CFTPSPUTFILE:";
pub const HTTP_ACTION: &str = "+HTTPACTION:";
pub const HTTP_READ: &str = "+HTTPREAD:";
/// Suffix line closing the raw data of one `AT+HTTPREAD`.
pub const HTTP_READ_END: &str = "+HTTPREAD: 0";
pub const FS_LIST: &str = "+FSLS:";
pub const SIGNAL: &str = "+CSQ:";
pub const CLOCK: &str = "+CCLK:";

// ── General ───────────────────────────────────────────────────

/// Readiness probe.
pub fn probe() -> Command {
    Command::new("AT", OK, 1_000)
}

pub fn echo_off() -> Command {
    Command::new("ATE0", OK, SHORT_MS)
}

pub fn network_mode(mode: u8) -> Command {
    Command::new(format!("AT+CNMP={mode}"), OK, GENERAL_MS)
}

/// Serial number (IMEI) query; the number precedes the final `OK`.
pub fn imei() -> Command {
    Command::new("AT+CGSN", OK, GENERAL_MS)
}

pub fn signal_quality() -> Command {
    Command::new("AT+CSQ", OK, SHORT_MS)
}

/// Network-provided local time (`+CCLK: "yy/MM/dd,hh:mm:ss±zz"`).
pub fn network_clock() -> Command {
    Command::new("AT+CCLK?", OK, SHORT_MS)
}

// ── Modem file system ─────────────────────────────────────────

pub fn change_dir(dir: &str) -> Command {
    Command::new(format!("AT+FSCD={dir}"), OK, SHORT_MS)
}

/// Lists the current directory; the listing precedes the final `OK`.
pub fn list_dir() -> Command {
    Command::new("AT+FSLS", OK, GENERAL_MS)
}

pub fn delete_all() -> Command {
    Command::new("AT+FSDEL=\"*.*\"", OK, GENERAL_MS)
}

/// Announce a raw upload of `len` bytes into `path`; the modem answers
/// with the `>` data prompt.
pub fn receive_file(path: &str, len: u32) -> Command {
    Command::new(format!("AT+CFTRANRX=\"{path}\",{len}"), DATA_PROMPT, GENERAL_MS)
}

// ── FTP(S) service ────────────────────────────────────────────

pub fn ftp_start() -> Command {
    Command::new("AT+CFTPSSTART", FTP_START, GENERAL_MS)
}

pub fn ftp_stop() -> Command {
    Command::new("AT+CFTPSSTOP", FTP_STOP, GENERAL_MS)
}

/// Plain FTP login (server type 0).
pub fn ftp_login(server: &str, port: u16, user: &str, password: &str) -> Command {
    Command::new(
        format!("AT+CFTPSLOGIN=\"{server}\",{port},\"{user}\",\"{password}\",0"),
        FTP_LOGIN,
        LOGIN_MS,
    )
    .secret()
}

pub fn ftp_logout() -> Command {
    Command::new("AT+CFTPSLOGOUT", FTP_LOGOUT, GENERAL_MS)
}

/// Transfer type: `I` (binary) or `A` (ASCII).
pub fn ftp_type(kind: char) -> Command {
    Command::new(format!("AT+CFTPSTYPE={kind}"), OK, SHORT_MS)
}

/// Push a staged file from modem storage.  `dir` selects the local
/// directory (1 = `C:`).
pub fn ftp_put(name: &str, dir: u8) -> Command {
    Command::new(format!("AT+CFTPSPUTFILE=\"{name}\",{dir}"), FTP_PUT, PUT_MS)
}

// ── HTTP(S) service ───────────────────────────────────────────

pub fn http_init() -> Command {
    Command::new("AT+HTTPINIT", OK, GENERAL_MS)
}

pub fn http_term() -> Command {
    Command::new("AT+HTTPTERM", OK, SHORT_MS)
}

pub fn http_url(url: &str) -> Command {
    Command::new(format!("AT+HTTPPARA=\"URL\",\"{url}\""), OK, SHORT_MS)
}

/// GET the configured URL; completes with `+HTTPACTION: 0,<status>,<len>`.
pub fn http_get() -> Command {
    Command::new("AT+HTTPACTION=0", HTTP_ACTION, NETWORK_MS)
}

/// Read `len` body bytes starting at `offset`; completes with the
/// `+HTTPREAD: <n>` header that precedes the raw data.
pub fn http_read(offset: u32, len: u32) -> Command {
    Command::new(format!("AT+HTTPREAD={offset},{len}"), HTTP_READ, GENERAL_MS)
}
