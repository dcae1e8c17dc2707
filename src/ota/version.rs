//! Firmware version token.
//!
//! The update server publishes a fixed-width, 6-character token such as
//! `v1.2.3`.  Tokens are compared by exact equality and never parsed as
//! numbers: any difference from the installed version means "update".

use core::fmt;

use serde::{Deserialize, Serialize};

/// Width of every version token.
pub const VERSION_LEN: usize = 6;

/// Version of the image this binary was built as.
pub const RUNNING_VERSION: &str = "v1.0.0";

/// A validated 6-character printable ASCII version token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version(heapless::String<VERSION_LEN>);

/// Why a candidate token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionError {
    WrongLength(usize),
    NotPrintable,
}

impl fmt::Display for VersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongLength(n) => write!(f, "version must be {VERSION_LEN} bytes, got {n}"),
            Self::NotPrintable => write!(f, "version contains non-printable bytes"),
        }
    }
}

impl Version {
    /// Validate a token taken from text.
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        if s.len() != VERSION_LEN {
            return Err(VersionError::WrongLength(s.len()));
        }
        if !crate::util::is_printable_ascii(s) || s.contains(' ') {
            return Err(VersionError::NotPrintable);
        }
        let mut token = heapless::String::new();
        token
            .push_str(s)
            .map_err(|()| VersionError::WrongLength(s.len()))?;
        Ok(Self(token))
    }

    /// Take the token from the first [`VERSION_LEN`] bytes of a response body.
    /// Anything after the token (newline, NUL padding, trailer) is ignored.
    pub fn from_body(body: &[u8]) -> Result<Self, VersionError> {
        let head = body
            .get(..VERSION_LEN)
            .ok_or(VersionError::WrongLength(body.len()))?;
        let text = core::str::from_utf8(head).map_err(|_| VersionError::NotPrintable)?;
        Self::parse(text)
    }

    /// Version of the running image, used on first boot.
    pub fn running() -> Self {
        let mut token = heapless::String::new();
        // RUNNING_VERSION is exactly VERSION_LEN bytes.
        let _ = token.push_str(RUNNING_VERSION);
        Self(token)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Version {
    type Error = VersionError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Version> for String {
    fn from(v: Version) -> Self {
        v.as_str().into()
    }
}
