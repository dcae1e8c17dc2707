//! Shared validation helpers.
//!
//! Used by the config validator, the version parser and transfer-job
//! construction, all of which feed strings into quoted AT arguments.

/// Returns `true` if every byte of `s` is in the printable ASCII range
/// `0x20..=0x7E` (space through tilde, inclusive).
pub(crate) fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

/// Returns `true` if `s` can be embedded between double quotes in an AT
/// command: printable ASCII and no `"` of its own.
pub(crate) fn is_quotable(s: &str) -> bool {
    is_printable_ascii(s) && !s.contains('"')
}
