//! SIM7600 modem protocol stack.
//!
//! ```text
//!   ftp / http / device      workflows (retry policy lives here)
//!          │
//!       staging              length-declared raw upload into modem storage
//!          │
//!       engine               one command → token | ERROR | timeout
//!          │
//!   LineTransport port       serial adapter
//! ```

pub mod command;
pub mod device;
pub mod engine;
pub mod ftp;
pub mod http;
pub mod response;
pub mod staging;

#[cfg(test)]
pub(crate) mod script;

pub use command::Command;
pub use engine::AtEngine;
pub use response::Response;
pub use staging::{PayloadKind, TransferJob};
