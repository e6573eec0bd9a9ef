// ABOUTME: Crate-wide error type for bus I/O, framing, and register decode failures
// ABOUTME: thiserror-derived, io::Error wrapped via #[from]

use std::io;
use thiserror::Error;

/// Errors produced anywhere in the bus/frame/register/monitor stack.
///
/// Transport faults (`Io`, `ConnectionClosed`) are non-fatal to a running
/// monitor: the receive loop catches them at the loop boundary and
/// reconnects after a backoff. `Decode` errors are likewise non-fatal and
/// are recorded to the change-log under an `ERROR` value so data collection
/// continues. `SchemaError`/`UnknownScheme`/`InvalidAddress` are
/// configuration-time errors, fatal at startup.
#[derive(Debug, Error)]
pub enum FinitudeError {
    /// I/O error during stream open/read/write.
    #[error("stream I/O error: {0}")]
    Io(#[from] io::Error),

    /// The remote end closed the connection cleanly mid-frame or at a
    /// frame boundary; the monitor reconnects.
    #[error("connection closed")]
    ConnectionClosed,

    /// A register's payload was shorter than its schema requires, or a
    /// schema invariant was violated while decoding.
    #[error("error decoding register {register}: {reason}")]
    Decode { register: String, reason: String },

    /// `StreamFactory`-equivalent was given a URI with an unrecognized
    /// scheme.
    #[error("unknown stream scheme in {0:?}")]
    UnknownScheme(String),

    /// A 4-hex-digit bus address string did not parse.
    #[error("invalid bus address {0:?}")]
    InvalidAddress(String),

    /// Duplicate field name or malformed descriptor list in a register
    /// schema entry; this is a bug in the static schema table, not
    /// something a frame on the wire can trigger.
    #[error("register schema error: {0}")]
    SchemaError(String),
}

/// A specialized `Result` type for finitude operations.
pub type Result<T> = std::result::Result<T, FinitudeError>;
