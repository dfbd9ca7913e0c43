//! This module contains errors pertaining to reading recorded traces.

use thiserror::Error;

/// Errors encountered while turning raw trace lines into
/// [`crate::trace::TraceEvent`]s.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    #[error("Line {line} is not a valid trace event: {message}")]
    InvalidEvent { line: usize, message: String },

    #[error("`{_0}` is not valid hex")]
    InvalidHex(String),

    #[error("`{_0}` is not a known opcode mnemonic")]
    UnknownOpcodeName(String),

    #[error("Could not read the trace: {_0}")]
    Io(String),
}

/// The result type for trace loading.
pub type Result<T> = std::result::Result<T, Error>;
