//! This module contains the primary error type for the library's interface.
//! It also re-exports the more specific error types that are
//! subsystem-specific.

pub mod container;
pub mod replay;
pub mod storage;
pub mod trace;

use thiserror::Error;

/// The interface result type for the library.
///
/// # Usage
///
/// Any function considered to be part of the public interface of the library
/// should return this result type. Subsystems should return the more-specific
/// child error types as appropriate.
pub type Result<T> = std::result::Result<T, Error>;

/// The interface error type for the library.
///
/// All errors returned from the library interface (and hence encountered by the
/// clients of the library) should be members of this enum.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    /// Errors from replaying the steps of a trace, located at the step that
    /// failed.
    #[error(transparent)]
    Replay(#[from] replay::LocatedError),

    /// Errors from reading a recorded trace.
    #[error(transparent)]
    Trace(#[from] trace::Error),

    /// An unknown error, represented as a string.
    #[error("Unknown Error: {_0:?}")]
    Other(String),
}

impl Error {
    /// Constructs an unknown error with the provided `message`.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Gets the step of the trace at which the error occurred, if it occurred
    /// during the replay.
    #[must_use]
    pub fn step_index(&self) -> Option<crate::data::StepIndex> {
        match self {
            Self::Replay(located) => Some(located.location),
            _ => None,
        }
    }
}
