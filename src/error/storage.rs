//! This module contains errors raised by the provenance-tracking storage
//! primitives.

use thiserror::Error;

use crate::data::address::Address;

/// Errors that occur while reading from or writing to the stack, memory,
/// persistent storage, transient storage or balances of the replay
/// environment.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    #[error("Expected a value of {expected} bytes but got one of {actual} bytes")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("A stack frame at depth {depth} was requested but none was available")]
    NoSuchStackFrame { depth: usize },

    #[error("Maximum stack depth exceeded with request for {requested} frames")]
    StackDepthExceeded { requested: usize },

    #[error("No value is known for key 0x{key} at address {address}")]
    UnknownKey { address: Address, key: String },

    #[error("No storage is known for address {address}")]
    UnknownAddress { address: Address },

    #[error("Expected a 20 byte address but got {length} bytes")]
    InvalidAddress { length: usize },

    #[error("The value 0x{value} does not fit in a memory offset")]
    OffsetTooLarge { value: String },

    #[error("Memory of {requested} bytes exceeds the limit of {limit} bytes")]
    MemoryLimitExceeded { requested: usize, limit: usize },

    #[error("Byte group has {bytes} bytes but {provenance} provenance entries")]
    LengthMismatch { bytes: usize, provenance: usize },

    #[error("Range {offset}..{end} is out of bounds for a byte group of length {length}")]
    OutOfBounds {
        offset: usize,
        end:    usize,
        length: usize,
    },
}

/// The result type for operations on the storage primitives.
pub type Result<T> = std::result::Result<T, Error>;
