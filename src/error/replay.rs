//! This module contains errors pertaining to the replay of a trace.
//!
//! None of these are recoverable. Each one signals either a gap in the model
//! of the EVM or a trace that is malformed, and the replay is aborted.

use thiserror::Error;

use crate::{
    data::byte_group::StepIndex,
    error::{container, storage},
};

/// Errors that occur while replaying the steps of a trace with the
/// [`crate::vm::Tracer`].
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    #[error("{opcode} halts the call context at depth {depth} but the next step stays there")]
    ExpectedDepthChange { opcode: String, depth: u32 },

    #[error("{opcode} at depth {depth} cannot be followed by a step at depth {next_depth}")]
    UnexpectedDepthChange {
        opcode:     String,
        depth:      u32,
        next_depth: u32,
    },

    #[error("The trace records depth {recorded} but the replay is at depth {replayed}")]
    DepthOutOfSync { recorded: u32, replayed: u32 },

    #[error("Replayed stack does not match the trace: {message}")]
    StackMismatch { message: String },

    #[error("Replayed memory does not match the trace: {message}")]
    MemoryMismatch { message: String },

    #[error("The flow node `{node}` was used as a value but produces none")]
    NodeHasNoResult { node: String },

    #[error("The trace has no stack item at depth {index} for the next step")]
    MissingOracleValue { index: usize },

    #[error("The trace has no memory recorded for the next step")]
    MissingOracleMemory,

    #[error("No call frame is active")]
    NoSuchFrame,

    #[error("A return was observed for a frame that was not entered by a call")]
    NoEnteringCall,

    #[error("Replay was stopped by the watchdog after step {step}")]
    StoppedByWatchdog { step: StepIndex },

    #[error(transparent)]
    Storage(#[from] storage::Error),
}

/// A replay error with an associated trace step.
pub type LocatedError = container::Located<Error>;

/// The result type for methods that may have replay errors.
pub type Result<T> = std::result::Result<T, LocatedError>;

/// Make it possible to attach locations to these errors.
impl container::Locatable for Error {
    type Located = LocatedError;

    fn locate(self, step_index: StepIndex) -> Self::Located {
        container::Located {
            location: step_index,
            payload:  self,
        }
    }
}
