//! This module contains the recorded ground truth that the replay consults
//! and checks itself against.

use crate::{
    data::{ByteGroup, StepIndex, Word},
    trace::TraceEvent,
};

/// The state recorded for the step that follows the one being replayed.
///
/// It resolves values that cannot be derived without executing the EVM (such
/// as the result of an `ADD`), and is what the replay is verified against.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct InstructionOutputOracle {
    /// The recorded stack, bottom first.
    pub stack: Vec<Word>,

    /// The recorded memory, if the trace contains it.
    pub memory: Option<Vec<u8>>,

    /// The call depth of the next step, which is [`None`] only after the last
    /// step of the trace.
    pub depth: Option<u32>,
}

impl InstructionOutputOracle {
    /// Creates the oracle describing the state at `event`.
    #[must_use]
    pub fn from_event(event: &TraceEvent) -> Self {
        Self {
            stack:  event.stack.clone(),
            memory: event.memory.clone(),
            depth:  Some(event.depth),
        }
    }

    /// Creates the oracle for the step after `event`, which is the last step
    /// of its trace.
    ///
    /// The stack and memory are left as recorded at `event`, as nothing is
    /// recorded after it.
    #[must_use]
    pub fn after_last(event: &TraceEvent) -> Self {
        Self {
            depth: None,
            ..Self::from_event(event)
        }
    }

    /// Gets the stack item `index` items below the top of the stack.
    #[must_use]
    pub fn stack_peek(&self, index: usize) -> Option<&Word> {
        self.stack.len().checked_sub(index + 1).map(|i| &self.stack[i])
    }

    /// Reads `size` bytes of the recorded memory at `offset`, zero-padding past
    /// its end, and attributing every byte to `step_index`.
    ///
    /// Returns [`None`] if no memory was recorded.
    #[must_use]
    pub fn memory_range(
        &self,
        offset: usize,
        size: usize,
        step_index: StepIndex,
    ) -> Option<ByteGroup> {
        let memory = self.memory.as_ref()?;
        let start = offset.min(memory.len());
        let end = offset.saturating_add(size).min(memory.len());
        let mut bytes = memory[start..end].to_vec();
        bytes.resize(size, 0);

        Some(ByteGroup::from_bytes(bytes, step_index))
    }
}
