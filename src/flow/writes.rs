//! This module contains the record of what an instruction changes in the
//! environment.

use crate::data::{Address, ByteGroup, Word};

/// A write of `value` into memory at `offset`.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct MemoryWrite {
    pub offset: usize,
    pub value:  ByteGroup,
}

/// An expansion of memory to cover `offset..offset + size`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct MemoryExpansion {
    pub offset: usize,
    pub size:   usize,
}

/// A write of `value` into the slot `key` of `address`.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct StorageWrite {
    pub address: Address,
    pub key:     Word,
    pub value:   ByteGroup,
}

/// The changes an instruction makes to the environment.
///
/// They are committed as a unit after the instruction has been parsed. Stack
/// pops are applied first, then stack sets, then stack pushes. Memory
/// expansions are applied before memory writes. Balance modifications are
/// committed separately, once the call context transition for the step has
/// been made.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct StorageWrites {
    /// The number of items popped off the stack.
    pub stack_pops: usize,

    /// Stack items replaced in place, indexed from the top of the stack.
    pub stack_sets: Vec<(usize, ByteGroup)>,

    /// Items pushed onto the stack, in order.
    pub stack_pushes: Vec<ByteGroup>,

    /// Expansions of the current frame's memory.
    pub memory_expansions: Vec<MemoryExpansion>,

    /// Writes into the current frame's memory.
    pub memory: Vec<MemoryWrite>,

    /// The data returned by the current call context, if the instruction
    /// sets it.
    pub return_data: Option<ByteGroup>,

    /// The data made available to `RETURNDATACOPY` in the current frame by a
    /// call that entered no sub-context, as far as it was copied into the
    /// caller's memory.
    pub sub_context_return_data: Option<ByteGroup>,

    /// Writes into persistent storage.
    pub persistent_storage: Vec<StorageWrite>,

    /// Writes into transient storage.
    pub transient_storage: Vec<StorageWrite>,

    /// Accounts whose balance the instruction changes.
    pub balance_modifications: Vec<Address>,
}

impl StorageWrites {
    /// Creates a set of writes that changes nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks if committing the writes would leave the environment unchanged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
