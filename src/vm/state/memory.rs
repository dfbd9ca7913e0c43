//! This module contains the definition of the replay's memory.

use crate::{
    constant::WORD_SIZE_BYTES,
    data::{ByteGroup, StepIndex},
    error::storage::{Error, Result},
};

/// A representation of the transient memory of a single call frame.
///
/// As on a real EVM, memory is a byte array that grows in word-sized
/// increments as it is touched. Each byte additionally records the step that
/// wrote it, and the zero bytes that appear through expansion are attributed
/// to the step that caused the expansion.
///
/// # Invariants
///
/// The size of memory is always a multiple of 32 bytes, and memory never
/// shrinks.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Memory {
    data:  ByteGroup,
    limit: usize,
}

impl Memory {
    /// Constructs a new memory container that can grow to at most `limit`
    /// bytes.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        let data = ByteGroup::new();
        Self { data, limit }
    }

    /// Reads `size` bytes starting at `offset`.
    ///
    /// Bytes past the current end of memory read as zeroes attributed to
    /// `step_index`. Reading never changes the memory itself; callers that
    /// need EVM expansion semantics must call [`Self::check_expansion`].
    #[must_use]
    pub fn get(&self, offset: usize, size: usize, step_index: StepIndex) -> ByteGroup {
        let end = offset.saturating_add(size);
        let mut value = self.data.slice(offset..end);
        if value.len() < size {
            value.extend(&ByteGroup::zeroes(size - value.len(), step_index));
        }
        value
    }

    /// Expands memory so that it covers `offset..offset + size`, attributing
    /// any new zero bytes to `step_index`.
    ///
    /// Accesses of size zero never expand memory.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the expansion would exceed the memory limit.
    pub fn check_expansion(
        &mut self,
        offset: usize,
        size: usize,
        step_index: StepIndex,
    ) -> Result<()> {
        if size == 0 {
            return Ok(());
        }

        let end = offset.checked_add(size).ok_or(Error::MemoryLimitExceeded {
            requested: usize::MAX,
            limit:     self.limit,
        })?;
        if end <= self.data.len() {
            return Ok(());
        }

        let new_size = end.div_ceil(WORD_SIZE_BYTES) * WORD_SIZE_BYTES;
        if new_size > self.limit {
            return Err(Error::MemoryLimitExceeded {
                requested: new_size,
                limit:     self.limit,
            });
        }

        let expansion = ByteGroup::zeroes(new_size - self.data.len(), step_index);
        self.data.extend(&expansion);

        Ok(())
    }

    /// Writes `value` into memory at `offset`, expanding memory first where
    /// necessary.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the expansion would exceed the memory limit.
    pub fn set(&mut self, offset: usize, value: &ByteGroup, step_index: StepIndex) -> Result<()> {
        self.check_expansion(offset, value.len(), step_index)?;
        if value.is_empty() {
            return Ok(());
        }
        self.data.splice(offset, value)
    }

    /// Gets the size of memory in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Checks if memory has never been touched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Gets the size in bytes that memory may never grow beyond.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Gets the entire contents of memory.
    #[must_use]
    pub fn data(&self) -> &ByteGroup {
        &self.data
    }
}

#[cfg(test)]
mod test {
    use crate::{
        constant::{DEFAULT_MEMORY_LIMIT_BYTES, PRESTATE},
        data::ByteGroup,
        error::storage::Error,
        vm::state::memory::Memory,
    };

    fn new_memory() -> Memory {
        Memory::new(DEFAULT_MEMORY_LIMIT_BYTES)
    }

    #[test]
    fn can_construct_new_memory() {
        let memory = new_memory();
        assert!(memory.is_empty());
        assert_eq!(memory.size(), 0);
    }

    #[test]
    fn reading_past_the_end_pads_without_expanding() {
        let memory = new_memory();
        let value = memory.get(10, 4, 3);

        assert_eq!(value.bytes(), &[0; 4]);
        assert_eq!(value.provenance(), &[3; 4]);
        assert_eq!(memory.size(), 0);
    }

    #[test]
    fn expansion_is_word_aligned_and_idempotent() -> anyhow::Result<()> {
        let mut memory = new_memory();
        memory.check_expansion(33, 1, 5)?;
        assert_eq!(memory.size(), 64);
        assert_eq!(memory.data().provenance(), &[5; 64]);

        memory.check_expansion(33, 1, 6)?;
        assert_eq!(memory.size(), 64);
        assert_eq!(memory.data().provenance(), &[5; 64]);

        Ok(())
    }

    #[test]
    fn zero_sized_accesses_do_not_expand() -> anyhow::Result<()> {
        let mut memory = new_memory();
        memory.check_expansion(1_000, 0, 1)?;
        assert!(memory.is_empty());

        Ok(())
    }

    #[test]
    fn can_write_and_read_back() -> anyhow::Result<()> {
        let mut memory = new_memory();
        memory.set(30, &ByteGroup::from_bytes(vec![0xaa, 0xbb, 0xcc], 9), 2)?;

        assert_eq!(memory.size(), 64);
        let value = memory.get(29, 5, 4);
        assert_eq!(value.hex(), "00aabbcc00");
        assert_eq!(value.provenance(), &[2, 9, 9, 9, 2]);

        Ok(())
    }

    #[test]
    fn never_shrinks() -> anyhow::Result<()> {
        let mut memory = new_memory();
        memory.check_expansion(0, 96, PRESTATE)?;
        memory.set(0, &ByteGroup::from_bytes(vec![1], 0), 0)?;

        assert_eq!(memory.size(), 96);

        Ok(())
    }

    #[test]
    fn refuses_to_exceed_the_limit() {
        let mut memory = Memory::new(64);
        let result = memory.check_expansion(64, 1, 0);

        assert_eq!(
            result,
            Err(Error::MemoryLimitExceeded {
                requested: 96,
                limit:     64,
            })
        );
    }
}
