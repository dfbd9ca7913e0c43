//! This module contains the implementation of the replay's stack.

use crate::{
    constant::{MAXIMUM_STACK_DEPTH, PRESTATE, WORD_SIZE_BYTES},
    data::{ByteGroup, StepIndex, Word},
    error::storage::{Error, Result},
};

/// The representation of the replayed stack of a single call frame.
///
/// # Indexing
///
/// Indexing into this stack is zero-based, where frame 0 is the top stack
/// frame.
///
/// # Word Size
///
/// Every item on the stack is a 32-byte [`ByteGroup`]. Shorter values are
/// padded when pushed, and [`Stack::set`] refuses anything that is not a full
/// word.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Stack {
    data:  Vec<ByteGroup>,
    limit: usize,
}

impl Stack {
    /// Creates a new stack without any items on it, that can hold at most
    /// [`MAXIMUM_STACK_DEPTH`] items.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(MAXIMUM_STACK_DEPTH)
    }

    /// Creates a new stack without any items on it, that can hold at most
    /// `limit` items.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        let data = Vec::new();
        Self { data, limit }
    }

    /// Pushes the provided value onto the top of the stack.
    ///
    /// Values shorter than a word are left-padded with zeroes attributed to the
    /// step that produced the value's leading byte, as the padding carries no
    /// information of its own.
    ///
    /// # Errors
    ///
    /// If the stack cannot grow to accommodate the requested `data`.
    pub fn push(&mut self, data: ByteGroup) -> Result<()> {
        if self.data.len() + 1 > self.limit {
            return Err(Error::StackDepthExceeded {
                requested: self.data.len() + 1,
            });
        }

        let padding_step = data.provenance().first().copied().unwrap_or(PRESTATE);
        self.data.push(data.to_size(WORD_SIZE_BYTES, padding_step));
        Ok(())
    }

    /// Pops the top value from the stack.
    ///
    /// # Errors
    ///
    /// If the stack has no item to pop.
    pub fn pop(&mut self) -> Result<ByteGroup> {
        self.data.pop().ok_or(Error::NoSuchStackFrame { depth: 0 })
    }

    /// Reads from the stack frame at the provided `depth`.
    ///
    /// # Errors
    ///
    /// If `depth` does not exist in the stack.
    pub fn peek(&self, depth: usize) -> Result<&ByteGroup> {
        let index = self.index_of(depth)?;
        Ok(&self.data[index])
    }

    /// Replaces the item at `depth` with `value`.
    ///
    /// The item is replaced intact. Partial overwrites of a stack item are not
    /// possible.
    ///
    /// # Errors
    ///
    /// If `depth` does not exist in the stack, or if `value` is not exactly one
    /// word long.
    pub fn set(&mut self, depth: usize, value: ByteGroup) -> Result<()> {
        if value.len() != WORD_SIZE_BYTES {
            return Err(Error::SizeMismatch {
                expected: WORD_SIZE_BYTES,
                actual:   value.len(),
            });
        }

        let index = self.index_of(depth)?;
        self.data[index] = value;
        Ok(())
    }

    /// Removes every item from the stack.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Replaces the entire contents of the stack with `words`, given bottom
    /// first, attributing every byte to `step_index`.
    ///
    /// # Errors
    ///
    /// If `words` exceeds the maximum stack depth.
    pub fn overwrite(&mut self, words: &[Word], step_index: StepIndex) -> Result<()> {
        self.clear();
        for word in words {
            self.push(ByteGroup::from_bytes(word.to_vec(), step_index))?;
        }

        Ok(())
    }

    /// Gets the items on the stack, bottom first.
    #[must_use]
    pub fn values(&self) -> &[ByteGroup] {
        &self.data
    }

    /// Gets the current size of the stack.
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Checks if the stack is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Gets the maximum number of items the stack can hold.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Converts a depth from the top of the stack into an index into the
    /// underlying storage.
    fn index_of(&self, depth: usize) -> Result<usize> {
        if depth >= self.data.len() {
            return Err(Error::NoSuchStackFrame { depth });
        }

        Ok(self.data.len() - 1 - depth)
    }
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use crate::{
        constant::MAXIMUM_STACK_DEPTH,
        data::ByteGroup,
        error::storage::Error,
        vm::state::stack::Stack,
    };

    /// Constructs a new stack with `item_count` single-byte items pushed onto
    /// it, where the item pushed `n`th has value and provenance `n`.
    fn new_stack_with_items(item_count: usize) -> anyhow::Result<Stack> {
        let mut stack = Stack::new();
        for i in 0..item_count {
            stack.push(ByteGroup::from_bytes(vec![i as u8], i as i64))?;
        }

        Ok(stack)
    }

    #[test]
    fn can_construct_new_stack() {
        let stack = Stack::new();
        assert_eq!(stack.size(), 0);
        assert_eq!(stack.limit(), MAXIMUM_STACK_DEPTH);
    }

    #[test]
    fn pushed_values_are_padded_and_keep_provenance() -> anyhow::Result<()> {
        let mut stack = Stack::new();
        stack.push(ByteGroup::from_bytes(vec![0x0a, 0xbc], 7))?;

        let top = stack.peek(0)?;
        assert_eq!(top.hex(), format!("{}0abc", "00".repeat(30)));
        assert!(top.provenance().iter().all(|step| *step == 7));

        Ok(())
    }

    #[test]
    fn cannot_push_outside_of_capacity() -> anyhow::Result<()> {
        let mut stack = Stack::new();
        for _ in 0..MAXIMUM_STACK_DEPTH {
            stack.push(ByteGroup::zeroes(32, 0))?;
        }
        stack
            .push(ByteGroup::zeroes(32, 0))
            .expect_err("Pushing onto a full stack did not error");

        Ok(())
    }

    #[test]
    fn respects_a_custom_limit() -> anyhow::Result<()> {
        let mut stack = Stack::with_limit(2);
        stack.push(ByteGroup::zeroes(32, 0))?;
        stack.push(ByteGroup::zeroes(32, 0))?;

        assert_eq!(
            stack.push(ByteGroup::zeroes(32, 0)),
            Err(Error::StackDepthExceeded { requested: 3 })
        );

        Ok(())
    }

    #[test]
    fn cannot_pop_item_when_empty() {
        let mut stack = Stack::default();
        assert_eq!(stack.pop(), Err(Error::NoSuchStackFrame { depth: 0 }));
    }

    #[test]
    fn peeks_from_the_top() -> anyhow::Result<()> {
        let stack = new_stack_with_items(10)?;
        assert_eq!(stack.peek(0)?.provenance()[31], 9);
        assert_eq!(stack.peek(7)?.provenance()[31], 2);
        stack
            .peek(10)
            .expect_err("Read an item at a depth that doesn't exist");

        Ok(())
    }

    #[test]
    fn can_set_a_full_word() -> anyhow::Result<()> {
        let mut stack = new_stack_with_items(3)?;
        stack.set(2, ByteGroup::from_bytes(vec![0xff; 32], 42))?;

        assert_eq!(stack.peek(2)?.provenance(), &[42; 32]);
        assert_eq!(stack.size(), 3);

        Ok(())
    }

    #[test]
    fn cannot_set_a_partial_word() -> anyhow::Result<()> {
        let mut stack = new_stack_with_items(3)?;
        let result = stack.set(0, ByteGroup::from_bytes(vec![0xff; 2], 42));

        assert_eq!(
            result,
            Err(Error::SizeMismatch {
                expected: 32,
                actual:   2,
            })
        );

        Ok(())
    }

    #[test]
    fn can_overwrite_from_recorded_words() -> anyhow::Result<()> {
        let mut stack = new_stack_with_items(5)?;
        stack.overwrite(&[[1u8; 32], [2u8; 32]], 11)?;

        assert_eq!(stack.size(), 2);
        assert_eq!(stack.peek(0)?.bytes(), &[2u8; 32]);
        assert_eq!(stack.values()[0].provenance(), &[11; 32]);

        Ok(())
    }
}
