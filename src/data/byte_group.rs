//! This module contains the definition of the [`ByteGroup`], the
//! provenance-tagged byte buffer that every value in the replay is made of.

use std::{
    collections::BTreeSet,
    fmt::{Debug, Display, Formatter},
    ops::Range,
};

use ethnum::U256;

use crate::{
    constant::{PRESTATE, WORD_SIZE_BYTES},
    error::storage::{Error, Result},
};

/// The index of a step in the trace being replayed.
///
/// Non-negative values identify the instruction that produced a byte, while
/// [`PRESTATE`] marks bytes that existed before the trace began.
pub type StepIndex = i64;

/// A 32-byte EVM word in big-endian byte order.
pub type Word = [u8; WORD_SIZE_BYTES];

/// An ordered sequence of bytes in which every byte remembers the step of the
/// trace that produced it.
///
/// # Invariants
///
/// The number of bytes is always equal to the number of provenance entries.
/// Every constructor and operation on the group preserves this.
///
/// # Value Semantics
///
/// Slicing and concatenation return new groups and keep the provenance of
/// each byte they carry over. The only in-place mutation is [`Self::splice`],
/// which overwrites a range of bytes together with their provenance.
#[derive(Clone, Default, Eq, Hash, PartialEq)]
pub struct ByteGroup {
    bytes:      Vec<u8>,
    provenance: Vec<StepIndex>,
}

impl ByteGroup {
    /// Creates a new byte group containing no bytes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a byte group from `bytes`, attributing every byte to
    /// `step_index`.
    #[must_use]
    pub fn from_bytes(bytes: impl Into<Vec<u8>>, step_index: StepIndex) -> Self {
        let bytes = bytes.into();
        let provenance = vec![step_index; bytes.len()];
        Self { bytes, provenance }
    }

    /// Creates a byte group from separate `bytes` and `provenance` sequences.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the two sequences differ in length.
    pub fn from_parts(bytes: Vec<u8>, provenance: Vec<StepIndex>) -> Result<Self> {
        if bytes.len() != provenance.len() {
            return Err(Error::LengthMismatch {
                bytes:      bytes.len(),
                provenance: provenance.len(),
            });
        }

        Ok(Self { bytes, provenance })
    }

    /// Creates a byte group from the hex string `hex`, with or without the
    /// `0x` prefix, attributing every byte to `step_index`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if `hex` is not valid hexadecimal.
    pub fn from_hex(
        hex: &str,
        step_index: StepIndex,
    ) -> std::result::Result<Self, hex::FromHexError> {
        let digits = hex.strip_prefix("0x").unwrap_or(hex);
        let bytes = hex::decode(digits)?;
        Ok(Self::from_bytes(bytes, step_index))
    }

    /// Creates a group of `len` zero bytes attributed to `step_index`.
    #[must_use]
    pub fn zeroes(len: usize, step_index: StepIndex) -> Self {
        Self::from_bytes(vec![0; len], step_index)
    }

    /// Creates a 32-byte big-endian word group holding `value`.
    #[must_use]
    pub fn from_u256(value: U256, step_index: StepIndex) -> Self {
        Self::from_bytes(value.to_be_bytes(), step_index)
    }

    /// Creates a 32-byte big-endian word group holding `value`.
    #[must_use]
    pub fn from_usize(value: usize, step_index: StepIndex) -> Self {
        Self::from_u256(U256::from(value as u128), step_index)
    }

    /// Gets the number of bytes in the group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Checks if the group contains no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Gets the raw bytes of the group.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Gets the step that produced each byte of the group.
    #[must_use]
    pub fn provenance(&self) -> &[StepIndex] {
        &self.provenance
    }

    /// Gets the group's bytes as a lowercase hex string without a prefix.
    #[must_use]
    pub fn hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Returns the bytes in `range` as a new group.
    ///
    /// The range is clamped to the length of the group, so asking for bytes
    /// past the end yields a shorter (possibly empty) group.
    #[must_use]
    pub fn slice(&self, range: Range<usize>) -> Self {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        Self {
            bytes:      self.bytes[start..end].to_vec(),
            provenance: self.provenance[start..end].to_vec(),
        }
    }

    /// Returns a new group containing the bytes of `self` followed by the bytes
    /// of `other`.
    #[must_use]
    pub fn concat(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.extend(other);
        result
    }

    /// Appends the bytes of `other` to the end of this group.
    pub fn extend(&mut self, other: &Self) {
        self.bytes.extend_from_slice(&other.bytes);
        self.provenance.extend_from_slice(&other.provenance);
    }

    /// Overwrites the bytes starting at `offset` with the bytes of `value`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if `value` would extend past the end of the group.
    pub fn splice(&mut self, offset: usize, value: &Self) -> Result<()> {
        let end = offset.saturating_add(value.len());
        if end > self.len() {
            return Err(Error::OutOfBounds {
                offset,
                end,
                length: self.len(),
            });
        }

        self.bytes[offset..end].copy_from_slice(&value.bytes);
        self.provenance[offset..end].copy_from_slice(&value.provenance);

        Ok(())
    }

    /// Gets the set of distinct steps that produced the bytes of this group.
    #[must_use]
    pub fn depends_on(&self) -> BTreeSet<StepIndex> {
        self.provenance.iter().copied().collect()
    }

    /// Checks if any byte of the group existed before the trace began.
    #[must_use]
    pub fn depends_on_prestate(&self) -> bool {
        self.provenance.contains(&PRESTATE)
    }

    /// Returns the bytes of the group that were produced by `step_index`, in
    /// order.
    #[must_use]
    pub fn produced_by(&self, step_index: StepIndex) -> Self {
        let (bytes, provenance) = self
            .bytes
            .iter()
            .zip(&self.provenance)
            .filter(|(_, producer)| **producer == step_index)
            .map(|(byte, producer)| (*byte, *producer))
            .unzip();
        Self { bytes, provenance }
    }

    /// Resizes the group to exactly `size` bytes.
    ///
    /// Shorter groups are padded on the left with zero bytes attributed to
    /// `step_index`, while longer groups keep only their rightmost `size`
    /// bytes.
    #[must_use]
    pub fn to_size(&self, size: usize, step_index: StepIndex) -> Self {
        if self.len() >= size {
            self.slice(self.len() - size..self.len())
        } else {
            Self::zeroes(size - self.len(), step_index).concat(self)
        }
    }

    /// Interprets the group as a big-endian unsigned integer.
    ///
    /// Only the rightmost 32 bytes are considered.
    #[must_use]
    pub fn as_u256(&self) -> U256 {
        U256::from_be_bytes(self.as_word())
    }

    /// Gets the rightmost 32 bytes of the group as a word, padding with zeroes
    /// on the left where necessary.
    #[must_use]
    pub fn as_word(&self) -> Word {
        let mut word = [0u8; WORD_SIZE_BYTES];
        let source = &self.bytes[self.len().saturating_sub(WORD_SIZE_BYTES)..];
        word[WORD_SIZE_BYTES - source.len()..].copy_from_slice(source);
        word
    }

    /// Interprets the group as an offset or size into memory.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the value does not fit in a [`usize`].
    pub fn to_usize(&self) -> Result<usize> {
        let value = self.as_u256();
        if value > U256::from(usize::MAX as u128) {
            return Err(Error::OffsetTooLarge { value: self.hex() });
        }

        Ok(value.as_usize())
    }

    /// Checks if every byte in the group is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.bytes.iter().all(|b| *b == 0)
    }
}

impl Display for ByteGroup {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", self.hex())
    }
}

impl Debug for ByteGroup {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ByteGroup(0x{}, deps: {:?})", self.hex(), self.depends_on())
    }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeSet;

    use ethnum::U256;

    use crate::{
        constant::PRESTATE,
        data::byte_group::ByteGroup,
        error::storage::Error,
    };

    #[test]
    fn rejects_mismatched_parts() {
        let result = ByteGroup::from_parts(vec![1, 2, 3], vec![0, 0]);
        assert_eq!(
            result,
            Err(Error::LengthMismatch {
                bytes:      3,
                provenance: 2,
            })
        );
    }

    #[test]
    fn can_slice_and_keep_provenance() {
        let group = ByteGroup::from_bytes(vec![1, 2], 3).concat(&ByteGroup::from_bytes(vec![4], 9));
        let slice = group.slice(1..3);

        assert_eq!(slice.bytes(), &[2, 4]);
        assert_eq!(slice.provenance(), &[3, 9]);
    }

    #[test]
    fn slicing_past_the_end_is_clamped() {
        let group = ByteGroup::from_bytes(vec![1, 2, 3], 0);
        assert_eq!(group.slice(2..10).bytes(), &[3]);
        assert!(group.slice(5..10).is_empty());
    }

    #[test]
    fn can_splice_in_place() -> anyhow::Result<()> {
        let mut group = ByteGroup::zeroes(4, PRESTATE);
        group.splice(1, &ByteGroup::from_bytes(vec![0xaa, 0xbb], 5))?;

        assert_eq!(group.hex(), "00aabb00");
        assert_eq!(group.provenance(), &[PRESTATE, 5, 5, PRESTATE]);

        Ok(())
    }

    #[test]
    fn cannot_splice_out_of_bounds() {
        let mut group = ByteGroup::zeroes(2, PRESTATE);
        group
            .splice(1, &ByteGroup::from_bytes(vec![1, 2], 0))
            .expect_err("Splice past the end of the group succeeded");
    }

    #[test]
    fn can_compute_dependencies() {
        let group = ByteGroup::from_bytes(vec![0; 2], 4)
            .concat(&ByteGroup::from_bytes(vec![0; 3], PRESTATE))
            .concat(&ByteGroup::from_bytes(vec![0], 4));

        assert_eq!(group.depends_on(), BTreeSet::from([PRESTATE, 4]));
        assert!(group.depends_on_prestate());
        assert_eq!(group.produced_by(4).len(), 3);
    }

    #[test]
    fn to_size_pads_on_the_left_and_truncates_from_the_left() {
        let group = ByteGroup::from_bytes(vec![0x12, 0x34], 1);

        let padded = group.to_size(4, 8);
        assert_eq!(padded.hex(), "00001234");
        assert_eq!(padded.provenance(), &[8, 8, 1, 1]);

        let truncated = group.to_size(1, 8);
        assert_eq!(truncated.hex(), "34");
        assert_eq!(truncated.provenance(), &[1]);
    }

    #[test]
    fn can_interpret_as_integers() -> anyhow::Result<()> {
        let group = ByteGroup::from_hex("0x0100", 0)?;
        assert_eq!(group.as_u256(), U256::from(256u32));
        assert_eq!(group.to_usize()?, 256);

        let huge = ByteGroup::from_bytes(vec![0xff; 32], 0);
        assert!(huge.to_usize().is_err());

        Ok(())
    }
}
