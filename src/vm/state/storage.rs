//! This module contains the definition of the replay's persistent and
//! transient storage containers.

use std::collections::HashMap;

use crate::{
    constant::WORD_SIZE_BYTES,
    data::{Address, ByteGroup, Word},
    error::storage::{Error, Result},
};

/// Word-sized values stored per `(address, key)` pair.
///
/// Only slots that have been written during the trace are known. Reading any
/// other slot is an error rather than an implicit zero. The replay decides for
/// itself what an unwritten slot reads as (see
/// [`crate::flow::Node::StorageLoad`]), and a read that reaches this container
/// for an unknown slot is a bug in the caller.
///
/// Cloning the container is how the replay snapshots persistent storage on
/// entry to a call frame.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AddressKeyStorage {
    slots: HashMap<Address, HashMap<Word, ByteGroup>>,
}

impl AddressKeyStorage {
    /// Creates a new, empty, storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key` for `address`, overwriting any existing
    /// value.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if `value` is not exactly one word long.
    pub fn set(&mut self, address: Address, key: Word, value: ByteGroup) -> Result<()> {
        if value.len() != WORD_SIZE_BYTES {
            return Err(Error::SizeMismatch {
                expected: WORD_SIZE_BYTES,
                actual:   value.len(),
            });
        }

        self.slots.entry(address).or_default().insert(key, value);
        Ok(())
    }

    /// Loads the value stored under `key` for `address`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if nothing has been stored for `address`, or if nothing
    /// has been stored under `key` for it.
    pub fn get(&self, address: Address, key: &Word) -> Result<&ByteGroup> {
        let slots = self
            .slots
            .get(&address)
            .ok_or(Error::UnknownAddress { address })?;
        slots.get(key).ok_or_else(|| Error::UnknownKey {
            address,
            key: hex::encode(key),
        })
    }

    /// Checks whether a value has been stored under `key` for `address`.
    #[must_use]
    pub fn knows(&self, address: Address, key: &Word) -> bool {
        self.slots
            .get(&address)
            .is_some_and(|slots| slots.contains_key(key))
    }

    /// Gets the number of slots written across all addresses.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.slots.values().map(HashMap::len).sum()
    }
}

/// Transient (`TSTORE`/`TLOAD`) storage.
///
/// It behaves like [`AddressKeyStorage`], but is cleared at the end of the
/// transaction rather than persisted. Like persistent storage, writes made in a
/// call frame that reverts are undone.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TransientStorage {
    inner: AddressKeyStorage,
}

impl TransientStorage {
    /// Creates a new, empty, transient storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key` for `address`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if `value` is not exactly one word long.
    pub fn set(&mut self, address: Address, key: Word, value: ByteGroup) -> Result<()> {
        self.inner.set(address, key, value)
    }

    /// Loads the value stored under `key` for `address`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if no such value has been stored.
    pub fn get(&self, address: Address, key: &Word) -> Result<&ByteGroup> {
        self.inner.get(address, key)
    }

    /// Checks whether a value has been stored under `key` for `address`.
    #[must_use]
    pub fn knows(&self, address: Address, key: &Word) -> bool {
        self.inner.knows(address, key)
    }
}
