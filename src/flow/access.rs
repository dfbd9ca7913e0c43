//! This module contains the record of what an instruction read from the
//! environment.

use std::fmt::{Display, Formatter};

use crate::data::{Address, ByteGroup};

/// The kind of storage that an [`Access`] read from.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum AccessKind {
    Stack,
    Memory,
    Calldata,
    ReturnData,
    PersistentStorage,
    TransientStorage,
    Balance,
}

impl Display for AccessKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Stack => "stack",
            Self::Memory => "memory",
            Self::Calldata => "calldata",
            Self::ReturnData => "return_data",
            Self::PersistentStorage => "persistent_storage",
            Self::TransientStorage => "transient_storage",
            Self::Balance => "balance",
        };
        write!(f, "{name}")
    }
}

/// A single read performed by an instruction, with the value it observed.
///
/// The provenance of the value is what links the reading instruction to the
/// instructions that produced its inputs.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Access {
    Stack {
        index: usize,
        value: ByteGroup,
    },
    Memory {
        offset: usize,
        value:  ByteGroup,
    },
    Calldata {
        offset: usize,
        value:  ByteGroup,
    },
    ReturnData {
        offset: usize,
        value:  ByteGroup,
    },
    PersistentStorage {
        address: Address,
        key:     ByteGroup,
        value:   ByteGroup,
    },
    TransientStorage {
        address: Address,
        key:     ByteGroup,
        value:   ByteGroup,
    },
    Balance {
        address: Address,
        value:   ByteGroup,
    },
}

impl Access {
    /// Gets the kind of storage that was read.
    #[must_use]
    pub fn kind(&self) -> AccessKind {
        match self {
            Self::Stack { .. } => AccessKind::Stack,
            Self::Memory { .. } => AccessKind::Memory,
            Self::Calldata { .. } => AccessKind::Calldata,
            Self::ReturnData { .. } => AccessKind::ReturnData,
            Self::PersistentStorage { .. } => AccessKind::PersistentStorage,
            Self::TransientStorage { .. } => AccessKind::TransientStorage,
            Self::Balance { .. } => AccessKind::Balance,
        }
    }

    /// Gets the value that was read.
    #[must_use]
    pub fn value(&self) -> &ByteGroup {
        match self {
            Self::Stack { value, .. }
            | Self::Memory { value, .. }
            | Self::Calldata { value, .. }
            | Self::ReturnData { value, .. }
            | Self::PersistentStorage { value, .. }
            | Self::TransientStorage { value, .. }
            | Self::Balance { value, .. } => value,
        }
    }
}

/// Everything an instruction read from the environment, in the order it was
/// read.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct StorageAccesses {
    accesses: Vec<Access>,
}

impl StorageAccesses {
    /// Creates an empty set of accesses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the `access`.
    pub fn push(&mut self, access: Access) {
        self.accesses.push(access);
    }

    /// Iterates over the accesses in the order they were made.
    pub fn iter(&self) -> impl Iterator<Item = &Access> {
        self.accesses.iter()
    }

    /// Iterates over the accesses of the given `kind`.
    pub fn of_kind(&self, kind: AccessKind) -> impl Iterator<Item = &Access> {
        self.accesses.iter().filter(move |a| a.kind() == kind)
    }

    /// Gets the number of accesses made.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accesses.len()
    }

    /// Checks if nothing was read.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accesses.is_empty()
    }
}

impl<'a> IntoIterator for &'a StorageAccesses {
    type IntoIter = std::slice::Iter<'a, Access>;
    type Item = &'a Access;

    fn into_iter(self) -> Self::IntoIter {
        self.accesses.iter()
    }
}
