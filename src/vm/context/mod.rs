//! This module contains the call contexts observed while replaying a trace,
//! the tree they form, and the state machine that moves the replay between
//! them.

pub mod manager;
pub mod tree;

use std::fmt::{Display, Formatter};

pub use manager::{CallContextManager, Transition};
pub use tree::CallTree;

use crate::{
    constant::PRESTATE,
    data::{Address, ByteGroup},
};

/// The identifier of a [`CallContext`] within its [`CallContexts`].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct CallContextId(usize);

impl CallContextId {
    /// Gets the position of the context in the order the contexts were entered.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for CallContextId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a call context ended.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum HaltType {
    /// Through `STOP`, `RETURN`, `REVERT` or `SELFDESTRUCT`.
    Normal,

    /// Through any other instruction, such as one that ran out of gas.
    Exceptional,
}

/// A single call frame of the transaction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CallContext {
    /// The context that entered this one, or [`None`] for the transaction's
    /// own context.
    pub parent: Option<CallContextId>,

    /// The input to the context.
    pub calldata: ByteGroup,

    /// The call depth of the context, starting at 1.
    pub depth: u32,

    /// The account that `CALLER` reports in the context.
    pub msg_sender: Address,

    /// The account whose code executes in the context.
    pub code_address: Address,

    /// The account whose storage and balance the context operates on.
    pub storage_address: Address,

    /// Whether the changes made by the context were rolled back.
    pub reverted: bool,

    /// How the context ended, or [`None`] if it has not ended.
    pub halt_type: Option<HaltType>,

    /// Whether the context runs the initialization code of a new contract.
    pub is_contract_initialization: bool,

    /// The data returned by the context.
    pub return_data: ByteGroup,
}

impl CallContext {
    /// Creates the context of the transaction itself, sent by `sender` to `to`
    /// with the provided `calldata`.
    ///
    /// The calldata is attributed to [`PRESTATE`] as it exists before the
    /// trace begins.
    #[must_use]
    pub fn root(sender: Address, to: Address, calldata: impl Into<Vec<u8>>) -> Self {
        Self {
            parent: None,
            calldata: ByteGroup::from_bytes(calldata, PRESTATE),
            depth: 1,
            msg_sender: sender,
            code_address: to,
            storage_address: to,
            reverted: false,
            halt_type: None,
            is_contract_initialization: false,
            return_data: ByteGroup::new(),
        }
    }

    /// Checks if the context has ended.
    #[must_use]
    pub fn has_halted(&self) -> bool {
        self.halt_type.is_some()
    }
}

/// The arena that owns every call context of a replay.
///
/// Contexts are never removed, so that the call tree and later analyses can
/// refer to them by [`CallContextId`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CallContexts {
    contexts: Vec<CallContext>,
}

impl CallContexts {
    /// Creates the arena containing only the `root` context.
    #[must_use]
    pub fn new(root: CallContext) -> Self {
        let contexts = vec![root];
        Self { contexts }
    }

    /// Gets the identifier of the root context.
    #[must_use]
    pub fn root(&self) -> CallContextId {
        CallContextId(0)
    }

    /// Adds `context` to the arena.
    pub fn push(&mut self, context: CallContext) -> CallContextId {
        self.contexts.push(context);
        CallContextId(self.contexts.len() - 1)
    }

    /// Gets the context with the provided `id`.
    ///
    /// # Panics
    ///
    /// If `id` was not issued by this arena. This is a programmer bug.
    #[must_use]
    pub fn get(&self, id: CallContextId) -> &CallContext {
        &self.contexts[id.0]
    }

    /// Gets the context with the provided `id`.
    ///
    /// # Panics
    ///
    /// If `id` was not issued by this arena. This is a programmer bug.
    #[must_use]
    pub fn get_mut(&mut self, id: CallContextId) -> &mut CallContext {
        &mut self.contexts[id.0]
    }

    /// Iterates over the contexts in the order they were entered.
    pub fn iter(&self) -> impl Iterator<Item = (CallContextId, &CallContext)> {
        self.contexts
            .iter()
            .enumerate()
            .map(|(i, c)| (CallContextId(i), c))
    }

    /// Gets the number of contexts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Checks if the arena is empty, which it never is.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}
