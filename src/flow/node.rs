//! This module contains the nodes that information flows are built from.

use std::fmt::{Display, Formatter};

/// A node in the information flow of an instruction.
///
/// Nodes either produce a value (a [`crate::data::ByteGroup`]) or describe a
/// write to the environment. Value nodes may be nested as the arguments of
/// any other node, and are evaluated before their parent from left to right.
/// Using a writing node where a value is required is an error.
///
/// Stack indices are counted from the top of the stack, which is index 0, as
/// the stack was before the instruction executed.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Node {
    /// Literal bytes, attributed to the executing step.
    Const(Vec<u8>),

    /// The stack item at the index, which the instruction consumes.
    StackArg(usize),

    /// The stack item at the index, which the instruction leaves in place.
    StackPeek(usize),

    /// The item at the index on the stack recorded after the instruction,
    /// attributed to the executing step.
    OracleStackPeek(usize),

    /// A range of the memory recorded after the instruction, attributed to the
    /// executing step.
    OracleMemRange { offset: Box<Node>, size: Box<Node> },

    /// The value, left-padded with zeroes or truncated from the left to the
    /// given number of bytes.
    ToSize { value: Box<Node>, size: usize },

    /// A range of the current frame's memory, which is expanded to cover it.
    MemRange { offset: Box<Node>, size: Box<Node> },

    /// A range of the current call context's calldata.
    CalldataRange { offset: Box<Node>, size: Box<Node> },

    /// The size of the current call context's calldata.
    CalldataSize,

    /// A range of the data returned by the frame's most recent sub-context,
    /// about to be copied into memory at `dest`.
    ///
    /// When that sub-context was never entered, only the trace knows what it
    /// returned, and the range is read from the memory recorded at `dest`
    /// after the instruction.
    ReturnDataRange {
        dest:   Box<Node>,
        offset: Box<Node>,
        size:   Box<Node>,
    },

    /// The size of the data returned by the frame's most recent sub-context.
    ReturnDataSize,

    /// The persistent storage slot with the given key for the executing
    /// storage address.
    StorageLoad { key: Box<Node> },

    /// The transient storage slot with the given key for the executing storage
    /// address.
    TransientLoad { key: Box<Node> },

    /// The balance of the account with the given address.
    Balance { address: Box<Node> },

    /// The balance of the executing storage address.
    SelfBalance,

    /// The placeholder address of a contract created by the executing code.
    CreatedAddress,

    /// The values of the nodes, one after the other.
    Concat(Vec<Node>),

    /// Pushes the value onto the stack once every consumed argument has been
    /// popped.
    StackPush(Box<Node>),

    /// Replaces the stack item at the index with the value.
    StackSet { index: usize, value: Box<Node> },

    /// Writes the value into memory at the offset.
    MemWrite { offset: Box<Node>, value: Box<Node> },

    /// Expands memory to cover the range without reading it.
    MemExpand { offset: Box<Node>, size: Box<Node> },

    /// Sets the data returned by the current call context.
    ReturnDataWrite(Box<Node>),

    /// Writes the value into the persistent storage slot with the key.
    StorageStore { key: Box<Node>, value: Box<Node> },

    /// Writes the value into the transient storage slot with the key.
    TransientStore { key: Box<Node>, value: Box<Node> },

    /// Moves the value from the executing storage address to the address.
    BalanceTransfer { to: Box<Node>, value: Box<Node> },

    /// Moves the whole balance of the executing storage address to the
    /// beneficiary.
    SelfDestruct { beneficiary: Box<Node> },

    /// Evaluates each of the nodes in order, discarding any values.
    Combine(Vec<Node>),
}

impl Node {
    /// Gets a short name for the kind of node.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Const(_) => "const",
            Self::StackArg(_) => "stack_arg",
            Self::StackPeek(_) => "stack_peek",
            Self::OracleStackPeek(_) => "oracle_stack_peek",
            Self::OracleMemRange { .. } => "oracle_mem_range",
            Self::ToSize { .. } => "to_size",
            Self::MemRange { .. } => "mem_range",
            Self::CalldataRange { .. } => "calldata_range",
            Self::CalldataSize => "calldata_size",
            Self::ReturnDataRange { .. } => "return_data_range",
            Self::ReturnDataSize => "return_data_size",
            Self::StorageLoad { .. } => "storage_load",
            Self::TransientLoad { .. } => "transient_load",
            Self::Balance { .. } => "balance",
            Self::SelfBalance => "self_balance",
            Self::CreatedAddress => "created_address",
            Self::Concat(_) => "concat",
            Self::StackPush(_) => "stack_push",
            Self::StackSet { .. } => "stack_set",
            Self::MemWrite { .. } => "mem_write",
            Self::MemExpand { .. } => "mem_expand",
            Self::ReturnDataWrite(_) => "return_data_write",
            Self::StorageStore { .. } => "storage_store",
            Self::TransientStore { .. } => "transient_store",
            Self::BalanceTransfer { .. } => "balance_transfer",
            Self::SelfDestruct { .. } => "selfdestruct",
            Self::Combine(_) => "combine",
        }
    }

    /// Counts the distinct stack items this node and its children consume.
    #[must_use]
    pub fn arg_count(&self) -> usize {
        let mut indices = Vec::new();
        self.collect_args(&mut indices);
        indices.sort_unstable();
        indices.dedup();
        indices.len()
    }

    fn collect_args(&self, indices: &mut Vec<usize>) {
        match self {
            Self::StackArg(index) => indices.push(*index),
            Self::Const(_)
            | Self::StackPeek(_)
            | Self::OracleStackPeek(_)
            | Self::CalldataSize
            | Self::ReturnDataSize
            | Self::SelfBalance
            | Self::CreatedAddress => (),
            Self::ToSize { value, .. }
            | Self::StackPush(value)
            | Self::StackSet { value, .. }
            | Self::ReturnDataWrite(value) => value.collect_args(indices),
            Self::StorageLoad { key } | Self::TransientLoad { key } => key.collect_args(indices),
            Self::Balance { address } => address.collect_args(indices),
            Self::SelfDestruct { beneficiary } => beneficiary.collect_args(indices),
            Self::OracleMemRange { offset, size }
            | Self::MemRange { offset, size }
            | Self::CalldataRange { offset, size }
            | Self::MemExpand { offset, size } => {
                offset.collect_args(indices);
                size.collect_args(indices);
            }
            Self::ReturnDataRange { dest, offset, size } => {
                dest.collect_args(indices);
                offset.collect_args(indices);
                size.collect_args(indices);
            }
            Self::MemWrite { offset, value } => {
                offset.collect_args(indices);
                value.collect_args(indices);
            }
            Self::StorageStore { key, value } | Self::TransientStore { key, value } => {
                key.collect_args(indices);
                value.collect_args(indices);
            }
            Self::BalanceTransfer { to, value } => {
                to.collect_args(indices);
                value.collect_args(indices);
            }
            Self::Concat(nodes) | Self::Combine(nodes) => {
                nodes.iter().for_each(|n| n.collect_args(indices));
            }
        }
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind())
    }
}

// The constructors below keep the instruction catalogue readable.

#[must_use]
pub fn constant(bytes: impl Into<Vec<u8>>) -> Node {
    Node::Const(bytes.into())
}

#[must_use]
pub fn arg(index: usize) -> Node {
    Node::StackArg(index)
}

#[must_use]
pub fn peek(index: usize) -> Node {
    Node::StackPeek(index)
}

#[must_use]
pub fn oracle(index: usize) -> Node {
    Node::OracleStackPeek(index)
}

#[must_use]
pub fn oracle_mem_range(offset: Node, size: Node) -> Node {
    Node::OracleMemRange {
        offset: Box::new(offset),
        size:   Box::new(size),
    }
}

#[must_use]
pub fn to_size(value: Node, size: usize) -> Node {
    Node::ToSize {
        value: Box::new(value),
        size,
    }
}

#[must_use]
pub fn mem_range(offset: Node, size: Node) -> Node {
    Node::MemRange {
        offset: Box::new(offset),
        size:   Box::new(size),
    }
}

#[must_use]
pub fn calldata_range(offset: Node, size: Node) -> Node {
    Node::CalldataRange {
        offset: Box::new(offset),
        size:   Box::new(size),
    }
}

#[must_use]
pub fn return_data_range(dest: Node, offset: Node, size: Node) -> Node {
    Node::ReturnDataRange {
        dest:   Box::new(dest),
        offset: Box::new(offset),
        size:   Box::new(size),
    }
}

#[must_use]
pub fn storage_load(key: Node) -> Node {
    Node::StorageLoad { key: Box::new(key) }
}

#[must_use]
pub fn transient_load(key: Node) -> Node {
    Node::TransientLoad { key: Box::new(key) }
}

#[must_use]
pub fn balance(address: Node) -> Node {
    Node::Balance {
        address: Box::new(address),
    }
}

#[must_use]
pub fn push(value: Node) -> Node {
    Node::StackPush(Box::new(value))
}

#[must_use]
pub fn stack_set(index: usize, value: Node) -> Node {
    Node::StackSet {
        index,
        value: Box::new(value),
    }
}

#[must_use]
pub fn mem_write(offset: Node, value: Node) -> Node {
    Node::MemWrite {
        offset: Box::new(offset),
        value:  Box::new(value),
    }
}

#[must_use]
pub fn mem_expand(offset: Node, size: Node) -> Node {
    Node::MemExpand {
        offset: Box::new(offset),
        size:   Box::new(size),
    }
}

#[must_use]
pub fn return_data_write(value: Node) -> Node {
    Node::ReturnDataWrite(Box::new(value))
}

#[must_use]
pub fn storage_store(key: Node, value: Node) -> Node {
    Node::StorageStore {
        key:   Box::new(key),
        value: Box::new(value),
    }
}

#[must_use]
pub fn transient_store(key: Node, value: Node) -> Node {
    Node::TransientStore {
        key:   Box::new(key),
        value: Box::new(value),
    }
}

#[must_use]
pub fn balance_transfer(to: Node, value: Node) -> Node {
    Node::BalanceTransfer {
        to:    Box::new(to),
        value: Box::new(value),
    }
}

#[must_use]
pub fn selfdestruct(beneficiary: Node) -> Node {
    Node::SelfDestruct {
        beneficiary: Box::new(beneficiary),
    }
}

#[must_use]
pub fn combine(nodes: impl IntoIterator<Item = Node>) -> Node {
    Node::Combine(nodes.into_iter().collect())
}

/// Consumes the top `count` stack items, in order.
pub fn args(count: usize) -> impl Iterator<Item = Node> {
    (0..count).map(arg)
}
