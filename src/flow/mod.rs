//! This module contains the information flow language used to describe what
//! each instruction reads from and writes to the replay environment.
//!
//! An instruction's behaviour is a tree of [`Node`]s. Evaluating the tree
//! against the [`Environment`] before the instruction executes, together with
//! the [`InstructionOutputOracle`] recorded after it, yields a [`Flow`]: the
//! provenance-tagged values the instruction read, and the writes that must be
//! committed to replay it.
//!
//! Evaluation never changes the environment. Writes are collected and
//! committed once the whole tree has been evaluated, so every node observes
//! the state from before the instruction.

pub mod access;
pub mod node;
pub mod writes;

use std::collections::BTreeMap;

pub use access::{Access, AccessKind, StorageAccesses};
pub use node::Node;
pub use writes::{MemoryExpansion, MemoryWrite, StorageWrite, StorageWrites};

use crate::{
    constant::PRESTATE,
    data::{Address, ByteGroup, StepIndex},
    error::{replay::Error, storage},
    trace::InstructionOutputOracle,
    vm::Environment,
};

/// What an instruction read from the environment and what it writes back.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct Flow {
    pub accesses: StorageAccesses,
    pub writes:   StorageWrites,
}

/// The result of evaluating an instruction's flow.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Evaluation {
    /// The accesses and writes of the instruction.
    pub flow: Flow,

    /// The stack items the instruction read, ordered from the top of the
    /// stack.
    pub stack_inputs: Vec<ByteGroup>,

    /// The first range of memory the instruction read.
    pub memory_input: Option<ByteGroup>,

    /// The last value the instruction writes into memory.
    pub memory_output: Option<ByteGroup>,
}

/// Evaluates `node` for the instruction at `step_index`, which executes in
/// `environment` and is followed by the state recorded in `oracle`.
///
/// # Errors
///
/// Returns [`Err`] if the node reads state that does not exist, or if a
/// writing node is used as a value.
pub fn evaluate(
    node: &Node,
    environment: &Environment,
    oracle: &InstructionOutputOracle,
    step_index: StepIndex,
) -> Result<Evaluation, Error> {
    let mut evaluator = Evaluator {
        environment,
        oracle,
        step_index,
        flow: Flow::default(),
        stack_inputs: BTreeMap::new(),
        popped: 0,
        memory_input: None,
        memory_output: None,
    };
    evaluator.eval(node)?;

    let mut flow = evaluator.flow;
    flow.writes.stack_pops = evaluator.popped;
    Ok(Evaluation {
        flow,
        stack_inputs: evaluator.stack_inputs.into_values().collect(),
        memory_input: evaluator.memory_input,
        memory_output: evaluator.memory_output,
    })
}

/// The visitor that walks a flow tree.
struct Evaluator<'a> {
    environment:   &'a Environment,
    oracle:        &'a InstructionOutputOracle,
    step_index:    StepIndex,
    flow:          Flow,
    stack_inputs:  BTreeMap<usize, ByteGroup>,
    popped:        usize,
    memory_input:  Option<ByteGroup>,
    memory_output: Option<ByteGroup>,
}

impl Evaluator<'_> {
    /// Evaluates `node`, returning its value if it has one.
    fn eval(&mut self, node: &Node) -> Result<Option<ByteGroup>, Error> {
        let step = self.step_index;
        let environment = self.environment;
        let value = match node {
            Node::Const(bytes) => ByteGroup::from_bytes(bytes.clone(), step),
            Node::StackArg(index) => {
                let value = self.read_stack(*index)?;
                self.popped = self.popped.max(index + 1);
                value
            }
            Node::StackPeek(index) => self.read_stack(*index)?,
            Node::OracleStackPeek(index) => self.oracle_word(*index, step)?,
            Node::OracleMemRange { offset, size } => {
                let offset = self.value(offset)?;
                let size = self.value(size)?.to_usize()?;
                if size == 0 {
                    ByteGroup::new()
                } else {
                    let offset = offset.to_usize()?;
                    self.check_size(offset, size)?;
                    self.oracle
                        .memory_range(offset, size, step)
                        .ok_or(Error::MissingOracleMemory)?
                }
            }
            Node::ToSize { value, size } => self.value(value)?.to_size(*size, step),
            Node::MemRange { offset, size } => {
                let offset = self.value(offset)?;
                let size = self.value(size)?.to_usize()?;
                if size == 0 {
                    ByteGroup::new()
                } else {
                    let offset = offset.to_usize()?;
                    self.check_size(offset, size)?;
                    let value = environment.memory().get(offset, size, step);
                    self.flow
                        .writes
                        .memory_expansions
                        .push(MemoryExpansion { offset, size });
                    self.flow.accesses.push(Access::Memory {
                        offset,
                        value: value.clone(),
                    });
                    self.memory_input.get_or_insert_with(|| value.clone());
                    value
                }
            }
            Node::CalldataRange { offset, size } => {
                let offset = self.value(offset)?;
                let size = self.value(size)?.to_usize()?;
                self.check_size(0, size)?;
                let calldata = &environment.current_context().calldata;
                let (offset, value) = padded_range(calldata, &offset, size, step);
                if size > 0 {
                    self.flow.accesses.push(Access::Calldata {
                        offset,
                        value: value.clone(),
                    });
                }
                value
            }
            Node::CalldataSize => {
                let size = environment.current_context().calldata.len();
                ByteGroup::from_usize(size, step)
            }
            Node::ReturnDataRange { dest, offset, size } => {
                let dest = self.value(dest)?;
                let offset = self.value(offset)?;
                let size = self.value(size)?.to_usize()?;
                self.check_size(0, size)?;
                let recorded = match environment.partial_return_data() {
                    Some(producer) if size > 0 => {
                        let dest = dest.to_usize()?;
                        self.check_size(dest, size)?;
                        self.oracle.memory_range(dest, size, producer)
                    }
                    _ => None,
                };
                let data = environment.last_return_data();
                let (offset, value) = padded_range(data, &offset, size, step);
                let value = recorded.unwrap_or(value);
                if size > 0 {
                    self.flow.accesses.push(Access::ReturnData {
                        offset,
                        value: value.clone(),
                    });
                }
                value
            }
            Node::ReturnDataSize => {
                // Calls that never entered a context leave no record of what they
                // returned, so the size is taken from the trace.
                let data = environment.last_return_data();
                if !data.is_empty() {
                    self.flow.accesses.push(Access::ReturnData {
                        offset: 0,
                        value:  data.clone(),
                    });
                }
                self.oracle_word(0, step)?
            }
            Node::StorageLoad { key } => {
                let key = self.value(key)?;
                let address = environment.current_context().storage_address;
                let storage = environment.persistent_storage();
                let value = if storage.knows(address, &key.as_word()) {
                    storage.get(address, &key.as_word())?.clone()
                } else {
                    self.oracle_word(0, PRESTATE)?
                };
                self.flow.accesses.push(Access::PersistentStorage {
                    address,
                    key,
                    value: value.clone(),
                });
                value
            }
            Node::TransientLoad { key } => {
                let key = self.value(key)?;
                let address = environment.current_context().storage_address;
                let storage = environment.transient_storage();
                let value = if storage.knows(address, &key.as_word()) {
                    storage.get(address, &key.as_word())?.clone()
                } else {
                    self.oracle_word(0, PRESTATE)?
                };
                self.flow.accesses.push(Access::TransientStorage {
                    address,
                    key,
                    value: value.clone(),
                });
                value
            }
            Node::Balance { address } => {
                let address = Address::from_word_group(&self.value(address)?);
                self.read_balance(address)?
            }
            Node::SelfBalance => {
                let address = environment.current_context().storage_address;
                self.read_balance(address)?
            }
            Node::CreatedAddress => environment
                .current_context()
                .code_address
                .created_contract()
                .to_group(step),
            Node::Concat(nodes) => {
                let mut result = ByteGroup::new();
                for node in nodes {
                    result.extend(&self.value(node)?);
                }
                result
            }
            Node::StackPush(value) => {
                let value = self.value(value)?;
                self.flow.writes.stack_pushes.push(value);
                return Ok(None);
            }
            Node::StackSet { index, value } => {
                let value = self.value(value)?;
                self.flow.writes.stack_sets.push((*index, value));
                return Ok(None);
            }
            Node::MemWrite { offset, value } => {
                let offset = self.value(offset)?;
                let value = self.value(value)?;
                if !value.is_empty() {
                    let offset = offset.to_usize()?;
                    self.memory_output = Some(value.clone());
                    self.flow.writes.memory.push(MemoryWrite { offset, value });
                }
                return Ok(None);
            }
            Node::MemExpand { offset, size } => {
                let offset = self.value(offset)?;
                let size = self.value(size)?.to_usize()?;
                if size > 0 {
                    let offset = offset.to_usize()?;
                    self.flow
                        .writes
                        .memory_expansions
                        .push(MemoryExpansion { offset, size });
                }
                return Ok(None);
            }
            Node::ReturnDataWrite(value) => {
                let value = self.value(value)?;
                self.flow.writes.return_data = Some(value);
                return Ok(None);
            }
            Node::StorageStore { key, value } => {
                let write = self.storage_write(key, value)?;
                self.flow.writes.persistent_storage.push(write);
                return Ok(None);
            }
            Node::TransientStore { key, value } => {
                let write = self.storage_write(key, value)?;
                self.flow.writes.transient_storage.push(write);
                return Ok(None);
            }
            Node::BalanceTransfer { to, value } => {
                let to = Address::from_word_group(&self.value(to)?);
                let value = self.value(value)?;
                if !value.is_zero() {
                    let from = environment.current_context().storage_address;
                    self.flow.writes.balance_modifications.extend([from, to]);
                }
                return Ok(None);
            }
            Node::SelfDestruct { beneficiary } => {
                let beneficiary = Address::from_word_group(&self.value(beneficiary)?);
                let from = environment.current_context().storage_address;
                self.flow
                    .writes
                    .balance_modifications
                    .extend([from, beneficiary]);
                return Ok(None);
            }
            Node::Combine(nodes) => {
                for node in nodes {
                    self.eval(node)?;
                }
                return Ok(None);
            }
        };

        Ok(Some(value))
    }

    /// Evaluates `node`, requiring that it produces a value.
    fn value(&mut self, node: &Node) -> Result<ByteGroup, Error> {
        self.eval(node)?.ok_or_else(|| Error::NodeHasNoResult {
            node: node.to_string(),
        })
    }

    fn read_stack(&mut self, index: usize) -> Result<ByteGroup, Error> {
        let value = self.environment.stack().peek(index)?.clone();
        if !self.stack_inputs.contains_key(&index) {
            self.flow.accesses.push(Access::Stack {
                index,
                value: value.clone(),
            });
            self.stack_inputs.insert(index, value.clone());
        }
        Ok(value)
    }

    /// Rejects reads of `size` bytes at `offset` that would not fit in the
    /// memory of any frame, before anything is allocated for them.
    fn check_size(&self, offset: usize, size: usize) -> Result<(), Error> {
        let limit = self.environment.memory().limit();
        match offset.checked_add(size) {
            Some(end) if end <= limit => Ok(()),
            _ => Err(storage::Error::MemoryLimitExceeded {
                requested: offset.saturating_add(size),
                limit,
            }
            .into()),
        }
    }

    fn oracle_word(&self, index: usize, step_index: StepIndex) -> Result<ByteGroup, Error> {
        let word = self
            .oracle
            .stack_peek(index)
            .ok_or(Error::MissingOracleValue { index })?;
        Ok(ByteGroup::from_bytes(word.to_vec(), step_index))
    }

    /// Reads the balance of `address`, which is attributed to the step that
    /// last changed it.
    fn read_balance(&mut self, address: Address) -> Result<ByteGroup, Error> {
        let last_modified = self.environment.balances().last_modification(address);
        let value = self.oracle_word(0, last_modified)?;
        self.flow.accesses.push(Access::Balance {
            address,
            value: value.clone(),
        });
        Ok(value)
    }

    /// Builds a write to storage of the current context.
    ///
    /// Stored words are attributed to the storing step, so that later loads
    /// depend on the store rather than on whatever computed the value.
    fn storage_write(&mut self, key: &Node, value: &Node) -> Result<StorageWrite, Error> {
        let key = self.value(key)?.as_word();
        let value = self.value(value)?.as_word();
        let value = ByteGroup::from_bytes(value, self.step_index);
        let address = self.environment.current_context().storage_address;
        Ok(StorageWrite {
            address,
            key,
            value,
        })
    }
}

/// Reads `size` bytes of `data` at `offset`, zero-padding past its end with
/// bytes attributed to `step_index`.
///
/// Offsets too large to index memory behave as if they were past the end.
fn padded_range(
    data: &ByteGroup,
    offset: &ByteGroup,
    size: usize,
    step_index: StepIndex,
) -> (usize, ByteGroup) {
    let offset = offset.to_usize().unwrap_or(usize::MAX);
    let mut value = data.slice(offset..offset.saturating_add(size));
    if value.len() < size {
        value.extend(&ByteGroup::zeroes(size - value.len(), step_index));
    }
    (offset, value)
}
