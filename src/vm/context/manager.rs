//! This module contains the state machine that tracks which call context the
//! replay is executing in.

use tracing::debug;

use crate::{
    data::{Address, ByteGroup},
    error::{
        container::Locatable,
        replay::{Error, Result},
        storage,
    },
    opcode::{Instruction, Opcode},
    vm::context::{CallContext, CallContextId, CallContexts, CallTree, HaltType},
};

/// The change in call context caused by a step.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Transition {
    /// The step executed within the current context.
    Stay,

    /// The step entered the new context with the provided identifier.
    Enter(CallContextId),

    /// The step ended context `from`, returning to its parent `to`.
    Exit {
        from: CallContextId,
        to:   CallContextId,
    },
}

/// Tracks the current call context, creating new contexts as they are entered
/// and classifying how each one ends.
///
/// Each transition is decided from the executed instruction and the depth the
/// trace records for the following step.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CallContextManager {
    contexts: CallContexts,
    tree:     CallTree,
    current:  CallContextId,
}

impl CallContextManager {
    /// Creates a manager whose current context is the transaction's `root`
    /// context.
    #[must_use]
    pub fn new(root: CallContext) -> Self {
        let contexts = CallContexts::new(root);
        let current = contexts.root();
        let tree = CallTree::new(current);
        Self {
            contexts,
            tree,
            current,
        }
    }

    /// Gets the identifier of the current context.
    #[must_use]
    pub fn current_id(&self) -> CallContextId {
        self.current
    }

    /// Gets the current context.
    #[must_use]
    pub fn current(&self) -> &CallContext {
        self.contexts.get(self.current)
    }

    /// Gets the current context.
    #[must_use]
    pub fn current_mut(&mut self) -> &mut CallContext {
        self.contexts.get_mut(self.current)
    }

    /// Gets every context observed so far.
    #[must_use]
    pub fn contexts(&self) -> &CallContexts {
        &self.contexts
    }

    /// Gets the tree of contexts observed so far.
    #[must_use]
    pub fn tree(&self) -> &CallTree {
        &self.tree
    }

    /// Takes the contexts and their tree out of the manager.
    #[must_use]
    pub fn into_parts(self) -> (CallContexts, CallTree) {
        (self.contexts, self.tree)
    }

    /// Applies the transition caused by executing `instruction` in the current
    /// context, when the next step of the trace is at `next_depth`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the change in depth cannot be caused by the
    /// instruction, including any attempt to leave the root context.
    pub fn update(&mut self, instruction: &Instruction, next_depth: u32) -> Result<Transition> {
        let opcode = instruction.opcode();
        let step_index = instruction.step_index();
        let depth = self.current().depth;
        let unexpected = || {
            Error::UnexpectedDepthChange {
                opcode: opcode.as_text_code(),
                depth,
                next_depth,
            }
            .locate(step_index)
        };

        if next_depth == depth {
            if opcode.is_halt() {
                return Err(Error::ExpectedDepthChange {
                    opcode: opcode.as_text_code(),
                    depth,
                }
                .locate(step_index));
            }
            return Ok(Transition::Stay);
        }

        if depth.checked_add(1) == Some(next_depth) {
            if !opcode.can_enter_context() {
                return Err(unexpected());
            }
            let child = self.child_context(instruction)?;
            let parent = self.current;
            let id = self.contexts.push(child);
            self.tree.insert(parent, id);
            self.current = id;

            debug!(
                context = %id,
                depth = next_depth,
                code_address = %self.current().code_address,
                "Entered call context through {}",
                opcode.as_text_code()
            );
            return Ok(Transition::Enter(id));
        }

        if depth.checked_sub(1) == Some(next_depth) {
            let from = self.current;
            let to = self.current().parent.ok_or_else(unexpected)?;
            let context = self.current_mut();
            if opcode.is_halt() {
                context.halt_type = Some(HaltType::Normal);
                context.reverted = opcode == Opcode::Revert;
            } else {
                context.halt_type = Some(HaltType::Exceptional);
                context.reverted = true;
                context.return_data = ByteGroup::new();
            }
            let reverted = context.reverted;
            self.current = to;

            debug!(
                context = %from,
                reverted,
                "Exited call context through {}",
                opcode.as_text_code()
            );
            return Ok(Transition::Exit { from, to });
        }

        Err(unexpected())
    }

    /// Creates the context entered by `instruction` from the current context.
    fn child_context(&self, instruction: &Instruction) -> Result<CallContext> {
        let opcode = instruction.opcode();
        let current = self.current();

        let target = if opcode.is_create() {
            current.code_address.created_contract()
        } else {
            let address = instruction.stack_inputs().get(1).ok_or_else(|| {
                Error::from(storage::Error::NoSuchStackFrame { depth: 1 })
                    .locate(instruction.step_index())
            })?;
            Address::from_word_group(address)
        };

        let (msg_sender, storage_address) = match opcode {
            Opcode::DelegateCall => (current.msg_sender, current.storage_address),
            Opcode::CallCode => (current.code_address, current.storage_address),
            _ => (current.storage_address, target),
        };
        // Creations run initialization code that takes no calldata.
        let calldata = if opcode.is_create() {
            ByteGroup::new()
        } else {
            instruction.memory_input().cloned().unwrap_or_default()
        };

        Ok(CallContext {
            parent: Some(self.current),
            calldata,
            depth: current.depth + 1,
            msg_sender,
            code_address: target,
            storage_address,
            reverted: false,
            halt_type: None,
            is_contract_initialization: opcode.is_create(),
            return_data: ByteGroup::new(),
        })
    }
}
