//! This module contains the environment that instructions are replayed
//! against.

use tracing::debug;

use crate::{
    data::{ByteGroup, StepIndex},
    error::{
        container::Locatable,
        replay::{Error, Result},
        storage,
    },
    flow::StorageWrites,
    opcode::Instruction,
    vm::{
        context::{CallContext, CallContextId, CallContextManager},
        state::{AddressKeyStorage, Balances, Memory, Stack, TransientStorage},
        Config,
    },
};

/// The storage that belongs to a single call frame.
#[derive(Clone, Debug, Eq, PartialEq)]
struct Frame {
    stack:       Stack,
    memory:      Memory,
    return_data: ByteGroup,
    entered_by:  Option<Instruction>,

    /// The step that made `return_data` available, when it is only known as
    /// far as that step copied it into memory.
    partial_return_data: Option<StepIndex>,
}

impl Frame {
    fn new(config: &Config, entered_by: Option<Instruction>) -> Self {
        Self {
            stack: Stack::with_limit(config.maximum_stack_depth),
            memory: Memory::new(config.memory_limit_bytes),
            return_data: ByteGroup::new(),
            entered_by,
            partial_return_data: None,
        }
    }
}

/// The revertable state at the moment a call frame was entered.
#[derive(Clone, Debug, Eq, PartialEq)]
struct Snapshot {
    persistent_storage: AddressKeyStorage,
    transient_storage:  TransientStorage,
    balances:           Balances,
}

/// Everything an instruction can observe or change while the trace is
/// replayed.
///
/// # Scoping
///
/// The stack, memory and return data buffer belong to the current call frame.
/// Entering a call context starts a fresh frame and exiting one discards it.
///
/// Persistent storage, transient storage and balances are instead shared by
/// every frame, but revertable. A snapshot of them is taken whenever a call
/// context is entered. It is discarded when the context exits normally, and
/// restored when it reverts.
///
/// # Invariants
///
/// There is always exactly one fewer snapshot than the current call depth.
#[derive(Clone, Debug)]
pub struct Environment {
    contexts:                  CallContextManager,
    frame:                     Frame,
    suspended_frames:          Vec<Frame>,
    persistent_storage:        AddressKeyStorage,
    balances:                  Balances,
    snapshots:                 Vec<Snapshot>,
    transient_storage:         TransientStorage,
    step_index:                StepIndex,
    last_executed_sub_context: Option<CallContextId>,
    config:                    Config,
}

impl Environment {
    /// Creates the environment at the start of a transaction, executing in the
    /// `root` call context.
    #[must_use]
    pub fn new(root: CallContext, config: Config) -> Self {
        Self {
            contexts: CallContextManager::new(root),
            frame: Frame::new(&config, None),
            suspended_frames: Vec::new(),
            persistent_storage: AddressKeyStorage::new(),
            balances: Balances::new(),
            snapshots: Vec::new(),
            transient_storage: TransientStorage::new(),
            step_index: 0,
            last_executed_sub_context: None,
            config,
        }
    }

    /// Gets the index of the step that will execute next.
    #[must_use]
    pub fn current_step_index(&self) -> StepIndex {
        self.step_index
    }

    /// Moves on to the next step.
    pub fn increment_step(&mut self) {
        self.step_index += 1;
    }

    /// Gets the call context that is currently executing.
    #[must_use]
    pub fn current_context(&self) -> &CallContext {
        self.contexts.current()
    }

    /// Gets the identifier of the call context that is currently executing.
    #[must_use]
    pub fn current_context_id(&self) -> CallContextId {
        self.contexts.current_id()
    }

    /// Gets the call depth of the current context.
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.current_context().depth
    }

    /// Gets the manager tracking the call contexts of the replay.
    #[must_use]
    pub fn contexts(&self) -> &CallContextManager {
        &self.contexts
    }

    /// Gets the manager tracking the call contexts of the replay.
    #[must_use]
    pub fn contexts_mut(&mut self) -> &mut CallContextManager {
        &mut self.contexts
    }

    /// Takes the call context manager out of the environment.
    #[must_use]
    pub fn into_contexts(self) -> CallContextManager {
        self.contexts
    }

    /// Gets the call context that most recently exited back to any frame.
    #[must_use]
    pub fn last_executed_sub_context(&self) -> Option<CallContextId> {
        self.last_executed_sub_context
    }

    /// Gets the stack of the current frame.
    #[must_use]
    pub fn stack(&self) -> &Stack {
        &self.frame.stack
    }

    /// Gets the stack of the current frame.
    #[must_use]
    pub fn stack_mut(&mut self) -> &mut Stack {
        &mut self.frame.stack
    }

    /// Gets the memory of the current frame.
    #[must_use]
    pub fn memory(&self) -> &Memory {
        &self.frame.memory
    }

    /// Gets the memory of the current frame.
    #[must_use]
    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.frame.memory
    }

    /// Gets the data most recently returned to the current frame by a
    /// sub-context.
    #[must_use]
    pub fn last_return_data(&self) -> &ByteGroup {
        &self.frame.return_data
    }

    /// Gets the step that made the current frame's return data available, if
    /// that call entered no sub-context and so its return data is only
    /// partially known.
    #[must_use]
    pub fn partial_return_data(&self) -> Option<StepIndex> {
        self.frame.partial_return_data
    }

    /// Gets the persistent storage.
    #[must_use]
    pub fn persistent_storage(&self) -> &AddressKeyStorage {
        &self.persistent_storage
    }

    /// Gets the transient storage.
    #[must_use]
    pub fn transient_storage(&self) -> &TransientStorage {
        &self.transient_storage
    }

    /// Gets the balance tracking.
    #[must_use]
    pub fn balances(&self) -> &Balances {
        &self.balances
    }

    /// Gets the number of snapshots of revertable state being held.
    #[must_use]
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    /// Commits `writes` made by the instruction at `step_index`, except for
    /// its balance modifications (see [`Self::commit_balances`]).
    ///
    /// Memory bytes that appear through expansion are attributed to
    /// `step_index`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if any of the writes cannot be applied to the current
    /// state.
    pub fn commit(&mut self, writes: &StorageWrites, step_index: StepIndex) -> storage::Result<()> {
        let stack = &mut self.frame.stack;
        for _ in 0..writes.stack_pops {
            stack.pop()?;
        }
        for (index, value) in &writes.stack_sets {
            stack.set(*index, value.clone())?;
        }
        for value in &writes.stack_pushes {
            stack.push(value.clone())?;
        }

        let memory = &mut self.frame.memory;
        for expansion in &writes.memory_expansions {
            memory.check_expansion(expansion.offset, expansion.size, step_index)?;
        }
        for write in &writes.memory {
            memory.set(write.offset, &write.value, step_index)?;
        }

        if let Some(data) = &writes.return_data {
            self.contexts.current_mut().return_data = data.clone();
        }
        if let Some(data) = &writes.sub_context_return_data {
            self.frame.return_data = data.clone();
            self.frame.partial_return_data = Some(step_index);
        }

        for write in &writes.persistent_storage {
            self.persistent_storage
                .set(write.address, write.key, write.value.clone())?;
        }
        for write in &writes.transient_storage {
            self.transient_storage
                .set(write.address, write.key, write.value.clone())?;
        }

        Ok(())
    }

    /// Commits the balance modifications in `writes` made by the instruction at
    /// `step_index`.
    pub fn commit_balances(&mut self, writes: &StorageWrites, step_index: StepIndex) {
        for address in &writes.balance_modifications {
            self.balances.modified_at(*address, step_index);
        }
    }

    /// Starts a fresh frame for the call context that `entered_by` has just
    /// entered, and snapshots the revertable state.
    pub fn enter_context(&mut self, entered_by: Instruction) {
        let frame = Frame::new(&self.config, Some(entered_by));
        self.suspended_frames
            .push(std::mem::replace(&mut self.frame, frame));
        self.snapshots.push(Snapshot {
            persistent_storage: self.persistent_storage.clone(),
            transient_storage:  self.transient_storage.clone(),
            balances:           self.balances.clone(),
        });
        self.check_snapshot_invariant();
    }

    /// Discards the frame of the call context `child`, which has just exited
    /// to its parent, and returns the instruction that entered it.
    ///
    /// The revertable state is restored from the snapshot taken on entry if
    /// the context reverted. The data it returned becomes the parent frame's
    /// return data, unless it was a successful contract creation.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if there is no frame to return to.
    pub fn exit_context(
        &mut self,
        child: CallContextId,
        step_index: StepIndex,
    ) -> Result<Instruction> {
        let parent_frame = self
            .suspended_frames
            .pop()
            .ok_or(Error::NoSuchFrame)
            .locate(step_index)?;
        let snapshot = self
            .snapshots
            .pop()
            .ok_or(Error::NoSuchFrame)
            .locate(step_index)?;
        let frame = std::mem::replace(&mut self.frame, parent_frame);

        let context = self.contexts.contexts().get(child);
        if context.reverted {
            debug!(context = %child, "Restoring storage and balances after revert");
            self.persistent_storage = snapshot.persistent_storage;
            self.transient_storage = snapshot.transient_storage;
            self.balances = snapshot.balances;
        }
        self.frame.return_data = if context.is_contract_initialization && !context.reverted {
            ByteGroup::new()
        } else {
            context.return_data.clone()
        };
        self.frame.partial_return_data = None;
        self.last_executed_sub_context = Some(child);
        self.check_snapshot_invariant();

        frame.entered_by.ok_or(Error::NoEnteringCall).locate(step_index)
    }

    fn check_snapshot_invariant(&self) {
        debug_assert_eq!(
            self.snapshots.len() + 1,
            self.depth() as usize,
            "Snapshots must track the call depth"
        );
        debug_assert_eq!(self.snapshots.len(), self.suspended_frames.len());
    }
}
