//! This module contains the replay interpreter, which steps through a recorded
//! trace while reconstructing the provenance of every value the transaction
//! touched.

pub mod context;
pub mod environment;
pub mod state;

pub use context::{CallContext, CallContextId, CallContexts, CallTree, HaltType, Transition};
pub use environment::Environment;
use itertools::{EitherOrBoth, Itertools};
use tracing::{info, trace};

use crate::{
    constant::{DEFAULT_MEMORY_LIMIT_BYTES, DEFAULT_VERIFY_STORAGES, MAXIMUM_STACK_DEPTH},
    data::StepIndex,
    error::{
        container::Locatable,
        replay::{Error, Result},
    },
    opcode::Instruction,
    trace::{InstructionOutputOracle, TraceEvent},
    watchdog::DynWatchdog,
};

/// The interpreter that replays a single trace.
///
/// Each call to [`Tracer::step`] replays one recorded step, using the state
/// recorded for the following step as an oracle for the values that cannot be
/// derived without a full EVM. The replay is checked against the oracle after
/// every step unless [`Config::verify_storages`] is disabled.
///
/// Two traces can be replayed by two independent tracers, as they share no
/// state.
#[derive(Debug)]
pub struct Tracer {
    /// The state the replay has reconstructed so far.
    environment: Environment,

    /// The instructions replayed so far, indexed by step.
    instructions: Vec<Instruction>,

    /// The configuration of the replay.
    config: Config,

    /// A watchdog that gets polled at intervals to check whether the replay
    /// needs to stop.
    watchdog: DynWatchdog,
}

impl Tracer {
    /// Constructs a new tracer that replays a transaction starting in the
    /// `root` call context.
    #[must_use]
    pub fn new(root: CallContext, config: Config, watchdog: DynWatchdog) -> Self {
        let environment = Environment::new(root, config.clone());
        let instructions = Vec::new();
        Self {
            environment,
            instructions,
            config,
            watchdog,
        }
    }

    /// Replays every event in `events`, each paired with the oracle for the
    /// state that follows it (see [`crate::trace::with_oracles`]).
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if any step cannot be replayed. No partial result is
    /// returned.
    pub fn run(
        mut self,
        events: impl IntoIterator<Item = (TraceEvent, InstructionOutputOracle)>,
    ) -> Result<ReplayResult> {
        for (event, oracle) in events {
            self.step(&event, &oracle)?;
        }

        let result = self.consume();
        info!(
            steps = result.instructions.len(),
            contexts = result.contexts.len(),
            "Replay complete"
        );
        Ok(result)
    }

    /// Replays a single recorded `event`, where `oracle` describes the state
    /// recorded after it.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the event cannot be replayed against the current
    /// state, or if the replayed state disagrees with the oracle.
    pub fn step(
        &mut self,
        event: &TraceEvent,
        oracle: &InstructionOutputOracle,
    ) -> Result<&Instruction> {
        let step_index = self.environment.current_step_index();
        self.poll_watchdog(step_index)?;

        let replayed = self.environment.depth();
        if event.depth != replayed {
            return Err(Error::DepthOutOfSync {
                recorded: event.depth,
                replayed,
            }
            .locate(step_index));
        }

        let instruction = Instruction::parse(event, &self.environment, oracle)?;
        trace!(
            step = step_index,
            pc = instruction.program_counter(),
            depth = replayed,
            "{}",
            instruction.name()
        );
        self.environment.increment_step();

        if let Some(writes) = instruction.writes() {
            self.environment
                .commit(writes, step_index)
                .map_err(Error::from)
                .locate(step_index)?;
        }

        if instruction.opcode().can_enter_context() && oracle.depth == Some(replayed) {
            let writes = instruction.immediate_return_writes(oracle)?;
            self.environment
                .commit(&writes, step_index)
                .map_err(Error::from)
                .locate(step_index)?;
        }

        let transition = match oracle.depth {
            Some(next_depth) => self
                .environment
                .contexts_mut()
                .update(&instruction, next_depth)?,
            None => Transition::Stay,
        };
        let reverted_exit = match transition {
            Transition::Stay => false,
            Transition::Enter(_) => {
                self.environment.enter_context(instruction.clone());
                // The callee's starting stack cannot be derived from the caller.
                self.environment
                    .stack_mut()
                    .overwrite(&oracle.stack, step_index)
                    .map_err(Error::from)
                    .locate(step_index)?;
                false
            }
            Transition::Exit { from, .. } => {
                let entered_by = self.environment.exit_context(from, step_index)?;
                let child = self.environment.contexts().contexts().get(from);
                let reverted = child.reverted;
                let writes = entered_by.return_writes(child, oracle, step_index)?;
                self.environment
                    .commit(&writes, step_index)
                    .map_err(Error::from)
                    .locate(step_index)?;
                reverted
            }
        };

        // Value moved by a step that ends its context in a revert never lands.
        if let Some(writes) = instruction.writes().filter(|_| !reverted_exit) {
            self.environment.commit_balances(writes, step_index);
        }

        if !instruction.implemented_flow() && transition == Transition::Stay {
            self.environment
                .stack_mut()
                .overwrite(&oracle.stack, step_index)
                .map_err(Error::from)
                .locate(step_index)?;
        }

        if self.config.verify_storages && oracle.depth.is_some() {
            self.verify(oracle).locate(step_index)?;
        }

        self.instructions.push(instruction);
        Ok(&self.instructions[self.instructions.len() - 1])
    }

    /// Gets the state reconstructed so far.
    #[must_use]
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Gets the instructions replayed so far.
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Gets the configuration of the replay.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consumes the tracer to produce the result of the replay so far.
    #[must_use]
    pub fn consume(self) -> ReplayResult {
        let (contexts, call_tree) = self.environment.into_contexts().into_parts();
        ReplayResult {
            instructions: self.instructions,
            contexts,
            call_tree,
        }
    }

    fn poll_watchdog(&self, step_index: StepIndex) -> Result<()> {
        let poll_interval = self.watchdog.poll_every().max(1);
        let step = usize::try_from(step_index).unwrap_or_default();
        if step % poll_interval == 0 && self.watchdog.should_stop() {
            return Err(Error::StoppedByWatchdog { step: step_index }.locate(step_index));
        }

        Ok(())
    }

    /// Checks the current stack and memory against those recorded in `oracle`.
    ///
    /// Memory is compared ignoring trailing zeroes, as tracers differ in how
    /// much of the untouched memory they record.
    fn verify(&self, oracle: &InstructionOutputOracle) -> std::result::Result<(), Error> {
        let replayed = self.environment.stack().values();
        let mismatch = replayed
            .iter()
            .zip_longest(&oracle.stack)
            .enumerate()
            .find_map(|(position, pair)| match pair {
                EitherOrBoth::Both(value, word) if value.bytes() == word.as_slice() => None,
                EitherOrBoth::Both(value, word) => Some(format!(
                    "item {position} from the bottom is {value} but 0x{} was recorded",
                    hex::encode(word)
                )),
                EitherOrBoth::Left(value) => Some(format!(
                    "item {position} from the bottom is {value} but nothing was recorded"
                )),
                EitherOrBoth::Right(word) => Some(format!(
                    "item {position} from the bottom is missing but 0x{} was recorded",
                    hex::encode(word)
                )),
            });
        if let Some(message) = mismatch {
            return Err(Error::StackMismatch { message });
        }

        let Some(recorded) = &oracle.memory else {
            return Ok(());
        };
        let replayed = trim_trailing_zeroes(self.environment.memory().data().bytes());
        let recorded = trim_trailing_zeroes(recorded);
        if replayed != recorded {
            let offset = replayed
                .iter()
                .zip_longest(recorded)
                .position(|pair| !matches!(pair, EitherOrBoth::Both(a, b) if a == b))
                .unwrap_or_default();
            return Err(Error::MemoryMismatch {
                message: format!(
                    "first difference at offset {offset} (replayed {} bytes, recorded {} bytes)",
                    replayed.len(),
                    recorded.len()
                ),
            });
        }

        Ok(())
    }
}

fn trim_trailing_zeroes(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    &bytes[..end]
}

/// The result of replaying a whole trace.
#[derive(Clone, Debug)]
pub struct ReplayResult {
    /// The replayed instructions, indexed by step.
    pub instructions: Vec<Instruction>,

    /// Every call context entered during the replay.
    pub contexts: CallContexts,

    /// The tree formed by the call contexts.
    pub call_tree: CallTree,
}

impl ReplayResult {
    /// Gets the call context that `instruction` executed in.
    #[must_use]
    pub fn context_of(&self, instruction: &Instruction) -> &CallContext {
        self.contexts.get(instruction.call_context())
    }
}

/// The configuration for the replay.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// Whether to check the replayed stack and memory against the trace after
    /// every step.
    ///
    /// Defaults to [`DEFAULT_VERIFY_STORAGES`].
    pub verify_storages: bool,

    /// The maximum size that the memory of any call frame may grow to.
    ///
    /// Defaults to [`DEFAULT_MEMORY_LIMIT_BYTES`].
    pub memory_limit_bytes: usize,

    /// The maximum number of items the stack of any call frame may hold.
    ///
    /// Defaults to [`MAXIMUM_STACK_DEPTH`].
    pub maximum_stack_depth: usize,
}

impl Config {
    /// Sets the `verify_storages` config parameter to `value`.
    #[must_use]
    pub fn with_verify_storages(mut self, value: bool) -> Self {
        self.verify_storages = value;
        self
    }

    /// Sets the `memory_limit_bytes` config parameter to `value`.
    #[must_use]
    pub fn with_memory_limit_bytes(mut self, value: usize) -> Self {
        self.memory_limit_bytes = value;
        self
    }

    /// Sets the `maximum_stack_depth` config parameter to `value`.
    #[must_use]
    pub fn with_maximum_stack_depth(mut self, value: usize) -> Self {
        self.maximum_stack_depth = value;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        let verify_storages = DEFAULT_VERIFY_STORAGES;
        let memory_limit_bytes = DEFAULT_MEMORY_LIMIT_BYTES;
        let maximum_stack_depth = MAXIMUM_STACK_DEPTH;
        Self {
            verify_storages,
            memory_limit_bytes,
            maximum_stack_depth,
        }
    }
}
