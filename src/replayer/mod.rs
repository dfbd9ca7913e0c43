//! This module contains the definition of the replayer, which drives a trace
//! from its events to its information flow graph.

pub mod parsing_info;
pub mod state;

pub use parsing_info::ParsingInfo;

use crate::{
    error,
    graph::InformationFlowGraph,
    replayer::state::State,
    trace::{self, TraceEvent},
    vm,
    vm::{ReplayResult, Tracer},
    watchdog::{DynWatchdog, LazyWatchdog},
};

/// Creates a new replayer for the transaction described by `parsing_info`,
/// with the provided `vm_config` and `watchdog`.
///
/// The `verify_storages` flag of the `parsing_info` takes precedence over the
/// one in the `vm_config`.
#[must_use]
pub fn new(
    parsing_info: ParsingInfo,
    vm_config: vm::Config,
    watchdog: DynWatchdog,
) -> Replayer<state::Ready> {
    let vm_config = vm_config.with_verify_storages(parsing_info.verify_storages);
    let state = state::Ready {
        vm_config,
        watchdog,
    };
    Replayer {
        parsing_info,
        state,
    }
}

/// Replays `events` for the transaction described by `parsing_info` with the
/// default configuration, returning the replayed instructions and the call
/// tree.
///
/// # Errors
///
/// Returns [`Err`] if any step of the trace cannot be replayed.
pub fn parse_instructions(
    parsing_info: ParsingInfo,
    events: impl IntoIterator<Item = TraceEvent>,
) -> error::Result<ReplayResult> {
    let replayer = new(parsing_info, vm::Config::default(), LazyWatchdog.in_arc());
    let replayer = replayer.replay(events)?;
    Ok(replayer.state.result)
}

/// The `Replayer` is responsible for taking the events of a trace and turning
/// them into replayed instructions and their information flow graph.
///
/// # Enforcing Valid State Transitions
///
/// The replayer enforces that only correct state transitions can occur through
/// use of structs that implement the exact state required by it at any given
/// point.
///
/// There is the [`Self::state`] function that provides access to the state data
/// of whichever state the replayer is currently in.
#[derive(Debug)]
pub struct Replayer<S: State> {
    /// The transaction whose trace is being replayed.
    parsing_info: ParsingInfo,

    /// The internal state of the replayer.
    state: S,
}

/// The safe operations available in all states.
impl<S: State> Replayer<S> {
    /// Gets a reference to the transaction whose trace is being replayed.
    pub fn parsing_info(&self) -> &ParsingInfo {
        &self.parsing_info
    }

    /// Gets an immutable reference to the current state of the replayer.
    pub fn state(&self) -> &S {
        &self.state
    }
}

/// Unsafe operations available in all states.
///
/// These operations are capable of **violating the state invariants** of the
/// replayer, and must be used with the _utmost_ care.
impl<S: State> Replayer<S> {
    /// Gets a mutable reference to the current state of the replayer.
    ///
    /// # Safety
    ///
    /// Do not mutate the state instance unless you totally understand the
    /// state that the replayer is in, and the implications of doing so.
    pub unsafe fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    /// Forces the replayer into the state `NS`, with the value of the state
    /// created by applying `transform` to the replayer's current state and
    /// disregarding any safety with regard to state transitions.
    ///
    /// # Safety
    ///
    /// Do not force a state transition for the replayer unless you totally
    /// understand the state that the replayer is in, and the implications
    /// of doing so.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the provided `transform` returns [`Err`].
    pub unsafe fn transform_state<NS: State>(
        self,
        transform: impl FnOnce(S) -> error::Result<NS>,
    ) -> error::Result<Replayer<NS>> {
        let state = transform(self.state)?;
        let parsing_info = self.parsing_info;

        Ok(Replayer {
            parsing_info,
            state,
        })
    }
}

/// A type that allows the user to easily name the initial state of the
/// replayer.
pub type InitialReplayer = Replayer<state::Ready>;

/// Operations available on a newly-created replayer.
impl Replayer<state::Ready> {
    /// Performs the whole process from beginning to end, replaying `events`
    /// and building the information flow graph.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if any step of the trace cannot be replayed.
    pub fn analyze(
        self,
        events: impl IntoIterator<Item = TraceEvent>,
    ) -> error::Result<Replayer<state::GraphBuilt>> {
        let replayer = self.replay(events)?;
        Ok(replayer.build_graph())
    }

    /// Replays `events`, each of which is checked against the one that follows
    /// it.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if any step of the trace cannot be replayed.
    pub fn replay(
        self,
        events: impl IntoIterator<Item = TraceEvent>,
    ) -> error::Result<Replayer<state::Replayed>> {
        let root = self.parsing_info.root_context();
        unsafe {
            self.transform_state(|old_state| {
                let tracer = Tracer::new(root, old_state.vm_config, old_state.watchdog);
                let result = tracer.run(trace::with_oracles(events))?;
                Ok(state::Replayed { result })
            })
        }
    }
}

/// Operations available on a replayer that has replayed its trace.
impl Replayer<state::Replayed> {
    /// Builds the information flow graph between the replayed steps.
    #[must_use]
    pub fn build_graph(self) -> Replayer<state::GraphBuilt> {
        let result = self.state.result;
        let graph = InformationFlowGraph::build(&result.instructions);
        Replayer {
            parsing_info: self.parsing_info,
            state:        state::GraphBuilt { result, graph },
        }
    }

    /// Gets the result of the replay.
    #[must_use]
    pub fn result(&self) -> &ReplayResult {
        &self.state.result
    }
}

/// Operations available on a replayer that has built its graph.
impl Replayer<state::GraphBuilt> {
    /// Gets the result of the replay.
    #[must_use]
    pub fn result(&self) -> &ReplayResult {
        &self.state.result
    }

    /// Gets the information flow graph between the replayed steps.
    #[must_use]
    pub fn graph(&self) -> &InformationFlowGraph {
        &self.state.graph
    }

    /// Consumes the replayer to get its result and graph.
    #[must_use]
    pub fn into_parts(self) -> (ReplayResult, InformationFlowGraph) {
        (self.state.result, self.state.graph)
    }
}
