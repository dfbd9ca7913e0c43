//! This module contains the state tracking functionality for the replayer.

use std::fmt::Debug;

use crate::{graph::InformationFlowGraph, vm, vm::ReplayResult, watchdog::DynWatchdog};

/// A marker trait that says that the type implementing it is a replayer
/// state.
///
/// Replayer states can be transitioned between as part of the
/// [`crate::replayer::Replayer`] state machine, and are intended to enforce
/// that correct state transitions take place.
pub trait State
where
    Self: Debug + Sized,
{
}

/// The initial state for the replayer.
#[derive(Debug)]
pub struct Ready {
    /// The configuration for the replay.
    pub vm_config: vm::Config,

    /// The watchdog that is monitoring the progress of the replay.
    pub watchdog: DynWatchdog,
}
impl State for Ready {}

/// The replayer has replayed the whole trace.
#[derive(Debug)]
pub struct Replayed {
    /// The result of the replay.
    pub result: ReplayResult,
}
impl State for Replayed {}

/// The replayer has built the information flow graph of the replayed trace.
#[derive(Debug)]
pub struct GraphBuilt {
    /// The result of the replay.
    pub result: ReplayResult,

    /// The information flow graph between the replayed steps.
    pub graph: InformationFlowGraph,
}
impl State for GraphBuilt {}
