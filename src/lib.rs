//! This library replays recorded [EVM](https://ethereum.org/en/developers/docs/evm/)
//! execution traces at instruction granularity, tracking for every byte of the
//! stack, memory and storage which step of the trace produced it.
//!
//! It exists to find transaction-order dependence: by replaying the trace of a
//! transaction in its normal position and the trace of the same transaction
//! after an attacker's, the earliest instruction that observed a different
//! state can be located, along with the values that changed as a result.
//!
//! Note that this library does not execute EVM code. Every value it cannot
//! derive from earlier steps, such as the result of an `ADD` or an `SLOAD` of
//! a slot never written in the trace, is taken from the state that the trace
//! records for the following step.
//!
//! # How it Works
//!
//! From a very high level, a replay is performed as follows:
//!
//! 1. The trace is read into a sequence of [`trace::TraceEvent`]s, each paired
//!    with the [`trace::InstructionOutputOracle`] describing the state after
//!    it.
//! 2. The [`vm::Tracer`] steps through the events. Each executed opcode is
//!    described by a [`flow::Node`] from the [`opcode`] catalogue, which is
//!    evaluated against the [`vm::Environment`] to produce an
//!    [`opcode::Instruction`] recording its provenance-tagged inputs and
//!    outputs.
//! 3. The call contexts are tracked as the depth of the trace changes, and
//!    persistent storage and balances are restored whenever a context
//!    reverts.
//! 4. The [`graph::InformationFlowGraph`] links every step to the steps that
//!    produced the values it read.
//! 5. The [`compare`] module matches the instructions of two replays to find
//!    where they diverge.
//!
//! # Basic Usage
//!
//! ```
//! use std::collections::BTreeSet;
//!
//! use tod_replayer as tr;
//! use tod_replayer::{
//!     data::Address,
//!     replayer::ParsingInfo,
//!     trace,
//!     vm,
//!     watchdog::LazyWatchdog,
//! };
//!
//! let events = trace::read_events(
//!     concat!(
//!         r#"{"pc":0,"op":"PUSH1","stack":[],"depth":1}"#,
//!         "\n",
//!         r#"{"pc":2,"op":"PUSH1","stack":["0x2a"],"depth":1}"#,
//!         "\n",
//!         r#"{"pc":4,"op":"SSTORE","stack":["0x2a","0x0"],"depth":1}"#,
//!         "\n",
//!         r#"{"pc":5,"op":"STOP","stack":[],"depth":1}"#,
//!     )
//!     .as_bytes(),
//! )
//! .unwrap();
//!
//! let info = ParsingInfo::new(Address::default(), Address::default(), vec![]);
//! let replayer = tr::new(info, vm::Config::default(), LazyWatchdog.in_arc())
//!     .analyze(events)
//!     .unwrap();
//!
//! assert_eq!(replayer.result().instructions.len(), 4);
//! assert_eq!(replayer.graph().producers_of(2), BTreeSet::from([0, 1]));
//! ```

#![warn(clippy::all, clippy::cargo, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)] // Allows for better API naming

pub mod compare;
pub mod constant;
pub mod data;
pub mod error;
pub mod flow;
pub mod graph;
pub mod opcode;
pub mod replayer;
pub mod trace;
pub mod vm;
pub mod watchdog;

// Re-exports to provide the library interface.
pub use graph::{build_information_flow_graph, InformationFlowGraph};
pub use replayer::{new, parse_instructions, ParsingInfo};
