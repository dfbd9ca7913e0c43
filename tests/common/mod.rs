//! This module contains common utilities for simplifying the writing of
//! integration tests for this library.
//!
//! Traces are built with a [`TraceBuilder`], which keeps a model of the stack
//! of each call frame so that the recorded stacks are consistent from one
//! step to the next.

#![cfg(test)]

use tod_replayer as tr;
use tod_replayer::{
    constant::WORD_SIZE_BYTES,
    data::{Address, Word},
    opcode::{Instruction, Opcode},
    replayer::{state::GraphBuilt, ParsingInfo, Replayer},
    trace::TraceEvent,
    vm,
    vm::ReplayResult,
    watchdog::LazyWatchdog,
};

/// The account that sends every test transaction.
pub const SENDER: u64 = 0xaa;

/// The account that every test transaction is sent to.
pub const RECEIVER: u64 = 0xbb;

/// Converts `value` into a stack word.
pub fn word(value: u64) -> Word {
    let mut result = [0u8; WORD_SIZE_BYTES];
    result[WORD_SIZE_BYTES - 8..].copy_from_slice(&value.to_be_bytes());
    result
}

/// Converts `value` into an address.
pub fn address(value: u64) -> Address {
    let word = word(value);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&word[WORD_SIZE_BYTES - 20..]);
    Address::new(bytes)
}

/// Builds a trace step by step, tracking the stack of every call frame.
#[derive(Debug)]
pub struct TraceBuilder {
    events:    Vec<TraceEvent>,
    depth:     u32,
    stack:     Vec<u64>,
    suspended: Vec<Vec<u64>>,
    memory:    Option<Vec<u8>>,
    pc:        u64,
}

#[allow(unused)] // Not every test uses every builder method
impl TraceBuilder {
    /// Starts a trace at depth 1 with an empty stack.
    pub fn new() -> Self {
        Self {
            events:    Vec::new(),
            depth:     1,
            stack:     Vec::new(),
            suspended: Vec::new(),
            memory:    None,
            pc:        0,
        }
    }

    fn emit(&mut self, opcode: Opcode) {
        self.events.push(TraceEvent {
            program_counter: self.pc,
            opcode,
            stack: self.stack.iter().map(|v| word(*v)).collect(),
            depth: self.depth,
            memory: self.memory.clone(),
        });
        self.pc += 1;
    }

    /// Records `memory` as the memory of the executing frame for every step
    /// from the next one on.
    pub fn memory(mut self, memory: Vec<u8>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Records a `PUSH1` of `value`.
    pub fn push(mut self, value: u64) -> Self {
        self.emit(Opcode::Push(1));
        self.stack.push(value);
        self
    }

    /// Records a `PUSH1` of each of `values` in turn, so the last of them ends
    /// up on top of the stack.
    pub fn push_all(self, values: &[u64]) -> Self {
        values.iter().fold(self, |builder, value| builder.push(*value))
    }

    /// Pushes the arguments of a call with no value, input or output to `to`,
    /// so that `gas` ends up on top of the stack.
    pub fn call_args(self, opcode: Opcode, to: u64, value: u64) -> Self {
        self.call_args_with_output(opcode, to, value, 0, 0)
    }

    /// Pushes the arguments of a call with no input to `to`, reserving
    /// `out_size` bytes of memory at `out_offset` for its output.
    pub fn call_args_with_output(
        self,
        opcode: Opcode,
        to: u64,
        value: u64,
        out_offset: u64,
        out_size: u64,
    ) -> Self {
        match opcode {
            Opcode::Call | Opcode::CallCode => {
                self.push_all(&[out_size, out_offset, 0, 0, value, to, 0xffff])
            }
            _ => self.push_all(&[out_size, out_offset, 0, 0, to, 0xffff]),
        }
    }

    /// Records `opcode` executing without changing depth, consuming `pops`
    /// stack items and then pushing `pushes`.
    pub fn exec(mut self, opcode: Opcode, pops: usize, pushes: &[u64]) -> Self {
        self.emit(opcode);
        self.pop(pops);
        self.stack.extend_from_slice(pushes);
        self
    }

    /// Records `opcode` entering a new call frame, consuming `pops` stack items
    /// from the caller.
    pub fn enter(mut self, opcode: Opcode, pops: usize) -> Self {
        self.emit(opcode);
        self.pop(pops);
        self.suspended.push(std::mem::take(&mut self.stack));
        self.depth += 1;
        self
    }

    /// Records `opcode` ending the current call frame after consuming `pops`
    /// stack items, with the caller receiving `result`.
    pub fn exit(mut self, opcode: Opcode, pops: usize, result: u64) -> Self {
        self.emit(opcode);
        self.pop(pops);
        self.stack = self.suspended.pop().expect("A frame to return to");
        self.stack.push(result);
        self.depth -= 1;
        self
    }

    /// Records a call that does not enter a new frame, as for a precompile or
    /// an account without code.
    pub fn call_without_entering(self, opcode: Opcode, pops: usize, result: u64) -> Self {
        self.exec(opcode, pops, &[result])
    }

    /// Finishes the trace with a `STOP` in the current frame.
    pub fn stop(mut self) -> Vec<TraceEvent> {
        self.emit(Opcode::Stop);
        self.events
    }

    /// Finishes the trace without adding a step.
    pub fn build(self) -> Vec<TraceEvent> {
        self.events
    }

    /// Gets the step index the next recorded step will have.
    pub fn next_step(&self) -> i64 {
        i64::try_from(self.events.len()).expect("Trace fits in an i64")
    }

    fn pop(&mut self, count: usize) {
        let remaining = self
            .stack
            .len()
            .checked_sub(count)
            .expect("Enough items on the modelled stack");
        self.stack.truncate(remaining);
    }
}

/// Creates the description of a transaction from [`SENDER`] to [`RECEIVER`]
/// without any input.
#[allow(unused)] // It is actually
pub fn parsing_info() -> ParsingInfo {
    ParsingInfo::new(address(SENDER), address(RECEIVER), Vec::new())
}

/// Replays `events` with the default configuration, checking the replay
/// against the trace after every step.
#[allow(unused)] // It is actually
pub fn replay(events: Vec<TraceEvent>) -> anyhow::Result<ReplayResult> {
    Ok(tr::parse_instructions(parsing_info(), events)?)
}

/// Replays `events` and builds their information flow graph.
#[allow(unused)] // It is actually
pub fn analyze(events: Vec<TraceEvent>) -> anyhow::Result<Replayer<GraphBuilt>> {
    let replayer = tr::new(parsing_info(), vm::Config::default(), LazyWatchdog.in_arc());
    Ok(replayer.analyze(events)?)
}

/// Gets the `occurrence`-th replayed instruction with `opcode`.
#[allow(unused)] // It is actually
pub fn find(result: &ReplayResult, opcode: Opcode, occurrence: usize) -> &Instruction {
    result
        .instructions
        .iter()
        .filter(|i| i.opcode() == opcode)
        .nth(occurrence)
        .expect("The instruction was replayed")
}
