//! This module contains constants that are needed throughout the codebase.

use crate::data::byte_group::StepIndex;

/// The step index used to attribute bytes that existed before the trace began.
///
/// Untouched memory, storage slots read without a prior write in the trace,
/// and the transaction's calldata are all attributed to this sentinel.
pub const PRESTATE: StepIndex = -1;

/// The maximum stack depth for the EVM.
pub const MAXIMUM_STACK_DEPTH: usize = 1024;

/// The width of a word on the EVM in bytes.
pub const WORD_SIZE_BYTES: usize = 32;

/// The width of an address on the EVM in bytes.
pub const ADDRESS_SIZE_BYTES: usize = 20;

/// The base byte value for the `PUSH` opcode.
///
/// This is constructed such that for `PUSHN`, `PUSH_OPCODE_BASE_VALUE` + `N`
/// equals the byte value for the corresponding `PUSH` opcode.
pub const PUSH_OPCODE_BASE_VALUE: u8 = 0x5f;

/// The base byte value for the `DUP` opcode.
///
/// This is constructed such that for `DUPN`, `DUP_OPCODE_BASE_VALUE` + `N`
/// equals the byte value for the corresponding `DUP` opcode.
pub const DUP_OPCODE_BASE_VALUE: u8 = 0x7f;

/// The base byte value for the `SWAP` opcode.
///
/// This is constructed such that for `SWAPN`, `SWAP_OPCODE_BASE_VALUE` + `N`
/// equals the byte value for the corresponding `SWAP` opcode.
pub const SWAP_OPCODE_BASE_VALUE: u8 = 0x8f;

/// The base byte value for the `LOG` opcode.
///
/// This is constructed such that for `LOGN`, `LOG_OPCODE_BASE_VALUE` + `N`
/// equals the byte value for the corresponding `LOG` opcode.
pub const LOG_OPCODE_BASE_VALUE: u8 = 0xa0;

/// The maximum number of bytes that can be pushed at once using the `PUSH`
/// opcode.
pub const PUSH_OPCODE_MAX_BYTES: u8 = 32;

/// The default upper bound on the size of a single call frame's memory.
///
/// A real transaction cannot come close to this within the block gas limit, so
/// hitting it means the trace is malformed.
pub const DEFAULT_MEMORY_LIMIT_BYTES: usize = 32 * 1024 * 1024;

/// The default for whether the replay checks its reconstructed stack and
/// memory against the recorded trace after every step.
pub const DEFAULT_VERIFY_STORAGES: bool = true;

/// The default number of steps the replayer will take before polling the
/// watchdog.
pub const DEFAULT_WATCHDOG_POLL_LOOP_ITERATIONS: usize = 100;
