//! This module contains the catalogue of opcode behaviours, describing for
//! each opcode how information flows through it.
//!
//! Most opcodes are described by a flow [`Node`]. The few whose behaviour is
//! not modelled use an [`IoSpec`] that only says how many stack items they
//! consume and produce, and the replay takes the whole stack from the trace
//! after they execute.

use crate::{
    constant::WORD_SIZE_BYTES,
    flow::node::{
        arg,
        args,
        balance,
        balance_transfer,
        calldata_range,
        combine,
        constant,
        mem_expand,
        mem_range,
        mem_write,
        oracle,
        oracle_mem_range,
        peek,
        push,
        return_data_range,
        return_data_write,
        selfdestruct,
        stack_set,
        storage_load,
        storage_store,
        to_size,
        transient_load,
        transient_store,
        Node,
    },
    opcode::Opcode,
};

/// The stack effect of an opcode whose information flow is not modelled.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct IoSpec {
    pub stack_inputs:  usize,
    pub stack_outputs: usize,
}

/// How the behaviour of an opcode is described.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum InstructionSpec {
    Flow(Node),
    Io(IoSpec),
}

impl InstructionSpec {
    /// Gets the number of stack items consumed by the opcode.
    #[must_use]
    pub fn arg_count(&self) -> usize {
        match self {
            Self::Flow(node) => node.arg_count(),
            Self::Io(io) => io.stack_inputs,
        }
    }

    /// Checks if the behaviour is a modelled information flow.
    #[must_use]
    pub fn implemented_flow(&self) -> bool {
        matches!(self, Self::Flow(_))
    }
}

/// Consumes `count` arguments and pushes the result recorded in the trace.
fn computed(count: usize) -> Node {
    combine(args(count).chain([push(oracle(0))]))
}

/// A constant-sized word literal.
fn word_size() -> Node {
    constant([WORD_SIZE_BYTES as u8])
}

fn io(stack_inputs: usize, stack_outputs: usize) -> InstructionSpec {
    InstructionSpec::Io(IoSpec {
        stack_inputs,
        stack_outputs,
    })
}

impl Opcode {
    /// Gets the description of how information flows through the opcode.
    ///
    /// Opcodes that can enter a call context only describe what happens in
    /// the calling frame before the call. What the call leaves behind once it
    /// returns is described by [`crate::opcode::Instruction::return_writes`].
    #[must_use]
    #[allow(clippy::match_same_arms)] // Grouped by EVM section for readability
    pub fn spec(self) -> InstructionSpec {
        let flow = match self {
            Self::Stop | Self::JumpDest => combine([]),

            // Arithmetic, comparison and bitwise logic
            Self::Add
            | Self::Mul
            | Self::Sub
            | Self::Div
            | Self::SDiv
            | Self::Mod
            | Self::SMod
            | Self::Exp
            | Self::SignExtend
            | Self::Lt
            | Self::Gt
            | Self::SLt
            | Self::SGt
            | Self::Eq
            | Self::And
            | Self::Or
            | Self::Xor
            | Self::Byte
            | Self::Shl
            | Self::Shr
            | Self::Sar => computed(2),
            Self::AddMod | Self::MulMod => computed(3),
            Self::IsZero | Self::Not => computed(1),
            Self::Keccak256 => combine([mem_range(arg(0), arg(1)), push(oracle(0))]),

            // Environment
            Self::Address
            | Self::Origin
            | Self::Caller
            | Self::CallValue
            | Self::CodeSize
            | Self::GasPrice
            | Self::Coinbase
            | Self::Timestamp
            | Self::Number
            | Self::PrevRandao
            | Self::GasLimit
            | Self::ChainId
            | Self::BaseFee
            | Self::PC
            | Self::MSize
            | Self::Gas => computed(0),
            Self::Balance => push(balance(arg(0))),
            Self::SelfBalance => push(Node::SelfBalance),
            Self::ExtCodeSize | Self::ExtCodeHash | Self::BlockHash => computed(1),
            Self::CallDataLoad => push(calldata_range(arg(0), word_size())),
            Self::CallDataSize => push(Node::CalldataSize),
            Self::CallDataCopy => mem_write(arg(0), calldata_range(arg(1), arg(2))),
            Self::CodeCopy => combine([
                arg(1),
                mem_write(arg(0), oracle_mem_range(arg(0), arg(2))),
            ]),
            Self::ExtCodeCopy => combine([
                arg(0),
                arg(2),
                mem_write(arg(1), oracle_mem_range(arg(1), arg(3))),
            ]),
            Self::ReturnDataSize => push(Node::ReturnDataSize),
            Self::ReturnDataCopy => mem_write(arg(0), return_data_range(arg(0), arg(1), arg(2))),
            Self::BlobHash => return io(1, 1),
            Self::BlobBaseFee => return io(0, 1),

            // Stack, memory and storage
            Self::Pop => arg(0),
            Self::MLoad => push(mem_range(arg(0), word_size())),
            Self::MStore => mem_write(arg(0), arg(1)),
            Self::MStore8 => mem_write(arg(0), to_size(arg(1), 1)),
            Self::MCopy => mem_write(arg(0), mem_range(arg(1), arg(2))),
            Self::SLoad => push(storage_load(arg(0))),
            Self::SStore => storage_store(arg(0), arg(1)),
            Self::TLoad => push(transient_load(arg(0))),
            Self::TStore => transient_store(arg(0), arg(1)),
            Self::Push(_) => push(oracle(0)),
            Self::Dup(n) => push(peek(usize::from(n) - 1)),
            Self::Swap(n) => {
                let n = usize::from(n);
                combine([stack_set(0, peek(n)), stack_set(n, peek(0))])
            }

            // Control flow
            Self::Jump => arg(0),
            Self::JumpI => combine(args(2)),

            // Logging
            Self::Log(topics) => combine(
                [mem_range(arg(0), arg(1))]
                    .into_iter()
                    .chain(args(2 + usize::from(topics)).skip(2)),
            ),

            // Calls and creation
            Self::Create => combine([
                mem_range(arg(1), arg(2)),
                balance_transfer(Node::CreatedAddress, arg(0)),
            ]),
            Self::Create2 => combine([
                mem_range(arg(1), arg(2)),
                arg(3),
                balance_transfer(Node::CreatedAddress, arg(0)),
            ]),
            Self::Call => combine([
                arg(0),
                mem_range(arg(3), arg(4)),
                mem_expand(arg(5), arg(6)),
                balance_transfer(arg(1), arg(2)),
            ]),
            Self::CallCode => combine([
                arg(0),
                arg(1),
                arg(2),
                mem_range(arg(3), arg(4)),
                mem_expand(arg(5), arg(6)),
            ]),
            Self::DelegateCall | Self::StaticCall => combine([
                arg(0),
                arg(1),
                mem_range(arg(2), arg(3)),
                mem_expand(arg(4), arg(5)),
            ]),
            Self::Return | Self::Revert => return_data_write(mem_range(arg(0), arg(1))),
            Self::SelfDestruct => selfdestruct(arg(0)),

            Self::Invalid | Self::Unknown(_) => return io(0, 0),
        };

        InstructionSpec::Flow(flow)
    }
}
