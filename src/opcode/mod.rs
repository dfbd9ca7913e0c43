//! This module contains the [`Opcode`] enum covering every byte value the EVM
//! can execute, the catalogue that describes the information flow of each one
//! (see [`catalogue`]), and the [`Instruction`] record produced for every
//! replayed step.

pub mod catalogue;
pub mod instruction;
mod macros;

pub use catalogue::{InstructionSpec, IoSpec};
pub use instruction::Instruction;

use crate::constant::{
    DUP_OPCODE_BASE_VALUE,
    LOG_OPCODE_BASE_VALUE,
    PUSH_OPCODE_BASE_VALUE,
    PUSH_OPCODE_MAX_BYTES,
    SWAP_OPCODE_BASE_VALUE,
};

macros::opcodes! {
    Stop = 0x00, "STOP";
    Add = 0x01, "ADD";
    Mul = 0x02, "MUL";
    Sub = 0x03, "SUB";
    Div = 0x04, "DIV";
    SDiv = 0x05, "SDIV";
    Mod = 0x06, "MOD";
    SMod = 0x07, "SMOD";
    AddMod = 0x08, "ADDMOD";
    MulMod = 0x09, "MULMOD";
    Exp = 0x0a, "EXP";
    SignExtend = 0x0b, "SIGNEXTEND";
    Lt = 0x10, "LT";
    Gt = 0x11, "GT";
    SLt = 0x12, "SLT";
    SGt = 0x13, "SGT";
    Eq = 0x14, "EQ";
    IsZero = 0x15, "ISZERO";
    And = 0x16, "AND";
    Or = 0x17, "OR";
    Xor = 0x18, "XOR";
    Not = 0x19, "NOT";
    Byte = 0x1a, "BYTE";
    Shl = 0x1b, "SHL";
    Shr = 0x1c, "SHR";
    Sar = 0x1d, "SAR";
    Keccak256 = 0x20, "KECCAK256";
    Address = 0x30, "ADDRESS";
    Balance = 0x31, "BALANCE";
    Origin = 0x32, "ORIGIN";
    Caller = 0x33, "CALLER";
    CallValue = 0x34, "CALLVALUE";
    CallDataLoad = 0x35, "CALLDATALOAD";
    CallDataSize = 0x36, "CALLDATASIZE";
    CallDataCopy = 0x37, "CALLDATACOPY";
    CodeSize = 0x38, "CODESIZE";
    CodeCopy = 0x39, "CODECOPY";
    GasPrice = 0x3a, "GASPRICE";
    ExtCodeSize = 0x3b, "EXTCODESIZE";
    ExtCodeCopy = 0x3c, "EXTCODECOPY";
    ReturnDataSize = 0x3d, "RETURNDATASIZE";
    ReturnDataCopy = 0x3e, "RETURNDATACOPY";
    ExtCodeHash = 0x3f, "EXTCODEHASH";
    BlockHash = 0x40, "BLOCKHASH";
    Coinbase = 0x41, "COINBASE";
    Timestamp = 0x42, "TIMESTAMP";
    Number = 0x43, "NUMBER";
    PrevRandao = 0x44, "PREVRANDAO";
    GasLimit = 0x45, "GASLIMIT";
    ChainId = 0x46, "CHAINID";
    SelfBalance = 0x47, "SELFBALANCE";
    BaseFee = 0x48, "BASEFEE";
    BlobHash = 0x49, "BLOBHASH";
    BlobBaseFee = 0x4a, "BLOBBASEFEE";
    Pop = 0x50, "POP";
    MLoad = 0x51, "MLOAD";
    MStore = 0x52, "MSTORE";
    MStore8 = 0x53, "MSTORE8";
    SLoad = 0x54, "SLOAD";
    SStore = 0x55, "SSTORE";
    Jump = 0x56, "JUMP";
    JumpI = 0x57, "JUMPI";
    PC = 0x58, "PC";
    MSize = 0x59, "MSIZE";
    Gas = 0x5a, "GAS";
    JumpDest = 0x5b, "JUMPDEST";
    TLoad = 0x5c, "TLOAD";
    TStore = 0x5d, "TSTORE";
    MCopy = 0x5e, "MCOPY";
    Create = 0xf0, "CREATE";
    Call = 0xf1, "CALL";
    CallCode = 0xf2, "CALLCODE";
    Return = 0xf3, "RETURN";
    DelegateCall = 0xf4, "DELEGATECALL";
    Create2 = 0xf5, "CREATE2";
    StaticCall = 0xfa, "STATICCALL";
    Revert = 0xfd, "REVERT";
    Invalid = 0xfe, "INVALID";
    SelfDestruct = 0xff, "SELFDESTRUCT";
}

impl Opcode {
    /// Decodes the opcode with the provided byte value.
    ///
    /// Every byte decodes to something, with bytes that the EVM does not
    /// define becoming [`Opcode::Unknown`].
    #[must_use]
    pub fn from_byte(byte: u8) -> Self {
        if let Some(opcode) = Self::from_fixed_byte(byte) {
            return opcode;
        }

        match byte {
            0x5f..=0x7f => Self::Push(byte - PUSH_OPCODE_BASE_VALUE),
            0x80..=0x8f => Self::Dup(byte - DUP_OPCODE_BASE_VALUE),
            0x90..=0x9f => Self::Swap(byte - SWAP_OPCODE_BASE_VALUE),
            0xa0..=0xa4 => Self::Log(byte - LOG_OPCODE_BASE_VALUE),
            _ => Self::Unknown(byte),
        }
    }

    /// Gets the byte representation of the opcode.
    #[must_use]
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Push(n) => PUSH_OPCODE_BASE_VALUE + n,
            Self::Dup(n) => DUP_OPCODE_BASE_VALUE + n,
            Self::Swap(n) => SWAP_OPCODE_BASE_VALUE + n,
            Self::Log(n) => LOG_OPCODE_BASE_VALUE + n,
            Self::Unknown(byte) => byte,
            fixed => fixed.fixed_byte(),
        }
    }

    /// Gets the mnemonic for the opcode, as it appears in traces.
    #[must_use]
    pub fn as_text_code(self) -> String {
        match self {
            Self::Push(n) => format!("PUSH{n}"),
            Self::Dup(n) => format!("DUP{n}"),
            Self::Swap(n) => format!("SWAP{n}"),
            Self::Log(n) => format!("LOG{n}"),
            Self::Unknown(byte) => format!("UNKNOWN_0x{byte:02x}"),
            fixed => fixed.fixed_name().to_string(),
        }
    }

    /// Decodes an opcode from its `mnemonic`.
    ///
    /// Historical aliases (`SHA3`, `DIFFICULTY` and `RANDOM`) are accepted, as
    /// older tracers still emit them.
    #[must_use]
    pub fn from_text_code(mnemonic: &str) -> Option<Self> {
        let mnemonic = mnemonic.to_ascii_uppercase();
        match mnemonic.as_str() {
            "SHA3" => return Some(Self::Keccak256),
            "DIFFICULTY" | "RANDOM" => return Some(Self::PrevRandao),
            "SUICIDE" => return Some(Self::SelfDestruct),
            _ => (),
        }
        if let Some(opcode) = Self::from_fixed_name(&mnemonic) {
            return Some(opcode);
        }

        let numbered = |prefix: &str, range: std::ops::RangeInclusive<u8>| {
            mnemonic
                .strip_prefix(prefix)
                .and_then(|n| n.parse::<u8>().ok())
                .filter(|n| range.contains(n))
        };
        numbered("PUSH", 0..=PUSH_OPCODE_MAX_BYTES)
            .map(Self::Push)
            .or_else(|| numbered("DUP", 1..=16).map(Self::Dup))
            .or_else(|| numbered("SWAP", 1..=16).map(Self::Swap))
            .or_else(|| numbered("LOG", 0..=4).map(Self::Log))
    }

    /// Gets the number of arguments that the opcode takes from the stack.
    #[must_use]
    pub fn arg_count(self) -> usize {
        self.spec().arg_count()
    }

    /// Checks if the opcode is one of the message calls.
    #[must_use]
    pub fn is_call(self) -> bool {
        matches!(
            self,
            Self::Call | Self::CallCode | Self::DelegateCall | Self::StaticCall
        )
    }

    /// Checks if the opcode creates a contract.
    #[must_use]
    pub fn is_create(self) -> bool {
        matches!(self, Self::Create | Self::Create2)
    }

    /// Checks if executing the opcode can enter a new call context.
    #[must_use]
    pub fn can_enter_context(self) -> bool {
        self.is_call() || self.is_create()
    }

    /// Checks if the opcode enters a new call context that has its own
    /// storage, rather than executing foreign code against the caller's.
    #[must_use]
    pub fn enters_with_storage(self) -> bool {
        matches!(
            self,
            Self::Call | Self::StaticCall | Self::Create | Self::Create2
        )
    }

    /// Checks if the opcode is one of those that end a call context normally.
    #[must_use]
    pub fn is_halt(self) -> bool {
        matches!(
            self,
            Self::Stop | Self::Return | Self::Revert | Self::SelfDestruct
        )
    }
}
