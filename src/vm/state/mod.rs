//! The storage primitives that the replay environment is built from. Each of
//! them holds [`crate::data::ByteGroup`]s and so tracks the provenance of
//! everything stored in it.

pub mod balances;
pub mod memory;
pub mod stack;
pub mod storage;

pub use balances::Balances;
pub use memory::Memory;
pub use stack::Stack;
pub use storage::{AddressKeyStorage, TransientStorage};
