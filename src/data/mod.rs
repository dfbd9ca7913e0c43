//! This module contains the value types that the replay is built from.

pub mod address;
pub mod byte_group;

pub use address::Address;
pub use byte_group::{ByteGroup, StepIndex, Word};
