//! This module contains the representation of EVM account addresses.

use std::{
    fmt::{Debug, Display, Formatter},
    str::FromStr,
};

use sha3::{Digest, Keccak256};

use crate::{
    constant::ADDRESS_SIZE_BYTES,
    data::byte_group::{ByteGroup, StepIndex},
    error::storage::Error,
};

/// A 20-byte account address.
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Address([u8; ADDRESS_SIZE_BYTES]);

impl Address {
    /// Wraps the provided raw `bytes` as an address.
    #[must_use]
    pub fn new(bytes: [u8; ADDRESS_SIZE_BYTES]) -> Self {
        Self(bytes)
    }

    /// Gets the raw bytes of the address.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE_BYTES] {
        &self.0
    }

    /// Takes the address out of the low 20 bytes of a word-sized `value`, as
    /// the EVM does for address arguments on the stack.
    #[must_use]
    pub fn from_word_group(value: &ByteGroup) -> Self {
        let word = value.as_word();
        let mut bytes = [0u8; ADDRESS_SIZE_BYTES];
        bytes.copy_from_slice(&word[word.len() - ADDRESS_SIZE_BYTES..]);
        Self(bytes)
    }

    /// Creates a byte group of the 20 address bytes attributed to
    /// `step_index`.
    #[must_use]
    pub fn to_group(&self, step_index: StepIndex) -> ByteGroup {
        ByteGroup::from_bytes(self.0.to_vec(), step_index)
    }

    /// Computes the placeholder address used for contracts created by the
    /// account at `self`.
    ///
    /// This is the low 20 bytes of the keccak hash of the creator's address.
    /// It is not the real `CREATE`/`CREATE2` derivation, which would need the
    /// creator's nonce or the init code hash.
    #[must_use]
    pub fn created_contract(&self) -> Self {
        let hash = Keccak256::digest(self.0);
        let mut bytes = [0u8; ADDRESS_SIZE_BYTES];
        bytes.copy_from_slice(&hash[hash.len() - ADDRESS_SIZE_BYTES..]);
        Self(bytes)
    }
}

/// Addresses can only be made from exactly 20 bytes.
impl TryFrom<&[u8]> for Address {
    type Error = Error;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; ADDRESS_SIZE_BYTES] = value
            .try_into()
            .map_err(|_| Error::InvalidAddress {
                length: value.len(),
            })?;
        Ok(Self(bytes))
    }
}

/// Parses a hex address with or without the `0x` prefix.
impl FromStr for Address {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = [0u8; ADDRESS_SIZE_BYTES];
        hex::decode_to_slice(digits, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Debug for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Address({self})")
    }
}

#[cfg(test)]
mod test {
    use crate::{
        data::{address::Address, byte_group::ByteGroup},
        error::storage::Error,
    };

    #[test]
    fn can_parse_with_and_without_prefix() -> anyhow::Result<()> {
        let with: Address = "0x00000000000000000000000000000000000000aa".parse()?;
        let without: Address = "00000000000000000000000000000000000000aa".parse()?;

        assert_eq!(with, without);
        assert_eq!(with.as_bytes()[19], 0xaa);

        Ok(())
    }

    #[test]
    fn rejects_malformed_lengths() {
        let result = Address::try_from([0u8; 19].as_slice());
        assert_eq!(result, Err(Error::InvalidAddress { length: 19 }));
    }

    #[test]
    fn takes_address_from_low_bytes_of_word() {
        let mut word = vec![0xffu8; 12];
        word.extend([0x11; 20]);
        let address = Address::from_word_group(&ByteGroup::from_bytes(word, 0));

        assert_eq!(address, Address::new([0x11; 20]));
    }

    #[test]
    fn created_contract_addresses_are_deterministic() {
        let creator = Address::new([0x42; 20]);
        assert_eq!(creator.created_contract(), creator.created_contract());
        assert_ne!(creator.created_contract(), creator);
    }
}
