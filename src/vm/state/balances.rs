//! This module contains the balance tracking of the replay.

use std::collections::HashMap;

use crate::{
    constant::PRESTATE,
    data::{Address, StepIndex},
    error::storage::Result,
};

/// Tracks, for each account, the step at which its balance last changed.
///
/// Balance values themselves are never modelled, as the trace already records
/// them wherever they are observed. Only the dependency matters: a `BALANCE`
/// read depends on whichever step last moved value into or out of the account.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Balances {
    last_modified: HashMap<Address, StepIndex>,
}

impl Balances {
    /// Creates a new balance tracker where no balance has been modified.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that the balance of `address` changed at `step_index`.
    pub fn modified_at(&mut self, address: Address, step_index: StepIndex) {
        self.last_modified.insert(address, step_index);
    }

    /// Gets the step at which the balance of `address` was last modified, or
    /// [`PRESTATE`] if it has not been modified during the trace.
    #[must_use]
    pub fn last_modification(&self, address: Address) -> StepIndex {
        self.last_modified.get(&address).copied().unwrap_or(PRESTATE)
    }

    /// Gets the step at which the balance of the account with the raw address
    /// `bytes` was last modified.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if `bytes` is not a 20-byte address.
    pub fn get(&self, bytes: &[u8]) -> Result<StepIndex> {
        let address = Address::try_from(bytes)?;
        Ok(self.last_modification(address))
    }
}

#[cfg(test)]
mod test {
    use crate::{
        constant::PRESTATE,
        data::Address,
        error::storage::Error,
        vm::state::balances::Balances,
    };

    #[test]
    fn unknown_addresses_are_prestate() -> anyhow::Result<()> {
        let balances = Balances::new();
        assert_eq!(balances.get(&[1; 20])?, PRESTATE);

        Ok(())
    }

    #[test]
    fn tracks_the_latest_modification() -> anyhow::Result<()> {
        let mut balances = Balances::new();
        balances.modified_at(Address::new([1; 20]), 4);
        balances.modified_at(Address::new([1; 20]), 9);

        assert_eq!(balances.get(&[1; 20])?, 9);
        assert_eq!(balances.last_modification(Address::new([2; 20])), PRESTATE);

        Ok(())
    }

    #[test]
    fn malformed_addresses_are_errors() {
        let balances = Balances::new();
        assert_eq!(
            balances.get(&[1; 32]),
            Err(Error::InvalidAddress { length: 32 })
        );
    }
}
