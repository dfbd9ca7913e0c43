//! This module contains the description of the transaction whose trace is
//! being replayed.

use serde::Deserialize;

use crate::{
    constant::DEFAULT_VERIFY_STORAGES,
    data::Address,
    error,
    vm::CallContext,
};

/// What the replay needs to know about the transaction that produced a trace.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParsingInfo {
    /// The account that sent the transaction.
    pub sender: Address,

    /// The account the transaction was sent to.
    pub to: Address,

    /// The input data of the transaction.
    pub calldata: Vec<u8>,

    /// Whether to check the replay against the trace after every step.
    ///
    /// Defaults to [`DEFAULT_VERIFY_STORAGES`].
    pub verify_storages: bool,
}

impl ParsingInfo {
    /// Creates the description of a transaction from `sender` to `to` with the
    /// provided `calldata`.
    #[must_use]
    pub fn new(sender: Address, to: Address, calldata: impl Into<Vec<u8>>) -> Self {
        let calldata = calldata.into();
        let verify_storages = DEFAULT_VERIFY_STORAGES;
        Self {
            sender,
            to,
            calldata,
            verify_storages,
        }
    }

    /// Sets whether the replay is checked against the trace to `value`.
    #[must_use]
    pub fn with_verify_storages(mut self, value: bool) -> Self {
        self.verify_storages = value;
        self
    }

    /// Reads the description of a transaction from the JSON object in `json`,
    /// which must have the hex-encoded fields `from`, `to` and `input`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if `json` is not such an object.
    pub fn from_json(json: &str) -> error::Result<Self> {
        let raw: RawTransaction = serde_json::from_str(json)
            .map_err(|e| error::Error::other(format!("Invalid transaction: {e}")))?;
        let sender = raw.from.parse().map_err(|_| error::Error::other("Invalid `from`"))?;
        let to = raw.to.parse().map_err(|_| error::Error::other("Invalid `to`"))?;
        let input = raw.input.strip_prefix("0x").unwrap_or(&raw.input);
        let calldata = hex::decode(input).map_err(|_| error::Error::other("Invalid `input`"))?;

        Ok(Self::new(sender, to, calldata))
    }

    /// Creates the call context that the transaction starts executing in.
    #[must_use]
    pub fn root_context(&self) -> CallContext {
        CallContext::root(self.sender, self.to, self.calldata.clone())
    }
}

/// The parts of a JSON transaction object that the replay cares about.
#[derive(Debug, Deserialize)]
struct RawTransaction {
    from:  String,
    to:    String,
    #[serde(default)]
    input: String,
}
