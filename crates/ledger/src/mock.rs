//! Reference in-memory ledger with an input/output transaction model.
//!
//! Outputs live in a `BTreeMap` keyed by output reference, which gives a
//! stable iteration order and therefore a canonical JSON encoding for
//! hashing. Good enough to exercise every head-logic path; the production
//! ledger plugs in behind the same [`Ledger`] trait.

use crate::traits::Ledger;
use hydra_types::Hash;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Reference to a transaction output.
///
/// Renders as `"<tx id hex>#<index>"`, the usual UTxO reference notation,
/// which doubles as the JSON object key for UTxO sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxIn {
    /// Id of the transaction that created the output.
    pub tx_id: Hash,
    /// Output index within that transaction.
    pub index: u32,
}

impl fmt::Display for TxIn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.tx_id, self.index)
    }
}

impl FromStr for TxIn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tx_id, index) = s
            .split_once('#')
            .ok_or_else(|| format!("malformed output reference: {s}"))?;
        Ok(TxIn {
            tx_id: Hash::from_hex(tx_id).map_err(|e| e.to_string())?,
            index: index.parse().map_err(|_| format!("bad index in: {s}"))?,
        })
    }
}

impl Serialize for TxIn {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TxIn {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Output address. Legacy addresses exist on the main chain but cannot be
/// recreated by the head's fanout scripts, so commits carrying them are
/// rejected.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "era", content = "address", rename_all = "camelCase")]
pub enum Address {
    Native(String),
    Legacy(String),
}

/// A transaction output: an address holding a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    pub address: Address,
    pub value: u64,
}

impl TxOut {
    /// A native-address output.
    pub fn new(address: impl Into<String>, value: u64) -> Self {
        Self {
            address: Address::Native(address.into()),
            value,
        }
    }

    /// A legacy-address output (rejected at commit).
    pub fn legacy(address: impl Into<String>, value: u64) -> Self {
        Self {
            address: Address::Legacy(address.into()),
            value,
        }
    }
}

/// A UTxO set: output reference → output.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UtxoSet(BTreeMap<TxIn, TxOut>);

impl UtxoSet {
    /// The empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from explicit entries (test fixtures mostly).
    pub fn from_entries(entries: impl IntoIterator<Item = (TxIn, TxOut)>) -> Self {
        Self(entries.into_iter().collect())
    }

    /// A set seeded with outputs of a synthetic genesis transaction.
    ///
    /// The genesis id is derived from the outputs, so differently funded
    /// sets never collide on output references.
    pub fn genesis(outputs: &[TxOut]) -> Self {
        let content = serde_json::to_vec(outputs).expect("outputs are JSON");
        let tx_id = Hash::from_parts(&[b"genesis", &content]);
        Self(
            outputs
                .iter()
                .enumerate()
                .map(|(index, out)| {
                    (
                        TxIn {
                            tx_id,
                            index: index as u32,
                        },
                        out.clone(),
                    )
                })
                .collect(),
        )
    }

    /// Number of outputs.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set holds no outputs.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate output references.
    pub fn references(&self) -> impl Iterator<Item = TxIn> + '_ {
        self.0.keys().copied()
    }

    /// Iterate outputs with their references.
    pub fn iter(&self) -> impl Iterator<Item = (&TxIn, &TxOut)> {
        self.0.iter()
    }

    /// Whether `input` is an unspent output of this set.
    pub fn contains(&self, input: &TxIn) -> bool {
        self.0.contains_key(input)
    }

    /// Total value held by the set.
    pub fn total_value(&self) -> u64 {
        self.0.values().map(|out| out.value).sum()
    }

    fn insert(&mut self, input: TxIn, output: TxOut) {
        self.0.insert(input, output);
    }

    fn remove(&mut self, input: &TxIn) -> Option<TxOut> {
        self.0.remove(input)
    }
}

/// A transaction spending inputs and creating outputs.
///
/// The id is derived from the content, so equal content means equal id on
/// every party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockTx {
    pub id: Hash,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
}

impl MockTx {
    /// Build a transaction, deriving its id from the canonical content.
    pub fn new(inputs: Vec<TxIn>, outputs: Vec<TxOut>) -> Self {
        let content = serde_json::to_vec(&(&inputs, &outputs)).expect("mock tx content is JSON");
        Self {
            id: Hash::from_bytes(&content),
            inputs,
            outputs,
        }
    }
}

/// Validation errors of the mock ledger.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MockValidationError {
    /// An input is not present in the UTxO set.
    #[error("Input {tx_id}#{index} not found in UTxO set")]
    MissingInput { tx_id: Hash, index: u32 },

    /// Outputs create more value than inputs spend.
    #[error("Transaction creates value: inputs {consumed}, outputs {produced}")]
    ValueNotPreserved { consumed: u64, produced: u64 },

    /// A transaction must spend at least one input.
    #[error("Transaction spends no inputs")]
    NoInputs,

    /// A committed output uses a legacy address the fanout cannot recreate.
    #[error("Unsupported legacy output at address {address}")]
    UnsupportedLegacyOutput { address: String },
}

/// The reference ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MockLedger;

impl Ledger for MockLedger {
    type Tx = MockTx;
    type UTxO = UtxoSet;
    type Error = MockValidationError;

    fn empty_utxo(&self) -> UtxoSet {
        UtxoSet::new()
    }

    fn apply_tx(&self, utxo: &UtxoSet, tx: &MockTx) -> Result<UtxoSet, MockValidationError> {
        if tx.inputs.is_empty() {
            return Err(MockValidationError::NoInputs);
        }

        let mut next = utxo.clone();
        let mut consumed = 0u64;
        for input in &tx.inputs {
            match next.remove(input) {
                Some(out) => consumed += out.value,
                None => {
                    return Err(MockValidationError::MissingInput {
                        tx_id: input.tx_id,
                        index: input.index,
                    })
                }
            }
        }

        let produced: u64 = tx.outputs.iter().map(|out| out.value).sum();
        if produced > consumed {
            return Err(MockValidationError::ValueNotPreserved { consumed, produced });
        }

        for (index, output) in tx.outputs.iter().enumerate() {
            next.insert(
                TxIn {
                    tx_id: tx.id,
                    index: index as u32,
                },
                output.clone(),
            );
        }
        Ok(next)
    }

    fn missing_inputs(&self, error: &MockValidationError) -> bool {
        matches!(error, MockValidationError::MissingInput { .. })
    }

    fn union(&self, a: &UtxoSet, b: &UtxoSet) -> UtxoSet {
        let mut merged = a.clone();
        for (input, output) in b.iter() {
            merged.insert(*input, output.clone());
        }
        merged
    }

    fn validate_commit(&self, utxo: &UtxoSet) -> Result<(), MockValidationError> {
        for (_, output) in utxo.iter() {
            if let Address::Legacy(address) = &output.address {
                return Err(MockValidationError::UnsupportedLegacyOutput {
                    address: address.clone(),
                });
            }
        }
        Ok(())
    }

    fn tx_id(&self, tx: &MockTx) -> Hash {
        tx.id
    }

    fn utxo_hash(&self, utxo: &UtxoSet) -> Hash {
        let encoded = serde_json::to_vec(utxo).expect("utxo set is JSON");
        Hash::from_bytes(&encoded)
    }
}
