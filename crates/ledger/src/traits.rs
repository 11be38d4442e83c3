//! The ledger trait.

use hydra_types::Hash;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

/// A ledger: transaction and UTxO set types plus the operations the head
/// logic needs.
///
/// Implementations carry whatever parameters validation needs; the head
/// logic holds one instance and treats both associated types opaquely apart
/// from equality and the operations below.
///
/// # Guarantees required of implementations
///
/// - **Deterministic**: same UTxO set and transaction always produce the
///   same result. All honest parties must compute identical outcomes.
/// - **Canonical hashing**: [`Ledger::utxo_hash`] and [`Ledger::tx_id`] are
///   stable across processes and platforms; they feed the canonical
///   snapshot signing bytes.
pub trait Ledger: Clone + PartialEq + Eq + fmt::Debug + Send + Sync + 'static {
    /// Transaction type, opaque to the head logic.
    type Tx: Clone + PartialEq + Eq + fmt::Debug + Serialize + DeserializeOwned + Send + Sync;

    /// UTxO set type, opaque apart from equality and the set operations.
    type UTxO: Clone + PartialEq + Eq + fmt::Debug + Serialize + DeserializeOwned + Send + Sync;

    /// Validation error surfaced to clients as `TxInvalid`.
    type Error: std::error::Error + Send + Sync + 'static;

    /// The empty UTxO set.
    fn empty_utxo(&self) -> Self::UTxO;

    /// Apply a transaction, yielding the successor UTxO set.
    ///
    /// Errors distinguish a transaction that can never apply from one whose
    /// inputs are merely not visible yet via [`Ledger::missing_inputs`].
    fn apply_tx(&self, utxo: &Self::UTxO, tx: &Self::Tx) -> Result<Self::UTxO, Self::Error>;

    /// Whether the error means "inputs not present (yet)".
    ///
    /// The head logic retries such transactions under a TTL rather than
    /// rejecting them outright, since the missing inputs may be created by
    /// transactions still in flight.
    fn missing_inputs(&self, error: &Self::Error) -> bool;

    /// Union of two UTxO sets (used to fold per-party commits into the
    /// head's initial UTxO set).
    fn union(&self, a: &Self::UTxO, b: &Self::UTxO) -> Self::UTxO;

    /// Validate a UTxO set offered as a commit.
    ///
    /// The default accepts everything; ledgers with address eras can reject
    /// outputs the head's scripts cannot re-create at fanout.
    fn validate_commit(&self, _utxo: &Self::UTxO) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Canonical identifier of a transaction.
    fn tx_id(&self, tx: &Self::Tx) -> Hash;

    /// Canonical digest of a UTxO set.
    fn utxo_hash(&self, utxo: &Self::UTxO) -> Hash;

    /// Canonical digest of an ordered transaction sequence.
    fn txs_hash(&self, txs: &[Self::Tx]) -> Hash {
        let ids: Vec<[u8; 32]> = txs.iter().map(|tx| *self.tx_id(tx).as_bytes()).collect();
        let parts: Vec<&[u8]> = ids.iter().map(|id| id.as_slice()).collect();
        Hash::from_parts(&parts)
    }
}
