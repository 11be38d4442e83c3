//! Snapshot agreement artifacts.

use crate::traits::Ledger;
use hydra_types::{snapshot_signing_message, Hash, HeadId, MultiSignature};
use serde::{Deserialize, Serialize};

/// A point-in-time agreement on the head's UTxO set.
///
/// Snapshot numbers strictly increase; number 0 is reserved for the initial
/// snapshot represented by [`ConfirmedSnapshot::Initial`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "", rename_all = "camelCase")]
pub struct Snapshot<L: Ledger> {
    /// Strictly increasing snapshot number.
    pub number: u64,
    /// The agreed UTxO set after applying `confirmed_transactions`.
    pub utxo: L::UTxO,
    /// Transactions confirmed by this snapshot, in application order.
    pub confirmed_transactions: Vec<L::Tx>,
}

impl<L: Ledger> Snapshot<L> {
    /// Canonical signing bytes of this snapshot.
    ///
    /// Every party signs exactly these bytes; see
    /// [`hydra_types::snapshot_signing_message`] for the layout.
    pub fn signing_message(&self, ledger: &L, head_id: &HeadId) -> Vec<u8> {
        snapshot_signing_message(
            head_id,
            self.number,
            &ledger.utxo_hash(&self.utxo),
            &ledger.txs_hash(&self.confirmed_transactions),
        )
    }

    /// Ids of the confirmed transactions, in order.
    pub fn tx_ids(&self, ledger: &L) -> Vec<Hash> {
        self.confirmed_transactions
            .iter()
            .map(|tx| ledger.tx_id(tx))
            .collect()
    }
}

/// The latest snapshot a party considers confirmed.
///
/// Either the implicit snapshot 0 right after collect (the union of all
/// commits, no transactions), or a numbered snapshot carrying a signature
/// from every party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "", tag = "tag")]
pub enum ConfirmedSnapshot<L: Ledger> {
    /// Snapshot 0: the post-collect UTxO set, confirmed by the chain itself.
    #[serde(rename_all = "camelCase")]
    Initial {
        /// Union of all committed UTxO sets.
        utxo: L::UTxO,
    },
    /// A numbered snapshot confirmed by unanimous multi-signature.
    #[serde(rename_all = "camelCase")]
    Confirmed {
        /// The agreed snapshot.
        snapshot: Snapshot<L>,
        /// One valid signature per party over the snapshot's canonical bytes.
        signatures: MultiSignature,
    },
}

impl<L: Ledger> ConfirmedSnapshot<L> {
    /// The snapshot number (0 for the initial snapshot).
    pub fn number(&self) -> u64 {
        match self {
            ConfirmedSnapshot::Initial { .. } => 0,
            ConfirmedSnapshot::Confirmed { snapshot, .. } => snapshot.number,
        }
    }

    /// The confirmed UTxO set.
    pub fn utxo(&self) -> &L::UTxO {
        match self {
            ConfirmedSnapshot::Initial { utxo } => utxo,
            ConfirmedSnapshot::Confirmed { snapshot, .. } => &snapshot.utxo,
        }
    }
}
