//! Peer protocol messages.

use hydra_ledger::Ledger;
use hydra_types::{Hash, Party, Signature};
use serde::{Deserialize, Serialize};

/// Messages exchanged between the parties of a head.
///
/// Sender identity and authenticity come from the signed network envelope,
/// not from fields here; `AckSn` additionally carries the acknowledging
/// party because the snapshot signature is protocol content in its own
/// right.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "", tag = "tag")]
pub enum Message<L: Ledger> {
    /// Request to include a transaction in the head.
    #[serde(rename_all = "camelCase")]
    ReqTx {
        /// The transaction to apply to the seen ledger state.
        transaction: L::Tx,
    },

    /// Snapshot proposal by the current snapshot leader.
    ///
    /// Transactions are referenced by id; every recipient must already hold
    /// them from prior `ReqTx` messages (or will shortly, the request is
    /// retried under a TTL).
    #[serde(rename_all = "camelCase")]
    ReqSn {
        /// Proposed snapshot number.
        snapshot_number: u64,
        /// Ids of the transactions to confirm, in application order.
        transaction_ids: Vec<Hash>,
    },

    /// Signature over the canonical bytes of the in-flight snapshot.
    #[serde(rename_all = "camelCase")]
    AckSn {
        /// The acknowledging party.
        party: Party,
        /// Snapshot number being acknowledged.
        snapshot_number: u64,
        /// Signature over the candidate's canonical bytes.
        signature: Signature,
    },

    /// Periodic liveness beacon.
    #[serde(rename_all = "camelCase")]
    Heartbeat {
        /// The sending party.
        party: Party,
    },
}

impl<L: Ledger> Message<L> {
    /// Message kind name for logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Message::ReqTx { .. } => "ReqTx",
            Message::ReqSn { .. } => "ReqSn",
            Message::AckSn { .. } => "AckSn",
            Message::Heartbeat { .. } => "Heartbeat",
        }
    }
}
