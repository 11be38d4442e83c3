//! Chain collaborator interface: observations in, posting requests out.

use hydra_ledger::{ConfirmedSnapshot, Ledger};
use hydra_types::{Hash, HeadId, HeadParameters, Party};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Position of a chain state in the chain's own order.
///
/// Rollbacks are expressed as "back to slot N"; the checkpoint ring keyed by
/// slot decides how far head state unwinds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ChainSlot(pub u64);

/// Opaque chain-side state relevant to the head's script addresses.
///
/// The head logic never interprets `value`; it only threads the latest
/// observed state through transitions and restores it on rollback.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChainState {
    /// Chain position this state was observed at.
    pub slot: ChainSlot,
    /// Whatever the chain client needs to resume observation.
    pub value: serde_json::Value,
}

impl ChainState {
    /// Chain state at a given slot with no payload.
    pub fn at_slot(slot: u64) -> Self {
        Self {
            slot: ChainSlot(slot),
            value: serde_json::Value::Null,
        }
    }
}

/// Head-relevant transactions observed on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "", tag = "tag")]
pub enum Observation<L: Ledger> {
    /// A head was initialized with these parameters.
    #[serde(rename_all = "camelCase")]
    Init {
        head_id: HeadId,
        parameters: HeadParameters,
        /// The seed output consumed by the init transaction.
        seed: Hash,
    },
    /// A party committed a UTxO set into the initializing head.
    #[serde(rename_all = "camelCase")]
    Commit {
        head_id: HeadId,
        party: Party,
        utxo: L::UTxO,
    },
    /// All commits were collected; the head is open.
    #[serde(rename_all = "camelCase")]
    CollectCom { head_id: HeadId },
    /// The head was aborted before opening.
    #[serde(rename_all = "camelCase")]
    Abort { head_id: HeadId },
    /// The head was closed with a snapshot.
    #[serde(rename_all = "camelCase")]
    Close {
        head_id: HeadId,
        snapshot_number: u64,
        /// Deadline after which fanout becomes possible.
        contestation_deadline: SystemTime,
    },
    /// A party contested the close with a higher snapshot.
    #[serde(rename_all = "camelCase")]
    Contest {
        head_id: HeadId,
        snapshot_number: u64,
    },
    /// The head's final UTxO set was fanned out back to the chain.
    #[serde(rename_all = "camelCase")]
    Fanout { head_id: HeadId },
}

impl<L: Ledger> Observation<L> {
    /// The head this observation belongs to.
    pub fn head_id(&self) -> &HeadId {
        match self {
            Observation::Init { head_id, .. }
            | Observation::Commit { head_id, .. }
            | Observation::CollectCom { head_id }
            | Observation::Abort { head_id }
            | Observation::Close { head_id, .. }
            | Observation::Contest { head_id, .. }
            | Observation::Fanout { head_id } => head_id,
        }
    }
}

/// Events delivered by the chain observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "", tag = "tag")]
pub enum ChainEvent<L: Ledger> {
    /// A head-relevant transaction was observed in a block.
    #[serde(rename_all = "camelCase")]
    Observation {
        observed: Observation<L>,
        new_chain_state: ChainState,
    },
    /// The chain rolled back; observations after this state are void.
    #[serde(rename_all = "camelCase")]
    Rollback { rolled_back_to: ChainState },
    /// A previously requested posting failed.
    ///
    /// Observation remains the source of truth: a failed post whose effect
    /// is later observed anyway is not an error.
    #[serde(rename_all = "camelCase")]
    PostTxFailed {
        failed_tx: PostChainTx<L>,
        reason: String,
    },
}

/// Chain transactions the head logic asks the chain collaborator to post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "", tag = "tag")]
pub enum PostChainTx<L: Ledger> {
    /// Initialize a new head.
    #[serde(rename_all = "camelCase")]
    InitTx { parameters: HeadParameters },
    /// Commit a UTxO set into the initializing head.
    #[serde(rename_all = "camelCase")]
    CommitTx {
        head_id: HeadId,
        party: Party,
        utxo: L::UTxO,
    },
    /// Abort before the head opens, releasing the commits made so far.
    #[serde(rename_all = "camelCase")]
    AbortTx { head_id: HeadId, utxo: L::UTxO },
    /// Collect all commits, opening the head.
    #[serde(rename_all = "camelCase")]
    CollectComTx { head_id: HeadId },
    /// Close the head with the latest confirmed snapshot.
    #[serde(rename_all = "camelCase")]
    CloseTx {
        head_id: HeadId,
        confirmed_snapshot: ConfirmedSnapshot<L>,
    },
    /// Contest a close with a higher confirmed snapshot.
    #[serde(rename_all = "camelCase")]
    ContestTx {
        head_id: HeadId,
        confirmed_snapshot: ConfirmedSnapshot<L>,
    },
    /// Distribute the final UTxO set back to the chain.
    #[serde(rename_all = "camelCase")]
    FanoutTx { head_id: HeadId, utxo: L::UTxO },
}

impl<L: Ledger> PostChainTx<L> {
    /// Transaction kind name for logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            PostChainTx::InitTx { .. } => "InitTx",
            PostChainTx::CommitTx { .. } => "CommitTx",
            PostChainTx::AbortTx { .. } => "AbortTx",
            PostChainTx::CollectComTx { .. } => "CollectComTx",
            PostChainTx::CloseTx { .. } => "CloseTx",
            PostChainTx::ContestTx { .. } => "ContestTx",
            PostChainTx::FanoutTx { .. } => "FanoutTx",
        }
    }
}

/// Handle for posting transactions to the chain.
///
/// Posting is fire-and-forget: the logic never waits for submission.
/// Success shows up later as an observation; failure comes back through the
/// input queue as [`ChainEvent::PostTxFailed`].
pub trait Chain<L: Ledger>: Send + Sync {
    /// Request submission of a chain transaction.
    fn post(&self, tx: PostChainTx<L>);
}

impl<L: Ledger, C: Chain<L> + ?Sized> Chain<L> for std::sync::Arc<C> {
    fn post(&self, tx: PostChainTx<L>) {
        (**self).post(tx)
    }
}
