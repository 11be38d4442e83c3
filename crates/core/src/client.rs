//! Client API payloads.

use crate::chain::PostChainTx;
use hydra_ledger::{Ledger, Snapshot};
use hydra_types::{HeadId, MultiSignature, Party};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Commands a client can issue over the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "", tag = "tag")]
pub enum ClientCommand<L: Ledger> {
    /// Initialize a new head with the configured parties.
    Init,
    /// Abort an initializing head.
    Abort,
    /// Commit a UTxO set into the initializing head.
    #[serde(rename_all = "camelCase")]
    Commit { utxo: L::UTxO },
    /// Submit a transaction to the open head.
    #[serde(rename_all = "camelCase")]
    NewTx { transaction: L::Tx },
    /// Query the latest confirmed UTxO set.
    #[serde(rename = "GetUTxO")]
    GetUTxO,
    /// Close the open head.
    Close,
    /// Contest a close with our higher snapshot.
    Contest,
    /// Distribute the final UTxO set after the contestation deadline.
    Fanout,
}

impl<L: Ledger> ClientCommand<L> {
    /// Command name for logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            ClientCommand::Init => "Init",
            ClientCommand::Abort => "Abort",
            ClientCommand::Commit { .. } => "Commit",
            ClientCommand::NewTx { .. } => "NewTx",
            ClientCommand::GetUTxO => "GetUTxO",
            ClientCommand::Close => "Close",
            ClientCommand::Contest => "Contest",
            ClientCommand::Fanout => "Fanout",
        }
    }
}

/// Outputs delivered to API subscribers.
///
/// Every variant is tagged so clients can dispatch on `tag`; the runtime
/// wraps each delivered output with `{seq, timestamp}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "", tag = "tag")]
pub enum ServerOutput<L: Ledger> {
    /// A peer resumed sending heartbeats.
    #[serde(rename_all = "camelCase")]
    PeerConnected { peer: Party },
    /// A peer missed enough heartbeats to be considered down.
    #[serde(rename_all = "camelCase")]
    PeerDisconnected { peer: Party },
    /// Sent once to every new API connection.
    #[serde(rename_all = "camelCase")]
    Greetings { me: Party, head_status: String },

    /// An init transaction for our head was observed.
    #[serde(rename_all = "camelCase")]
    HeadIsInitializing { head_id: HeadId, parties: Vec<Party> },
    /// A party's commit was observed.
    #[serde(rename_all = "camelCase")]
    Committed {
        head_id: HeadId,
        party: Party,
        utxo: L::UTxO,
    },
    /// The collect transaction was observed; the head is open.
    #[serde(rename_all = "camelCase")]
    HeadIsOpen { head_id: HeadId, utxo: L::UTxO },
    /// A close was observed; the contestation period is running.
    #[serde(rename_all = "camelCase")]
    HeadIsClosed {
        head_id: HeadId,
        snapshot_number: u64,
        contestation_deadline: SystemTime,
    },
    /// A contest was observed; the deadline was extended.
    #[serde(rename_all = "camelCase")]
    HeadIsContested {
        head_id: HeadId,
        snapshot_number: u64,
    },
    /// The contestation deadline has passed; fanout may be posted.
    #[serde(rename_all = "camelCase")]
    ReadyToFanout { head_id: HeadId },
    /// An abort was observed; the head is final without opening.
    #[serde(rename_all = "camelCase")]
    HeadIsAborted { head_id: HeadId, utxo: L::UTxO },
    /// The fanout was observed; the head is final.
    #[serde(rename_all = "camelCase")]
    HeadIsFinalized { head_id: HeadId, utxo: L::UTxO },

    /// A command was invalid in the current state.
    #[serde(rename_all = "camelCase")]
    CommandFailed {
        client_input: ClientCommand<L>,
        reason: String,
    },
    /// A transaction was validated into the seen ledger state.
    #[serde(rename_all = "camelCase")]
    TxValid { head_id: HeadId, transaction: L::Tx },
    /// A transaction failed validation.
    #[serde(rename_all = "camelCase")]
    TxInvalid {
        head_id: HeadId,
        utxo: L::UTxO,
        transaction: L::Tx,
        validation_error: String,
    },
    /// A snapshot collected signatures from every party.
    #[serde(rename_all = "camelCase")]
    SnapshotConfirmed {
        head_id: HeadId,
        snapshot: Snapshot<L>,
        signatures: MultiSignature,
    },
    /// Response to `GetUTxO`.
    #[serde(rename = "GetUTxOResponse", rename_all = "camelCase")]
    GetUTxOResponse { head_id: HeadId, utxo: L::UTxO },

    /// The client sent something unparseable.
    #[serde(rename_all = "camelCase")]
    InvalidInput { reason: String, input: String },
    /// A requested chain posting failed.
    #[serde(rename_all = "camelCase")]
    PostTxOnChainFailed {
        post_chain_tx: PostChainTx<L>,
        reason: String,
    },
    /// A chain rollback rewound the head state.
    #[serde(rename_all = "camelCase")]
    RolledBack,
}

impl<L: Ledger> ServerOutput<L> {
    /// Output kind name for logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            ServerOutput::PeerConnected { .. } => "PeerConnected",
            ServerOutput::PeerDisconnected { .. } => "PeerDisconnected",
            ServerOutput::Greetings { .. } => "Greetings",
            ServerOutput::HeadIsInitializing { .. } => "HeadIsInitializing",
            ServerOutput::Committed { .. } => "Committed",
            ServerOutput::HeadIsOpen { .. } => "HeadIsOpen",
            ServerOutput::HeadIsClosed { .. } => "HeadIsClosed",
            ServerOutput::HeadIsContested { .. } => "HeadIsContested",
            ServerOutput::ReadyToFanout { .. } => "ReadyToFanout",
            ServerOutput::HeadIsAborted { .. } => "HeadIsAborted",
            ServerOutput::HeadIsFinalized { .. } => "HeadIsFinalized",
            ServerOutput::CommandFailed { .. } => "CommandFailed",
            ServerOutput::TxValid { .. } => "TxValid",
            ServerOutput::TxInvalid { .. } => "TxInvalid",
            ServerOutput::SnapshotConfirmed { .. } => "SnapshotConfirmed",
            ServerOutput::GetUTxOResponse { .. } => "GetUTxOResponse",
            ServerOutput::InvalidInput { .. } => "InvalidInput",
            ServerOutput::PostTxOnChainFailed { .. } => "PostTxOnChainFailed",
            ServerOutput::RolledBack => "RolledBack",
        }
    }
}
