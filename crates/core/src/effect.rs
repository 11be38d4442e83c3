//! Effects requested by the head logic.

use crate::chain::PostChainTx;
use crate::client::ServerOutput;
use crate::input::Input;
use crate::message::Message;
use hydra_ledger::Ledger;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// All possible effects the head logic can request.
///
/// Effects are executed by the runtime in the order returned from a single
/// step; none of them feed back into the logic synchronously.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "", tag = "tag")]
pub enum Effect<L: Ledger> {
    /// Broadcast a message to all peers (and loop it back locally: a party
    /// processes its own protocol messages like anyone else's).
    #[serde(rename_all = "camelCase")]
    Broadcast { msg: Message<L> },

    /// Deliver an output to all API subscribers.
    #[serde(rename_all = "camelCase")]
    ClientOutput { output: ServerOutput<L> },

    /// Ask the chain collaborator to post a transaction.
    #[serde(rename_all = "camelCase")]
    PostTx { tx: PostChainTx<L> },

    /// Re-enqueue `input` when wall-clock time reaches `until`.
    ///
    /// Used for the contestation deadline and for bounded retries of
    /// not-yet-applicable network messages. The input is re-evaluated
    /// against the state at fire time, so a stale delay is harmless.
    #[serde(rename_all = "camelCase")]
    Delay {
        until: SystemTime,
        input: Box<Input<L>>,
    },
}

impl<L: Ledger> Effect<L> {
    /// Effect kind name for logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Effect::Broadcast { .. } => "Broadcast",
            Effect::ClientOutput { .. } => "ClientOutput",
            Effect::PostTx { .. } => "PostTx",
            Effect::Delay { .. } => "Delay",
        }
    }
}
