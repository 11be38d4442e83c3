//! Inputs to the head logic.

use crate::chain::ChainEvent;
use crate::client::ClientCommand;
use crate::message::Message;
use hydra_ledger::Ledger;
use hydra_types::Party;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// All possible inputs the head logic can receive.
///
/// Inputs are **passive data** describing something that happened. The
/// logic processes one input at a time and returns effects; the input queue
/// is the linearization point across the three producers and the clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "", tag = "tag")]
pub enum Input<L: Ledger> {
    /// A message from a peer party, authenticated by the network layer.
    ///
    /// `ttl` bounds requeues of messages that are not yet applicable
    /// (transactions whose inputs are still in flight); it is decremented
    /// on each requeue and the message is dropped at zero.
    #[serde(rename_all = "camelCase")]
    Network {
        ttl: u32,
        from: Party,
        msg: Message<L>,
    },

    /// A command from an API client.
    #[serde(rename_all = "camelCase")]
    Client { command: ClientCommand<L> },

    /// An event from the chain observer.
    #[serde(rename_all = "camelCase")]
    Chain { event: ChainEvent<L> },

    /// Wall-clock advancement, fed periodically and by delayed effects.
    ///
    /// The logic keeps no clock of its own; deadlines are checked against
    /// the latest tick.
    #[serde(rename_all = "camelCase")]
    Tick { now: SystemTime },
}

impl<L: Ledger> Input<L> {
    /// Input kind name for logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Input::Network { msg, .. } => msg.type_name(),
            Input::Client { command } => command.type_name(),
            Input::Chain { .. } => "ChainEvent",
            Input::Tick { .. } => "Tick",
        }
    }
}
