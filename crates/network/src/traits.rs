//! Network interface for typed message passing.

use hydra_core::Message;
use hydra_ledger::Ledger;

/// Network interface for broadcasting protocol messages to all peers.
///
/// Sends are fire-and-forget; delivery guarantees (retransmission,
/// reconnect) live in the transport. Inbound messages do not come back
/// through this trait: implementations authenticate envelopes and push
/// `(Party, Message)` pairs into the node's input queue via the handler
/// they were constructed with, keeping the decode path off the node loop.
///
/// Local loopback of our own broadcasts is the runtime's job, so a
/// transport only ever talks to actual peers.
pub trait Network<L: Ledger>: Send + Sync {
    /// Broadcast a message to all peers of the head.
    fn broadcast(&self, msg: Message<L>);
}
