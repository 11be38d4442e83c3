//! In-memory network for multi-node tests.

use crate::traits::Network;
use hydra_core::Message;
use hydra_ledger::Ledger;
use hydra_types::Party;
use parking_lot::Mutex;
use std::sync::Arc;

type Handler<L> = Arc<dyn Fn(Party, Message<L>) + Send + Sync>;

/// Shared hub connecting the [`SimNetwork`] handles of co-process nodes.
pub struct SimHub<L: Ledger> {
    handlers: Mutex<Vec<(Party, Handler<L>)>>,
}

impl<L: Ledger> SimHub<L> {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            handlers: Mutex::new(Vec::new()),
        })
    }
}

/// A node's handle on the in-memory network.
///
/// Broadcasts deliver synchronously to every *other* joined node's handler;
/// loopback of own messages stays the runtime's concern, exactly as with a
/// real transport.
pub struct SimNetwork<L: Ledger> {
    hub: Arc<SimHub<L>>,
    party: Party,
}

impl<L: Ledger> SimNetwork<L> {
    /// Create an empty hub to join nodes onto.
    pub fn hub() -> Arc<SimHub<L>> {
        SimHub::new()
    }

    /// Join the hub as `party`, receiving peer messages through `handler`.
    pub fn join(
        hub: Arc<SimHub<L>>,
        party: Party,
        handler: impl Fn(Party, Message<L>) + Send + Sync + 'static,
    ) -> Self {
        hub.handlers.lock().push((party, Arc::new(handler)));
        Self { hub, party }
    }
}

impl<L: Ledger> Network<L> for SimNetwork<L> {
    fn broadcast(&self, msg: Message<L>) {
        let handlers = self.hub.handlers.lock().clone();
        for (party, handler) in handlers {
            if party != self.party {
                handler(self.party, msg.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydra_ledger::MockLedger;
    use hydra_types::signing_key_from_seed;

    fn party(seed: u8) -> Party {
        Party::new(signing_key_from_seed(&[seed; 32]).verification_key())
    }

    #[test]
    fn test_broadcast_reaches_peers_but_not_self() {
        let hub = SimNetwork::<MockLedger>::hub();
        let alice = party(1);
        let bob = party(2);

        let seen_by_alice = Arc::new(Mutex::new(Vec::new()));
        let seen_by_bob = Arc::new(Mutex::new(Vec::new()));

        let alice_log = Arc::clone(&seen_by_alice);
        let alice_net = SimNetwork::join(Arc::clone(&hub), alice, move |from, msg| {
            alice_log.lock().push((from, msg));
        });
        let bob_log = Arc::clone(&seen_by_bob);
        let _bob_net = SimNetwork::join(Arc::clone(&hub), bob, move |from, msg| {
            bob_log.lock().push((from, msg));
        });

        alice_net.broadcast(Message::Heartbeat { party: alice });

        assert!(seen_by_alice.lock().is_empty());
        let bob_seen = seen_by_bob.lock();
        assert_eq!(bob_seen.len(), 1);
        assert_eq!(bob_seen[0].0, alice);
    }
}
