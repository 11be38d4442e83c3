//! Chain observer adapter.
//!
//! Bridges whatever chain client exists into the input queue while owning
//! the accumulated chain-state view. Multiple observations within a single
//! block call [`ChainObserver::observe`] repeatedly; each closure sees the
//! state left by the previous one, all under the adapter's own mutex.

use crate::queue::InputQueue;
use hydra_core::{ChainEvent, ChainState, Input};
use hydra_ledger::Ledger;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Mutex-owned accumulated chain state feeding events into the queue.
pub struct ChainObserver<L: Ledger> {
    queue: Arc<InputQueue<L>>,
    chain_state: Mutex<ChainState>,
}

impl<L: Ledger> ChainObserver<L> {
    /// Start observing from `initial`.
    pub fn new(queue: Arc<InputQueue<L>>, initial: ChainState) -> Self {
        Self {
            queue,
            chain_state: Mutex::new(initial),
        }
    }

    /// Run one observation step.
    ///
    /// The closure inspects the current accumulated chain state and either
    /// yields the successor state plus the event to enqueue, or `None` when
    /// whatever it saw was not head-relevant. The state update and the
    /// enqueue are atomic with respect to other observers.
    pub fn observe<F>(&self, observation: F)
    where
        F: FnOnce(&ChainState) -> Option<(ChainState, ChainEvent<L>)>,
    {
        let mut chain_state = self.chain_state.lock();
        if let Some((new_state, event)) = observation(&chain_state) {
            *chain_state = new_state;
            drop(chain_state);
            self.queue.enqueue(Input::Chain { event });
        } else {
            debug!("Chain callback yielded no head-relevant event");
        }
    }

    /// The current accumulated chain state.
    pub fn current(&self) -> ChainState {
        self.chain_state.lock().clone()
    }
}
