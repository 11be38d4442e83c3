//! In-process fakes for tests and standalone mode.
//!
//! [`RecordingChain`] collects posting requests instead of submitting them,
//! enforcing the mock chain's transaction size limit on fanouts.
//! [`ManualDelays`] holds delayed inputs until a test driver advances
//! virtual time.

use crate::delay::DelayHandler;
use crate::queue::InputQueue;
use hydra_core::{Chain, ChainEvent, Input, PostChainTx};
use hydra_ledger::{Ledger, MockLedger};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::warn;

/// Fanout transactions with at least this many outputs exceed the mock
/// chain's transaction size limit.
pub const MAX_FANOUT_OUTPUTS: usize = 70;

/// A chain client that records postings instead of submitting them.
///
/// Tests (and the standalone binary) pull recorded postings and turn them
/// into observations, playing the role of the chain itself.
pub struct RecordingChain {
    queue: Arc<InputQueue<MockLedger>>,
    posts: Mutex<Vec<PostChainTx<MockLedger>>>,
}

impl RecordingChain {
    pub fn new(queue: Arc<InputQueue<MockLedger>>) -> Self {
        Self {
            queue,
            posts: Mutex::new(Vec::new()),
        }
    }

    /// Drain the postings recorded so far, in request order.
    pub fn take_posts(&self) -> Vec<PostChainTx<MockLedger>> {
        std::mem::take(&mut *self.posts.lock())
    }
}

impl Chain<MockLedger> for RecordingChain {
    fn post(&self, tx: PostChainTx<MockLedger>) {
        if let PostChainTx::FanoutTx { utxo, .. } = &tx {
            if utxo.len() >= MAX_FANOUT_OUTPUTS {
                warn!(outputs = utxo.len(), "Fanout exceeds transaction size limit");
                self.queue.enqueue(Input::Chain {
                    event: ChainEvent::PostTxFailed {
                        reason: format!(
                            "fanout with {} outputs exceeds the transaction size limit",
                            utxo.len()
                        ),
                        failed_tx: tx,
                    },
                });
                return;
            }
        }
        self.posts.lock().push(tx);
    }
}

/// Delay handler under test control: nothing fires until the driver
/// advances virtual time.
pub struct ManualDelays<L: Ledger> {
    queue: Arc<InputQueue<L>>,
    pending: Mutex<Vec<(SystemTime, Input<L>)>>,
}

impl<L: Ledger> ManualDelays<L> {
    pub fn new(queue: Arc<InputQueue<L>>) -> Self {
        Self {
            queue,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Fire every delayed input due at or before `now`, in deadline order.
    pub fn advance_to(&self, now: SystemTime) {
        let mut due: Vec<(SystemTime, Input<L>)> = Vec::new();
        {
            let mut pending = self.pending.lock();
            let mut remaining = Vec::new();
            for entry in pending.drain(..) {
                if entry.0 <= now {
                    due.push(entry);
                } else {
                    remaining.push(entry);
                }
            }
            *pending = remaining;
        }
        due.sort_by_key(|(until, _)| *until);
        for (_, input) in due {
            self.queue.enqueue(input);
        }
    }

    /// Number of delays still pending.
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }
}

impl<L: Ledger> DelayHandler<L> for ManualDelays<L> {
    fn schedule(&self, until: SystemTime, input: Input<L>) {
        self.pending.lock().push((until, input));
    }
}
