//! The input queue: one FIFO shared by every event producer.

use crossbeam::channel::{self, Receiver, Sender};
use hydra_core::Input;
use hydra_ledger::Ledger;
use parking_lot::Mutex;

/// An input stamped with its queue sequence id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enqueued<L: Ledger> {
    /// Strictly monotonic, gap-free, starting at 1.
    pub id: u64,
    pub input: Input<L>,
}

struct Producer<L: Ledger> {
    sender: Option<Sender<Enqueued<L>>>,
    next_id: u64,
}

/// Multi-producer FIFO with atomic sequence assignment.
///
/// Id assignment and channel send happen under one lock, so ids come out of
/// `dequeue` in strictly increasing order with no gaps even under
/// concurrent enqueues. The channel is unbounded: producers never block and
/// nothing is ever dropped or reordered.
pub struct InputQueue<L: Ledger> {
    producer: Mutex<Producer<L>>,
    receiver: Receiver<Enqueued<L>>,
}

impl<L: Ledger> InputQueue<L> {
    pub fn new() -> Self {
        let (sender, receiver) = channel::unbounded();
        Self {
            producer: Mutex::new(Producer {
                sender: Some(sender),
                next_id: 1,
            }),
            receiver,
        }
    }

    /// Enqueue an input, returning its sequence id.
    ///
    /// Returns `None` after shutdown.
    pub fn enqueue(&self, input: Input<L>) -> Option<u64> {
        let mut producer = self.producer.lock();
        let sender = producer.sender.as_ref()?;
        let id = producer.next_id;
        sender
            .send(Enqueued {
                id,
                input,
            })
            .ok()?;
        producer.next_id += 1;
        Some(id)
    }

    /// Block until an input is available.
    ///
    /// Returns `None` once the queue is shut down and drained.
    pub fn dequeue(&self) -> Option<Enqueued<L>> {
        self.receiver.recv().ok()
    }

    /// Non-blocking dequeue, for test drivers that drain queues.
    pub fn try_dequeue(&self) -> Option<Enqueued<L>> {
        self.receiver.try_recv().ok()
    }

    /// Wake blocked consumers once the remaining items are drained.
    pub fn shutdown(&self) {
        self.producer.lock().sender = None;
    }
}

impl<L: Ledger> Default for InputQueue<L> {
    fn default() -> Self {
        Self::new()
    }
}
