//! Wall-clock execution of `Effect::Delay`.

use crate::queue::InputQueue;
use hydra_core::Input;
use hydra_ledger::Ledger;
use parking_lot::{Condvar, Mutex};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

/// Sink for delayed inputs.
///
/// The production implementation is [`TimerThread`]; tests use
/// [`crate::sim::ManualDelays`] to control virtual time.
pub trait DelayHandler<L: Ledger>: Send + Sync {
    /// Re-enqueue `input` when wall-clock time reaches `until`.
    fn schedule(&self, until: SystemTime, input: Input<L>);
}

struct TimerState<L: Ledger> {
    // Reverse for a min-heap; the counter keeps equal deadlines FIFO.
    pending: BinaryHeap<Reverse<(SystemTime, u64, OrdInput<L>)>>,
    counter: u64,
    shutdown: bool,
}

/// Wrapper giving inputs the ordering the heap needs without demanding
/// `Ord` from ledger types; entries never compare beyond their deadline and
/// insertion counter.
struct OrdInput<L: Ledger>(Input<L>);

impl<L: Ledger> PartialEq for OrdInput<L> {
    fn eq(&self, _: &Self) -> bool {
        true
    }
}
impl<L: Ledger> Eq for OrdInput<L> {}
impl<L: Ledger> PartialOrd for OrdInput<L> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl<L: Ledger> Ord for OrdInput<L> {
    fn cmp(&self, _: &Self) -> std::cmp::Ordering {
        std::cmp::Ordering::Equal
    }
}

/// Dedicated thread re-enqueueing delayed inputs at their fire time.
pub struct TimerThread<L: Ledger> {
    state: Arc<(Mutex<TimerState<L>>, Condvar)>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl<L: Ledger> TimerThread<L> {
    /// Spawn the timer thread feeding `queue`.
    pub fn spawn(queue: Arc<InputQueue<L>>) -> Self {
        let state = Arc::new((
            Mutex::new(TimerState {
                pending: BinaryHeap::new(),
                counter: 0,
                shutdown: false,
            }),
            Condvar::new(),
        ));

        let thread_state = Arc::clone(&state);
        let handle = std::thread::Builder::new()
            .name("delay-timer".into())
            .spawn(move || run_timer(thread_state, queue))
            .expect("spawning the timer thread");

        Self {
            state,
            handle: Some(handle),
        }
    }

    /// Stop the thread; already due inputs are still delivered.
    pub fn shutdown(&mut self) {
        let (lock, condvar) = &*self.state;
        lock.lock().shutdown = true;
        condvar.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl<L: Ledger> Drop for TimerThread<L> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<L: Ledger> DelayHandler<L> for TimerThread<L> {
    fn schedule(&self, until: SystemTime, input: Input<L>) {
        let (lock, condvar) = &*self.state;
        let mut state = lock.lock();
        let counter = state.counter;
        state.counter += 1;
        state.pending.push(Reverse((until, counter, OrdInput(input))));
        condvar.notify_one();
    }
}

fn run_timer<L: Ledger>(state: Arc<(Mutex<TimerState<L>>, Condvar)>, queue: Arc<InputQueue<L>>) {
    let (lock, condvar) = &*state;
    let mut guard = lock.lock();
    loop {
        if guard.shutdown {
            return;
        }
        let next_due = guard.pending.peek().map(|Reverse((until, _, _))| *until);
        match next_due {
            None => {
                condvar.wait(&mut guard);
            }
            Some(until) => match until.duration_since(SystemTime::now()) {
                Ok(remaining) if !remaining.is_zero() => {
                    let _ = condvar.wait_for(&mut guard, remaining);
                }
                _ => {
                    let Reverse((until, _, OrdInput(input))) =
                        guard.pending.pop().expect("peeked entry is still there");
                    debug!(?until, kind = input.type_name(), "Delayed input due");
                    queue.enqueue(input);
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydra_ledger::MockLedger;
    use std::time::Duration;

    #[test]
    fn test_due_input_is_enqueued() {
        let queue: Arc<InputQueue<MockLedger>> = Arc::new(InputQueue::new());
        let timer = TimerThread::spawn(Arc::clone(&queue));

        let fire_at = SystemTime::now() + Duration::from_millis(20);
        timer.schedule(fire_at, Input::Tick { now: fire_at });

        let enqueued = queue.dequeue().expect("delayed input arrives");
        assert!(matches!(enqueued.input, Input::Tick { .. }));
    }

    #[test]
    fn test_inputs_fire_in_deadline_order() {
        let queue: Arc<InputQueue<MockLedger>> = Arc::new(InputQueue::new());
        let timer = TimerThread::spawn(Arc::clone(&queue));

        let base = SystemTime::now();
        let late = base + Duration::from_millis(60);
        let early = base + Duration::from_millis(20);
        timer.schedule(late, Input::Tick { now: late });
        timer.schedule(early, Input::Tick { now: early });

        let first = queue.dequeue().unwrap();
        let second = queue.dequeue().unwrap();
        match (first.input, second.input) {
            (Input::Tick { now: a }, Input::Tick { now: b }) => {
                assert_eq!(a, early);
                assert_eq!(b, late);
            }
            other => panic!("unexpected inputs: {other:?}"),
        }
    }
}
