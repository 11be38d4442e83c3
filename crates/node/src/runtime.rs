//! The node loop: the single consumer of the input queue.

use crate::delay::DelayHandler;
use crate::queue::{Enqueued, InputQueue};
use chrono::Utc;
use crossbeam::channel::{self, Receiver, Sender};
use hydra_api::OutputFormat;
use hydra_core::{Chain, Effect, Input, Message, ServerOutput};
use hydra_ledger::Ledger;
use hydra_logic::{HeadLogic, PersistedState};
use hydra_network::{Heartbeat, HeartbeatOutput, Network};
use hydra_persistence::{StateStore, StoreError};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info};

/// Runtime tunables.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// TTL stamped on network inputs entering the queue.
    pub default_ttl: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { default_ttl: 5 }
    }
}

/// Fatal runtime failures.
///
/// Persistence errors are deliberately fatal: a party that cannot durably
/// record its state risks signing divergent snapshots after a restart.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

struct Subscriber {
    sender: Sender<Value>,
    format: OutputFormat,
}

/// The node runtime: drives the head logic and fans its effects out to the
/// network, the chain and the API subscribers.
///
/// `run` is the only caller of `HeadLogic::handle` and the only writer of
/// the persisted state; everything else talks to the node through the
/// input queue.
pub struct NodeRuntime<L, N, C>
where
    L: Ledger,
    N: Network<L>,
    C: Chain<L>,
{
    logic: HeadLogic<L>,
    queue: Arc<InputQueue<L>>,
    store: StateStore<PersistedState<L>>,
    network: N,
    chain: C,
    delays: Arc<dyn DelayHandler<L>>,
    heartbeat: Heartbeat,
    /// Latest tick seen, used as the liveness clock.
    now: SystemTime,
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
    config: RuntimeConfig,
}

impl<L, N, C> NodeRuntime<L, N, C>
where
    L: Ledger,
    N: Network<L>,
    C: Chain<L>,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        logic: HeadLogic<L>,
        queue: Arc<InputQueue<L>>,
        store: StateStore<PersistedState<L>>,
        network: N,
        chain: C,
        delays: Arc<dyn DelayHandler<L>>,
        heartbeat: Heartbeat,
        config: RuntimeConfig,
    ) -> Self {
        Self {
            logic,
            queue,
            store,
            network,
            chain,
            delays,
            heartbeat,
            now: SystemTime::UNIX_EPOCH,
            subscribers: Arc::new(Mutex::new(Vec::new())),
            config,
        }
    }

    /// Current head state (for status endpoints and tests).
    pub fn state(&self) -> &hydra_logic::HeadState<L> {
        self.logic.state()
    }

    /// Register an API subscriber.
    ///
    /// The subscriber immediately receives a `Greetings` output and then
    /// every client output produced by subsequent steps. Buffers are
    /// unbounded: client outputs are never dropped.
    pub fn subscribe(&self, format: OutputFormat) -> Receiver<Value> {
        let (sender, receiver) = channel::unbounded();
        let greeting: ServerOutput<L> = ServerOutput::Greetings {
            me: self.logic.party(),
            head_status: self.logic.state().status_name().to_string(),
        };
        let _ = sender.send(format.apply(hydra_api::envelope(0, Utc::now(), &greeting)));
        self.subscribers.lock().push(Subscriber { sender, format });
        receiver
    }

    /// Run until the queue shuts down.
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        info!(party = %self.logic.party(), "Node loop started");
        while let Some(enqueued) = self.queue.dequeue() {
            self.step(enqueued)?;
        }
        info!("Node loop stopped");
        Ok(())
    }

    /// Process a single input: step the logic, persist, dispatch effects.
    pub fn step(&mut self, enqueued: Enqueued<L>) -> Result<(), RuntimeError> {
        let Enqueued { id, input } = enqueued;
        debug!(seq = id, kind = input.type_name(), "Processing input");

        // Liveness tracking rides on the same inputs the logic sees, so it
        // follows the queue's time, not the wall clock.
        let liveness = match &input {
            Input::Network { from, .. } => {
                self.heartbeat.on_message(*from, self.now).into_iter().collect()
            }
            Input::Tick { now } => {
                self.now = self.now.max(*now);
                self.heartbeat.on_tick(self.now)
            }
            _ => Vec::new(),
        };

        let effects = self.logic.handle(input);
        self.store.save(&self.logic.persisted())?;

        for effect in effects {
            self.dispatch(id, effect);
        }
        for output in liveness {
            self.dispatch_liveness(id, output);
        }
        Ok(())
    }

    fn dispatch_liveness(&self, seq: u64, output: HeartbeatOutput) {
        match output {
            HeartbeatOutput::SendHeartbeat => {
                // Not looped back: our own liveness is not in question.
                self.network.broadcast(Message::Heartbeat {
                    party: self.logic.party(),
                });
            }
            HeartbeatOutput::PeerUp(peer) => {
                info!(%peer, "Peer connected");
                self.dispatch(
                    seq,
                    Effect::ClientOutput {
                        output: ServerOutput::PeerConnected { peer },
                    },
                );
            }
            HeartbeatOutput::PeerDown(peer) => {
                info!(%peer, "Peer disconnected");
                self.dispatch(
                    seq,
                    Effect::ClientOutput {
                        output: ServerOutput::PeerDisconnected { peer },
                    },
                );
            }
        }
    }

    /// Execute one effect. Ordering within a step is the returned order.
    fn dispatch(&self, seq: u64, effect: Effect<L>) {
        match effect {
            Effect::Broadcast { msg } => {
                self.network.broadcast(msg.clone());
                // A party processes its own protocol messages like any
                // peer's; the loopback goes through the queue so ordering
                // stays linear.
                self.queue.enqueue(Input::Network {
                    ttl: self.config.default_ttl,
                    from: self.logic.party(),
                    msg,
                });
            }

            Effect::ClientOutput { output } => {
                let value = hydra_api::envelope(seq, Utc::now(), &output);
                let mut subscribers = self.subscribers.lock();
                subscribers.retain(|subscriber| {
                    subscriber
                        .sender
                        .send(subscriber.format.apply(value.clone()))
                        .is_ok()
                });
            }

            Effect::PostTx { tx } => {
                debug!(seq, tx = tx.type_name(), "Requesting chain posting");
                self.chain.post(tx);
            }

            Effect::Delay { until, input } => {
                self.delays.schedule(until, *input);
            }
        }
    }

    /// Enqueue an authenticated peer message (called from the network's
    /// inbound path).
    pub fn enqueue_network(&self, from: hydra_types::Party, msg: hydra_core::Message<L>) {
        self.queue.enqueue(Input::Network {
            ttl: self.config.default_ttl,
            from,
            msg,
        });
    }
}

/// Load the persisted state if any, otherwise start idle at the given
/// chain state.
pub fn load_or_initialize<L: Ledger>(
    store: &StateStore<PersistedState<L>>,
    env: hydra_logic::Environment,
    ledger: L,
    config: hydra_logic::LogicConfig,
    genesis_chain_state: hydra_core::ChainState,
) -> Result<HeadLogic<L>, StoreError> {
    match store.load()? {
        Some(persisted) => {
            info!(status = persisted.head.status_name(), "Resuming from persisted state");
            Ok(HeadLogic::restore(env, ledger, config, persisted))
        }
        None => {
            info!("No persisted state, starting idle");
            Ok(HeadLogic::new(env, ledger, config, genesis_chain_state))
        }
    }
}
