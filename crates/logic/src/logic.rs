//! The deterministic step function.

use crate::env::Environment;
use crate::state::{
    Checkpoint, ClosedState, CoordinatedState, HeadState, InitialState, OpenState, PersistedState,
    SeenSnapshot,
};
use hydra_core::{
    ChainEvent, ChainState, ClientCommand, Effect, Input, Message, Observation, PostChainTx,
    ServerOutput,
};
use hydra_ledger::{ConfirmedSnapshot, Ledger, Snapshot};
use hydra_types::{MultiSignature, Party};
use std::collections::VecDeque;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Tunables of the head logic.
#[derive(Debug, Clone)]
pub struct LogicConfig {
    /// Requeue budget for network messages that are not yet applicable.
    pub req_tx_ttl: u32,
    /// Delay before a not-yet-applicable message is retried.
    pub retry_delay: Duration,
    /// How many chain-caused transitions the rollback ring retains.
    pub checkpoint_depth: usize,
}

impl Default for LogicConfig {
    fn default() -> Self {
        Self {
            req_tx_ttl: 5,
            retry_delay: Duration::from_millis(100),
            checkpoint_depth: 8,
        }
    }
}

/// The head-logic state machine.
///
/// One input in, a list of effects out; the only writer of the head state.
/// `handle` never blocks, never performs I/O, and is deterministic in the
/// state, the input and the environment.
pub struct HeadLogic<L: Ledger> {
    env: Environment,
    ledger: L,
    config: LogicConfig,
    /// Latest observed wall-clock time, advanced only by `Input::Tick`.
    now: SystemTime,
    state: HeadState<L>,
    /// Ring of states restorable by rollback, newest last.
    checkpoints: VecDeque<Checkpoint<L>>,
}

impl<L: Ledger> HeadLogic<L> {
    /// Fresh logic in `Idle`, anchored at the given chain state.
    pub fn new(env: Environment, ledger: L, config: LogicConfig, chain_state: ChainState) -> Self {
        let state = HeadState::idle(chain_state);
        let mut checkpoints = VecDeque::new();
        checkpoints.push_back(Checkpoint {
            slot: state.chain_state().slot,
            state: state.clone(),
        });
        Self {
            env,
            ledger,
            config,
            now: SystemTime::UNIX_EPOCH,
            state,
            checkpoints,
        }
    }

    /// Resume from a persisted state.
    pub fn restore(
        env: Environment,
        ledger: L,
        config: LogicConfig,
        persisted: PersistedState<L>,
    ) -> Self {
        Self {
            env,
            ledger,
            config,
            now: SystemTime::UNIX_EPOCH,
            state: persisted.head,
            checkpoints: persisted.checkpoints,
        }
    }

    /// Current head state.
    pub fn state(&self) -> &HeadState<L> {
        &self.state
    }

    /// Our own party.
    pub fn party(&self) -> Party {
        self.env.party
    }

    /// Snapshot of everything worth persisting.
    pub fn persisted(&self) -> PersistedState<L> {
        PersistedState {
            head: self.state.clone(),
            checkpoints: self.checkpoints.clone(),
        }
    }

    /// Process one input, returning the effects to execute, in order.
    pub fn handle(&mut self, input: Input<L>) -> Vec<Effect<L>> {
        match input {
            Input::Tick { now } => {
                // Ticks may arrive out of order (periodic clock vs delayed
                // re-enqueues); time never moves backwards.
                self.now = self.now.max(now);
                self.on_tick()
            }
            Input::Client { command } => self.on_client_command(command),
            Input::Chain { event } => self.on_chain_event(event),
            Input::Network { ttl, from, msg } => self.on_network_message(ttl, from, msg),
        }
    }

    // ─── Client commands ────────────────────────────────────────────────

    fn on_client_command(&mut self, command: ClientCommand<L>) -> Vec<Effect<L>> {
        match (&self.state, &command) {
            (HeadState::Idle { .. }, ClientCommand::Init) => vec![Effect::PostTx {
                tx: PostChainTx::InitTx {
                    parameters: self.env.head_parameters(),
                },
            }],

            (HeadState::Initial(initial), ClientCommand::Commit { utxo }) => {
                if initial.committed.contains_key(&self.env.party) {
                    return command_failed(command, "party has already committed");
                }
                if let Err(e) = self.ledger.validate_commit(utxo) {
                    return command_failed(command, &e.to_string());
                }
                vec![Effect::PostTx {
                    tx: PostChainTx::CommitTx {
                        head_id: initial.head_id.clone(),
                        party: self.env.party,
                        utxo: utxo.clone(),
                    },
                }]
            }

            (HeadState::Initial(initial), ClientCommand::Abort) => {
                let utxo = self.committed_utxo(initial);
                vec![Effect::PostTx {
                    tx: PostChainTx::AbortTx {
                        head_id: initial.head_id.clone(),
                        utxo,
                    },
                }]
            }

            (HeadState::Open(open), ClientCommand::NewTx { transaction }) => {
                match self.ledger.apply_tx(&open.coordinated.seen_utxo, transaction) {
                    Ok(_) => {
                        let tx = transaction.clone();
                        let head_id = open.head_id.clone();
                        if let HeadState::Open(open) = &mut self.state {
                            open.coordinated.local_txs.push(tx.clone());
                        }
                        vec![
                            Effect::Broadcast {
                                msg: Message::ReqTx { transaction: tx.clone() },
                            },
                            Effect::ClientOutput {
                                output: ServerOutput::TxValid {
                                    head_id,
                                    transaction: tx,
                                },
                            },
                        ]
                    }
                    Err(e) => vec![Effect::ClientOutput {
                        output: ServerOutput::TxInvalid {
                            head_id: open.head_id.clone(),
                            utxo: open.coordinated.seen_utxo.clone(),
                            transaction: transaction.clone(),
                            validation_error: e.to_string(),
                        },
                    }],
                }
            }

            (HeadState::Open(open), ClientCommand::GetUTxO) => vec![Effect::ClientOutput {
                output: ServerOutput::GetUTxOResponse {
                    head_id: open.head_id.clone(),
                    utxo: open.coordinated.confirmed_snapshot.utxo().clone(),
                },
            }],

            (HeadState::Open(open), ClientCommand::Close) => vec![Effect::PostTx {
                tx: PostChainTx::CloseTx {
                    head_id: open.head_id.clone(),
                    confirmed_snapshot: open.coordinated.confirmed_snapshot.clone(),
                },
            }],

            (HeadState::Closed(closed), ClientCommand::Contest) => {
                if closed.confirmed_snapshot.number() <= closed.closed_snapshot_number {
                    return command_failed(command, "no snapshot newer than the closed one");
                }
                vec![Effect::PostTx {
                    tx: PostChainTx::ContestTx {
                        head_id: closed.head_id.clone(),
                        confirmed_snapshot: closed.confirmed_snapshot.clone(),
                    },
                }]
            }

            (HeadState::Closed(closed), ClientCommand::Fanout) => {
                if !closed.ready_to_fanout {
                    return command_failed(command, "contestation period has not elapsed");
                }
                vec![Effect::PostTx {
                    tx: PostChainTx::FanoutTx {
                        head_id: closed.head_id.clone(),
                        utxo: closed.confirmed_snapshot.utxo().clone(),
                    },
                }]
            }

            _ => command_failed(
                command,
                &format!("command invalid in state {}", self.state.status_name()),
            ),
        }
    }

    // ─── Network messages ───────────────────────────────────────────────

    fn on_network_message(&mut self, ttl: u32, from: Party, msg: Message<L>) -> Vec<Effect<L>> {
        // Heartbeats are consumed by the network layer's liveness monitor;
        // one reaching the logic is a no-op.
        if matches!(msg, Message::Heartbeat { .. }) {
            return vec![];
        }

        let HeadState::Open(open) = &self.state else {
            debug!(
                msg = msg.type_name(),
                state = self.state.status_name(),
                "Dropping network message outside open head"
            );
            return vec![];
        };
        if !open.parameters.contains(&from) {
            warn!(%from, msg = msg.type_name(), "Dropping message from non-party");
            return vec![];
        }

        match msg {
            Message::ReqTx { transaction } => self.on_req_tx(ttl, from, transaction),
            Message::ReqSn {
                snapshot_number,
                transaction_ids,
            } => self.on_req_sn(ttl, from, snapshot_number, transaction_ids),
            Message::AckSn {
                party,
                snapshot_number,
                signature,
            } => self.on_ack_sn(ttl, from, party, snapshot_number, signature),
            Message::Heartbeat { .. } => unreachable!("handled above"),
        }
    }

    fn on_req_tx(&mut self, ttl: u32, from: Party, transaction: L::Tx) -> Vec<Effect<L>> {
        let ledger = self.ledger.clone();
        let HeadState::Open(open) = &mut self.state else {
            return vec![];
        };

        match ledger.apply_tx(&open.coordinated.seen_utxo, &transaction) {
            Ok(next_utxo) => {
                open.coordinated.seen_utxo = next_utxo;
                open.coordinated.seen_txs.push(transaction.clone());
                open.coordinated
                    .all_txs
                    .insert(ledger.tx_id(&transaction), transaction.clone());

                let mut effects = Vec::new();
                // The submitter already saw TxValid when it accepted the
                // client command; everyone else reports it now.
                if from != self.env.party {
                    effects.push(Effect::ClientOutput {
                        output: ServerOutput::TxValid {
                            head_id: open.head_id.clone(),
                            transaction,
                        },
                    });
                }
                effects.extend(self.propose_snapshot_if_leader());
                effects
            }
            Err(e) if ledger.missing_inputs(&e) && ttl > 0 => {
                // Inputs may be created by transactions still in flight;
                // retry under the TTL budget.
                self.requeue(Input::Network {
                    ttl: ttl - 1,
                    from,
                    msg: Message::ReqTx { transaction },
                })
            }
            Err(e) => vec![Effect::ClientOutput {
                output: ServerOutput::TxInvalid {
                    head_id: open.head_id.clone(),
                    utxo: open.coordinated.seen_utxo.clone(),
                    transaction,
                    validation_error: e.to_string(),
                },
            }],
        }
    }

    fn on_req_sn(
        &mut self,
        ttl: u32,
        from: Party,
        snapshot_number: u64,
        transaction_ids: Vec<hydra_types::Hash>,
    ) -> Vec<Effect<L>> {
        let ledger = self.ledger.clone();
        let me = self.env.party;
        let signing_key = self.env.signing_key.clone();

        let HeadState::Open(open) = &mut self.state else {
            return vec![];
        };
        let coordinated = &mut open.coordinated;

        if &from != open.parameters.leader(snapshot_number) {
            warn!(%from, snapshot_number, "Ignoring ReqSn from non-leader");
            return vec![];
        }
        if snapshot_number != coordinated.confirmed_snapshot.number() + 1 {
            debug!(
                snapshot_number,
                confirmed = coordinated.confirmed_snapshot.number(),
                "Ignoring ReqSn with unexpected number"
            );
            return vec![];
        }
        if coordinated.seen_snapshot.is_some() {
            debug!(snapshot_number, "Ignoring ReqSn while a snapshot is in flight");
            return vec![];
        }

        // Resolve the referenced transactions; they may still be in flight.
        let mut txs = Vec::with_capacity(transaction_ids.len());
        for id in &transaction_ids {
            match coordinated.all_txs.get(id) {
                Some(tx) => txs.push(tx.clone()),
                None if ttl > 0 => {
                    return self.requeue(Input::Network {
                        ttl: ttl - 1,
                        from,
                        msg: Message::ReqSn {
                            snapshot_number,
                            transaction_ids,
                        },
                    });
                }
                None => {
                    warn!(%id, snapshot_number, "Dropping ReqSn referencing unknown transaction");
                    return vec![];
                }
            }
        }

        // Requested transactions must apply in order on top of the
        // confirmed UTxO set.
        let mut utxo = coordinated.confirmed_snapshot.utxo().clone();
        for tx in &txs {
            match ledger.apply_tx(&utxo, tx) {
                Ok(next) => utxo = next,
                Err(e) => {
                    warn!(snapshot_number, error = %e, "Ignoring ReqSn that does not apply");
                    return vec![];
                }
            }
        }

        let candidate = Snapshot {
            number: snapshot_number,
            utxo,
            confirmed_transactions: txs,
        };
        let message = candidate.signing_message(&ledger, &open.head_id);
        let signature = signing_key.sign(&message);

        let mut signatures = std::collections::BTreeMap::new();
        if let Some(own_index) = open.parameters.index_of(&me) {
            signatures.insert(own_index, signature);
        }
        coordinated.seen_snapshot = Some(SeenSnapshot {
            candidate,
            signatures,
        });

        vec![Effect::Broadcast {
            msg: Message::AckSn {
                party: me,
                snapshot_number,
                signature,
            },
        }]
    }

    fn on_ack_sn(
        &mut self,
        ttl: u32,
        from: Party,
        party: Party,
        snapshot_number: u64,
        signature: hydra_types::Signature,
    ) -> Vec<Effect<L>> {
        let ledger = self.ledger.clone();

        let HeadState::Open(open) = &mut self.state else {
            return vec![];
        };

        if from != party {
            warn!(%from, %party, "Dropping AckSn whose sender and signer differ");
            return vec![];
        }

        let next_number = open.coordinated.confirmed_snapshot.number() + 1;
        let Some(seen) = open.coordinated.seen_snapshot.as_mut() else {
            // Acknowledgement raced ahead of the leader's ReqSn; wait for it
            // under the TTL budget.
            if snapshot_number == next_number && ttl > 0 {
                return self.requeue(Input::Network {
                    ttl: ttl - 1,
                    from,
                    msg: Message::AckSn {
                        party,
                        snapshot_number,
                        signature,
                    },
                });
            }
            debug!(snapshot_number, "Dropping AckSn with no snapshot in flight");
            return vec![];
        };

        if snapshot_number != seen.candidate.number {
            debug!(
                snapshot_number,
                candidate = seen.candidate.number,
                "Dropping AckSn for a different snapshot"
            );
            return vec![];
        }

        let Some(index) = open.parameters.index_of(&party) else {
            warn!(%party, "Dropping AckSn from non-party signer");
            return vec![];
        };

        let message = seen.candidate.signing_message(&ledger, &open.head_id);
        if !party.verify(&message, &signature) {
            warn!(%party, snapshot_number, "Dropping AckSn with invalid signature");
            return vec![];
        }

        // Set semantics: a duplicate acknowledgement changes nothing.
        seen.signatures.insert(index, signature);
        if seen.signatures.len() < open.parameters.len() {
            return vec![];
        }

        // Every party signed: promote the candidate.
        let snapshot = seen.candidate.clone();
        let signatures = MultiSignature::from_indexed(&seen.signatures, open.parameters.len())
            .expect("signature map is complete by the length check above");

        let confirmed_ids: Vec<_> = snapshot.tx_ids(&ledger);
        open.coordinated.confirmed_snapshot = ConfirmedSnapshot::Confirmed {
            snapshot: snapshot.clone(),
            signatures: signatures.clone(),
        };
        open.coordinated.seen_snapshot = None;
        open.coordinated
            .seen_txs
            .retain(|tx| !confirmed_ids.contains(&ledger.tx_id(tx)));
        open.coordinated
            .local_txs
            .retain(|tx| !confirmed_ids.contains(&ledger.tx_id(tx)));
        for id in &confirmed_ids {
            open.coordinated.all_txs.remove(id);
        }

        let head_id = open.head_id.clone();
        let mut effects = vec![Effect::ClientOutput {
            output: ServerOutput::SnapshotConfirmed {
                head_id,
                snapshot,
                signatures,
            },
        }];
        effects.extend(self.propose_snapshot_if_leader());
        effects
    }

    /// When we lead the next snapshot and transactions are waiting, propose.
    fn propose_snapshot_if_leader(&self) -> Vec<Effect<L>> {
        let HeadState::Open(open) = &self.state else {
            return vec![];
        };
        let coordinated = &open.coordinated;
        if coordinated.seen_snapshot.is_some() || coordinated.seen_txs.is_empty() {
            return vec![];
        }
        let next_number = coordinated.confirmed_snapshot.number() + 1;
        if open.parameters.leader(next_number) != &self.env.party {
            return vec![];
        }
        vec![Effect::Broadcast {
            msg: Message::ReqSn {
                snapshot_number: next_number,
                transaction_ids: coordinated
                    .seen_txs
                    .iter()
                    .map(|tx| self.ledger.tx_id(tx))
                    .collect(),
            },
        }]
    }

    // ─── Chain events ───────────────────────────────────────────────────

    fn on_chain_event(&mut self, event: ChainEvent<L>) -> Vec<Effect<L>> {
        match event {
            ChainEvent::Observation {
                observed,
                new_chain_state,
            } => self.on_observation(observed, new_chain_state),
            ChainEvent::Rollback { rolled_back_to } => self.on_rollback(rolled_back_to),
            ChainEvent::PostTxFailed { failed_tx, reason } => {
                warn!(tx = failed_tx.type_name(), %reason, "Chain posting failed");
                vec![Effect::ClientOutput {
                    output: ServerOutput::PostTxOnChainFailed {
                        post_chain_tx: failed_tx,
                        reason,
                    },
                }]
            }
        }
    }

    fn on_observation(
        &mut self,
        observed: Observation<L>,
        new_chain_state: ChainState,
    ) -> Vec<Effect<L>> {
        // Observations for foreign heads are not ours to act on.
        if let Some(ours) = self.state.head_id() {
            if observed.head_id() != ours {
                debug!(observed = ?observed.head_id(), "Ignoring observation for foreign head");
                return vec![];
            }
        }

        let effects = match (&self.state, observed) {
            (HeadState::Idle { .. }, Observation::Init { head_id, parameters, seed }) => {
                if !parameters.contains(&self.env.party) {
                    debug!(%head_id, "Ignoring init we are not part of");
                    return vec![];
                }
                let parties = parameters.parties.clone();
                self.state = HeadState::Initial(InitialState {
                    head_id: head_id.clone(),
                    parameters,
                    committed: Default::default(),
                    seed,
                    chain_state: new_chain_state,
                });
                vec![Effect::ClientOutput {
                    output: ServerOutput::HeadIsInitializing { head_id, parties },
                }]
            }

            (HeadState::Initial(initial), Observation::Commit { head_id, party, utxo }) => {
                if !initial.parameters.contains(&party) {
                    debug!(%party, "Ignoring commit from non-party");
                    return vec![];
                }
                if initial.committed.contains_key(&party) {
                    // Commit linearity: at most one commit per party.
                    debug!(%party, "Ignoring duplicate commit");
                    return vec![];
                }
                let mut initial = initial.clone();
                initial.committed.insert(party, utxo.clone());
                initial.chain_state = new_chain_state;
                let all_committed = initial.committed.len() == initial.parameters.len();
                self.state = HeadState::Initial(initial);

                let mut effects = vec![Effect::ClientOutput {
                    output: ServerOutput::Committed {
                        head_id: head_id.clone(),
                        party,
                        utxo,
                    },
                }];
                if all_committed {
                    effects.push(Effect::PostTx {
                        tx: PostChainTx::CollectComTx { head_id },
                    });
                }
                effects
            }

            (HeadState::Initial(initial), Observation::CollectCom { head_id }) => {
                let initial_utxo = self.committed_utxo(initial);
                self.state = HeadState::Open(OpenState {
                    head_id: head_id.clone(),
                    parameters: initial.parameters.clone(),
                    coordinated: CoordinatedState::open(initial_utxo.clone()),
                    chain_state: new_chain_state,
                });
                vec![Effect::ClientOutput {
                    output: ServerOutput::HeadIsOpen {
                        head_id,
                        utxo: initial_utxo,
                    },
                }]
            }

            (HeadState::Initial(initial), Observation::Abort { head_id }) => {
                let utxo = self.committed_utxo(initial);
                self.state = HeadState::Final {
                    head_id: head_id.clone(),
                    utxo: utxo.clone(),
                    chain_state: new_chain_state,
                };
                vec![Effect::ClientOutput {
                    output: ServerOutput::HeadIsAborted { head_id, utxo },
                }]
            }

            (
                HeadState::Open(open),
                Observation::Close {
                    head_id,
                    snapshot_number,
                    contestation_deadline,
                },
            ) => {
                self.state = HeadState::Closed(ClosedState {
                    head_id: head_id.clone(),
                    parameters: open.parameters.clone(),
                    confirmed_snapshot: open.coordinated.confirmed_snapshot.clone(),
                    closed_snapshot_number: snapshot_number,
                    contestation_deadline,
                    ready_to_fanout: false,
                    chain_state: new_chain_state,
                });
                vec![
                    Effect::ClientOutput {
                        output: ServerOutput::HeadIsClosed {
                            head_id,
                            snapshot_number,
                            contestation_deadline,
                        },
                    },
                    Effect::Delay {
                        until: contestation_deadline,
                        input: Box::new(Input::Tick {
                            now: contestation_deadline,
                        }),
                    },
                ]
            }

            (
                HeadState::Closed(closed),
                Observation::Contest {
                    head_id,
                    snapshot_number,
                },
            ) => {
                if snapshot_number <= closed.closed_snapshot_number {
                    debug!(
                        snapshot_number,
                        recorded = closed.closed_snapshot_number,
                        "Ignoring contest without a higher snapshot"
                    );
                    return vec![];
                }
                let mut closed = closed.clone();
                closed.closed_snapshot_number = snapshot_number;
                // Each contest grants the remaining parties one more full
                // contestation period, matching the on-chain validator.
                closed.contestation_deadline +=
                    closed.parameters.contestation_period.duration();
                closed.chain_state = new_chain_state;
                let deadline = closed.contestation_deadline;
                self.state = HeadState::Closed(closed);
                vec![
                    Effect::ClientOutput {
                        output: ServerOutput::HeadIsContested {
                            head_id,
                            snapshot_number,
                        },
                    },
                    Effect::Delay {
                        until: deadline,
                        input: Box::new(Input::Tick { now: deadline }),
                    },
                ]
            }

            (HeadState::Closed(closed), Observation::Fanout { head_id }) => {
                let utxo = closed.confirmed_snapshot.utxo().clone();
                self.state = HeadState::Final {
                    head_id: head_id.clone(),
                    utxo: utxo.clone(),
                    chain_state: new_chain_state,
                };
                vec![Effect::ClientOutput {
                    output: ServerOutput::HeadIsFinalized { head_id, utxo },
                }]
            }

            (state, observed) => {
                debug!(
                    state = state.status_name(),
                    observed = ?observed.head_id(),
                    "Ignoring observation not applicable to current state"
                );
                return vec![];
            }
        };

        self.push_checkpoint();
        effects
    }

    fn on_rollback(&mut self, rolled_back_to: ChainState) -> Vec<Effect<L>> {
        let target = rolled_back_to.slot;
        if target >= self.state.chain_state().slot {
            debug!(?target, "Ignoring rollback not behind current chain state");
            return vec![];
        }

        while self
            .checkpoints
            .back()
            .is_some_and(|checkpoint| checkpoint.slot > target)
            && self.checkpoints.len() > 1
        {
            self.checkpoints.pop_back();
        }

        let checkpoint = self
            .checkpoints
            .back()
            .expect("checkpoint ring retains at least its oldest entry");
        warn!(
            ?target,
            restored = checkpoint.state.status_name(),
            "Rolling back head state"
        );
        self.state = checkpoint.state.clone();
        self.set_chain_state(rolled_back_to);

        vec![Effect::ClientOutput {
            output: ServerOutput::RolledBack,
        }]
    }

    // ─── Time ───────────────────────────────────────────────────────────

    fn on_tick(&mut self) -> Vec<Effect<L>> {
        let HeadState::Closed(closed) = &mut self.state else {
            return vec![];
        };
        if closed.ready_to_fanout || self.now < closed.contestation_deadline {
            return vec![];
        }
        closed.ready_to_fanout = true;
        vec![Effect::ClientOutput {
            output: ServerOutput::ReadyToFanout {
                head_id: closed.head_id.clone(),
            },
        }]
    }

    // ─── Helpers ────────────────────────────────────────────────────────

    /// Union of all committed UTxO sets, folded in canonical party order.
    fn committed_utxo(&self, initial: &InitialState<L>) -> L::UTxO {
        initial
            .committed
            .values()
            .fold(self.ledger.empty_utxo(), |acc, utxo| {
                self.ledger.union(&acc, utxo)
            })
    }

    /// Delay-based requeue of a not-yet-applicable input.
    fn requeue(&self, input: Input<L>) -> Vec<Effect<L>> {
        vec![Effect::Delay {
            until: self.now + self.config.retry_delay,
            input: Box::new(input),
        }]
    }

    fn push_checkpoint(&mut self) {
        self.checkpoints.push_back(Checkpoint {
            slot: self.state.chain_state().slot,
            state: self.state.clone(),
        });
        while self.checkpoints.len() > self.config.checkpoint_depth {
            self.checkpoints.pop_front();
        }
    }

    fn set_chain_state(&mut self, chain_state: ChainState) {
        match &mut self.state {
            HeadState::Idle { chain_state: cs } => *cs = chain_state,
            HeadState::Initial(s) => s.chain_state = chain_state,
            HeadState::Open(s) => s.chain_state = chain_state,
            HeadState::Closed(s) => s.chain_state = chain_state,
            HeadState::Final { chain_state: cs, .. } => *cs = chain_state,
        }
    }
}

fn command_failed<L: Ledger>(command: ClientCommand<L>, reason: &str) -> Vec<Effect<L>> {
    vec![Effect::ClientOutput {
        output: ServerOutput::CommandFailed {
            client_input: command,
            reason: reason.to_string(),
        },
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydra_core::ChainSlot;
    use hydra_ledger::{MockLedger, MockTx, TxOut, UtxoSet};
    use hydra_types::{signing_key_from_seed, ContestationPeriod, Hash, HeadId, HeadParameters};

    const PERIOD_SECS: u64 = 10;

    struct Fixture {
        nodes: Vec<HeadLogic<MockLedger>>,
        parameters: HeadParameters,
        head_id: HeadId,
        slot: u64,
    }

    impl Fixture {
        /// A head of `n` seeded parties, node i speaking for party i in
        /// canonical order.
        fn new(n: usize) -> Self {
            let mut keys: Vec<_> = (0..n as u8)
                .map(|i| signing_key_from_seed(&[i + 1; 32]))
                .collect();
            keys.sort_by_key(|k| k.verification_key().to_bytes());
            let parties: Vec<Party> =
                keys.iter().map(|k| Party::new(k.verification_key())).collect();
            let parameters = HeadParameters::new(
                ContestationPeriod::from_secs(PERIOD_SECS),
                parties.clone(),
            );

            let nodes = keys
                .into_iter()
                .map(|key| {
                    let others: Vec<Party> = parties
                        .iter()
                        .copied()
                        .filter(|p| *p != Party::new(key.verification_key()))
                        .collect();
                    let env = Environment::new(
                        key,
                        others,
                        ContestationPeriod::from_secs(PERIOD_SECS),
                    );
                    HeadLogic::new(
                        env,
                        MockLedger,
                        LogicConfig::default(),
                        ChainState::at_slot(0),
                    )
                })
                .collect();

            Self {
                nodes,
                parameters,
                head_id: HeadId::new("head-under-test"),
                slot: 0,
            }
        }

        fn party(&self, i: usize) -> Party {
            self.parameters.parties[i]
        }

        fn next_chain_state(&mut self) -> ChainState {
            self.slot += 1;
            ChainState::at_slot(self.slot)
        }

        /// Observe the same chain event on every node.
        fn observe_all(&mut self, observed: Observation<MockLedger>) -> Vec<Vec<Effect<MockLedger>>> {
            let chain_state = self.next_chain_state();
            self.nodes
                .iter_mut()
                .map(|node| {
                    node.handle(Input::Chain {
                        event: ChainEvent::Observation {
                            observed: observed.clone(),
                            new_chain_state: chain_state.clone(),
                        },
                    })
                })
                .collect()
        }

        /// Deliver a network message to every node (loopback included),
        /// then recursively deliver any broadcasts those deliveries cause.
        fn deliver(&mut self, from: Party, msg: Message<MockLedger>) -> Vec<Effect<MockLedger>> {
            let mut all_effects = Vec::new();
            let mut pending = vec![(from, msg)];
            while let Some((from, msg)) = pending.pop() {
                for node in self.nodes.iter_mut() {
                    let effects = node.handle(Input::Network {
                        ttl: LogicConfig::default().req_tx_ttl,
                        from,
                        msg: msg.clone(),
                    });
                    for effect in &effects {
                        if let Effect::Broadcast { msg } = effect {
                            pending.push((node.party(), msg.clone()));
                        }
                    }
                    all_effects.extend(effects);
                }
            }
            all_effects
        }

        /// Bring every node to `Open` with one genesis output per party.
        fn open_head(&mut self) -> UtxoSet {
            self.observe_all(Observation::Init {
                head_id: self.head_id.clone(),
                parameters: self.parameters.clone(),
                seed: Hash::from_bytes(b"seed"),
            });
            let mut expected = UtxoSet::new();
            for i in 0..self.nodes.len() {
                let utxo = per_party_utxo(i);
                expected = MockLedger.union(&expected, &utxo);
                let party = self.party(i);
                self.observe_all(Observation::Commit {
                    head_id: self.head_id.clone(),
                    party,
                    utxo,
                });
            }
            self.observe_all(Observation::CollectCom {
                head_id: self.head_id.clone(),
            });
            expected
        }
    }

    fn per_party_utxo(i: usize) -> UtxoSet {
        UtxoSet::genesis(&[TxOut::new(format!("party-{i}"), 100)])
    }

    fn outputs(effects: &[Effect<MockLedger>]) -> Vec<&ServerOutput<MockLedger>> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::ClientOutput { output } => Some(output),
                _ => None,
            })
            .collect()
    }

    fn posted(effects: &[Effect<MockLedger>]) -> Vec<&PostChainTx<MockLedger>> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::PostTx { tx } => Some(tx),
                _ => None,
            })
            .collect()
    }

    // ─── Init & commits ─────────────────────────────────────────────────

    #[test]
    fn init_command_posts_init_tx_only_when_idle() {
        let mut fx = Fixture::new(2);
        let effects = fx.nodes[0].handle(Input::Client {
            command: ClientCommand::Init,
        });
        assert!(matches!(
            effects.as_slice(),
            [Effect::PostTx {
                tx: PostChainTx::InitTx { .. }
            }]
        ));

        fx.open_head();
        let effects = fx.nodes[0].handle(Input::Client {
            command: ClientCommand::Init,
        });
        assert!(matches!(
            outputs(&effects).as_slice(),
            [ServerOutput::CommandFailed { .. }]
        ));
    }

    #[test]
    fn observed_init_transitions_to_initial() {
        let mut fx = Fixture::new(2);
        let all = fx.observe_all(Observation::Init {
            head_id: fx.head_id.clone(),
            parameters: fx.parameters.clone(),
            seed: Hash::from_bytes(b"seed"),
        });
        for effects in &all {
            assert!(matches!(
                outputs(effects).as_slice(),
                [ServerOutput::HeadIsInitializing { .. }]
            ));
        }
        for node in &fx.nodes {
            assert!(matches!(node.state(), HeadState::Initial(_)));
        }
    }

    #[test]
    fn foreign_init_is_ignored() {
        // An init whose party set does not contain us must not transition.
        let mut fx = Fixture::new(2);
        let strangers = HeadParameters::new(
            ContestationPeriod::from_secs(PERIOD_SECS),
            (10..13u8)
                .map(|i| Party::new(signing_key_from_seed(&[i; 32]).verification_key()))
                .collect(),
        );
        let all = fx.observe_all(Observation::Init {
            head_id: HeadId::new("someone-elses-head"),
            parameters: strangers,
            seed: Hash::from_bytes(b"seed"),
        });
        for effects in &all {
            assert!(effects.is_empty());
        }
        for node in &fx.nodes {
            assert!(matches!(node.state(), HeadState::Idle { .. }));
        }
    }

    #[test]
    fn foreign_head_events_are_ignored_once_initializing() {
        let mut fx = Fixture::new(2);
        fx.observe_all(Observation::Init {
            head_id: fx.head_id.clone(),
            parameters: fx.parameters.clone(),
            seed: Hash::from_bytes(b"seed"),
        });
        let all = fx.observe_all(Observation::Abort {
            head_id: HeadId::new("some-other-head"),
        });
        for effects in &all {
            assert!(effects.is_empty());
        }
        for node in &fx.nodes {
            assert!(matches!(node.state(), HeadState::Initial(_)));
        }
    }

    #[test]
    fn duplicate_commit_is_a_no_op() {
        let mut fx = Fixture::new(2);
        fx.observe_all(Observation::Init {
            head_id: fx.head_id.clone(),
            parameters: fx.parameters.clone(),
            seed: Hash::from_bytes(b"seed"),
        });

        let party = fx.party(0);
        let utxo = per_party_utxo(0);
        let first = fx.observe_all(Observation::Commit {
            head_id: fx.head_id.clone(),
            party,
            utxo: utxo.clone(),
        });
        assert!(matches!(
            outputs(&first[0]).as_slice(),
            [ServerOutput::Committed { .. }]
        ));

        let second = fx.observe_all(Observation::Commit {
            head_id: fx.head_id.clone(),
            party,
            utxo,
        });
        for effects in &second {
            assert!(effects.is_empty());
        }
    }

    #[test]
    fn full_commit_set_requests_collect() {
        let mut fx = Fixture::new(2);
        fx.observe_all(Observation::Init {
            head_id: fx.head_id.clone(),
            parameters: fx.parameters.clone(),
            seed: Hash::from_bytes(b"seed"),
        });
        let party0 = fx.party(0);
        let party1 = fx.party(1);
        let first = fx.observe_all(Observation::Commit {
            head_id: fx.head_id.clone(),
            party: party0,
            utxo: per_party_utxo(0),
        });
        assert!(posted(&first[0]).is_empty());

        let second = fx.observe_all(Observation::Commit {
            head_id: fx.head_id.clone(),
            party: party1,
            utxo: per_party_utxo(1),
        });
        assert!(matches!(
            posted(&second[0]).as_slice(),
            [PostChainTx::CollectComTx { .. }]
        ));
    }

    #[test]
    fn commit_command_rejects_legacy_outputs() {
        let mut fx = Fixture::new(2);
        fx.observe_all(Observation::Init {
            head_id: fx.head_id.clone(),
            parameters: fx.parameters.clone(),
            seed: Hash::from_bytes(b"seed"),
        });

        let legacy = UtxoSet::genesis(&[TxOut::legacy("old-school", 5)]);
        let effects = fx.nodes[0].handle(Input::Client {
            command: ClientCommand::Commit { utxo: legacy },
        });
        match outputs(&effects).as_slice() {
            [ServerOutput::CommandFailed { reason, .. }] => {
                assert!(reason.contains("legacy"), "unexpected reason: {reason}");
            }
            other => panic!("expected CommandFailed, got {other:?}"),
        }
    }

    #[test]
    fn collect_com_opens_head_with_union_of_commits() {
        let mut fx = Fixture::new(2);
        let expected = fx.open_head();
        for node in &fx.nodes {
            match node.state() {
                HeadState::Open(open) => {
                    assert_eq!(open.coordinated.initial_utxo, expected);
                    assert_eq!(open.coordinated.confirmed_snapshot.number(), 0);
                }
                other => panic!("expected Open, got {}", other.status_name()),
            }
        }
    }

    #[test]
    fn abort_finalizes_with_committed_utxo() {
        // S2: only one party commits, then aborts.
        let mut fx = Fixture::new(2);
        fx.observe_all(Observation::Init {
            head_id: fx.head_id.clone(),
            parameters: fx.parameters.clone(),
            seed: Hash::from_bytes(b"seed"),
        });
        let party0 = fx.party(0);
        let utxo = per_party_utxo(0);
        fx.observe_all(Observation::Commit {
            head_id: fx.head_id.clone(),
            party: party0,
            utxo: utxo.clone(),
        });

        let effects = fx.nodes[0].handle(Input::Client {
            command: ClientCommand::Abort,
        });
        assert!(matches!(
            posted(&effects).as_slice(),
            [PostChainTx::AbortTx { .. }]
        ));

        let all = fx.observe_all(Observation::Abort {
            head_id: fx.head_id.clone(),
        });
        for effects in &all {
            match outputs(effects).as_slice() {
                [ServerOutput::HeadIsAborted { utxo: aborted, .. }] => {
                    assert_eq!(aborted, &utxo)
                }
                other => panic!("expected HeadIsAborted, got {other:?}"),
            }
        }
        for node in &fx.nodes {
            assert!(matches!(node.state(), HeadState::Final { .. }));
        }
    }

    // ─── Transactions & snapshots ───────────────────────────────────────

    fn spend_first_output(utxo: &UtxoSet, to: &str) -> MockTx {
        let input = utxo.references().next().unwrap();
        let value = utxo.iter().next().unwrap().1.value;
        MockTx::new(vec![input], vec![TxOut::new(to, value)])
    }

    #[test]
    fn new_tx_validates_before_broadcast() {
        // S3: an unapplicable transaction is rejected without hitting the wire.
        let mut fx = Fixture::new(2);
        fx.open_head();

        let phantom = MockTx::new(
            vec![hydra_ledger::TxIn {
                tx_id: Hash::from_bytes(b"not in head"),
                index: 0,
            }],
            vec![TxOut::new("nobody", 1)],
        );
        let effects = fx.nodes[0].handle(Input::Client {
            command: ClientCommand::NewTx {
                transaction: phantom,
            },
        });
        assert!(matches!(
            outputs(&effects).as_slice(),
            [ServerOutput::TxInvalid { .. }]
        ));
        assert!(!effects.iter().any(|e| matches!(e, Effect::Broadcast { .. })));
    }

    #[test]
    fn valid_new_tx_broadcasts_req_tx() {
        let mut fx = Fixture::new(2);
        let utxo = fx.open_head();
        let tx = spend_first_output(&utxo, "recipient");

        let effects = fx.nodes[0].handle(Input::Client {
            command: ClientCommand::NewTx {
                transaction: tx.clone(),
            },
        });
        assert!(matches!(
            effects.as_slice(),
            [
                Effect::Broadcast {
                    msg: Message::ReqTx { .. }
                },
                Effect::ClientOutput {
                    output: ServerOutput::TxValid { .. }
                },
            ]
        ));
    }

    #[test]
    fn snapshot_confirms_with_all_signatures() {
        // S1 core: one transaction, one snapshot, unanimously signed.
        let mut fx = Fixture::new(2);
        let utxo = fx.open_head();
        let tx = spend_first_output(&utxo, "recipient");

        let submitter = fx.nodes[0].party();
        fx.nodes[0].handle(Input::Client {
            command: ClientCommand::NewTx {
                transaction: tx.clone(),
            },
        });
        let effects = fx.deliver(submitter, Message::ReqTx { transaction: tx.clone() });

        let confirmations: Vec<_> = outputs(&effects)
            .into_iter()
            .filter(|o| matches!(o, ServerOutput::SnapshotConfirmed { .. }))
            .cloned()
            .collect();
        // Every node reports the snapshot exactly once.
        assert_eq!(confirmations.len(), fx.nodes.len());

        for node in &fx.nodes {
            match node.state() {
                HeadState::Open(open) => {
                    let confirmed = &open.coordinated.confirmed_snapshot;
                    assert_eq!(confirmed.number(), 1);
                    assert!(open.coordinated.seen_snapshot.is_none());
                    assert!(open.coordinated.seen_txs.is_empty());
                    assert!(open.coordinated.all_txs.is_empty());
                    match confirmed {
                        ConfirmedSnapshot::Confirmed { snapshot, signatures } => {
                            assert_eq!(snapshot.confirmed_transactions, vec![tx.clone()]);
                            assert_eq!(signatures.len(), 2);
                        }
                        other => panic!("expected Confirmed, got {other:?}"),
                    }
                }
                other => panic!("expected Open, got {}", other.status_name()),
            }
        }
    }

    #[test]
    fn req_sn_from_non_leader_is_ignored() {
        let mut fx = Fixture::new(2);
        let utxo = fx.open_head();
        let tx = spend_first_output(&utxo, "recipient");

        // leader(1) is parties[1]; party 0 illegitimately proposes.
        let ids = vec![MockLedger.tx_id(&tx)];
        let intruder = fx.party(0);
        let effects = fx.nodes[1].handle(Input::Network {
            ttl: 5,
            from: intruder,
            msg: Message::ReqSn {
                snapshot_number: 1,
                transaction_ids: ids,
            },
        });
        assert!(effects.is_empty());
    }

    #[test]
    fn req_sn_with_wrong_number_is_ignored() {
        let mut fx = Fixture::new(2);
        let utxo = fx.open_head();
        let tx = spend_first_output(&utxo, "recipient");
        let leader = fx.party(0); // leader(2) = parties[0]

        let effects = fx.nodes[1].handle(Input::Network {
            ttl: 5,
            from: leader,
            msg: Message::ReqSn {
                snapshot_number: 2,
                transaction_ids: vec![MockLedger.tx_id(&tx)],
            },
        });
        assert!(effects.is_empty());
    }

    #[test]
    fn duplicate_ack_sn_is_idempotent() {
        // S6: the signature set does not grow and no second confirmation
        // is emitted.
        let mut fx = Fixture::new(3);
        let utxo = fx.open_head();
        let tx = spend_first_output(&utxo, "recipient");

        // Apply the transaction on every node.
        let submitter = fx.party(0);
        for node in fx.nodes.iter_mut() {
            node.handle(Input::Network {
                ttl: 5,
                from: submitter,
                msg: Message::ReqTx {
                    transaction: tx.clone(),
                },
            });
        }

        // The leader for snapshot 1 proposes; observe it on node 0 only.
        let leader = fx.party(1);
        let leader_index = 1;
        let ack_effects = {
            let leader_node = &mut fx.nodes[leader_index];
            leader_node.handle(Input::Network {
                ttl: 5,
                from: leader,
                msg: Message::ReqSn {
                    snapshot_number: 1,
                    transaction_ids: vec![MockLedger.tx_id(&tx)],
                },
            })
        };
        let ack = ack_effects
            .iter()
            .find_map(|e| match e {
                Effect::Broadcast { msg } => Some(msg.clone()),
                _ => None,
            })
            .expect("leader acknowledges its own proposal");

        fx.nodes[0].handle(Input::Network {
            ttl: 5,
            from: leader,
            msg: Message::ReqSn {
                snapshot_number: 1,
                transaction_ids: vec![MockLedger.tx_id(&tx)],
            },
        });

        let first = fx.nodes[0].handle(Input::Network {
            ttl: 5,
            from: leader,
            msg: ack.clone(),
        });
        assert!(first.is_empty(), "two of three signatures is not unanimity");

        let sig_count = |node: &HeadLogic<MockLedger>| match node.state() {
            HeadState::Open(open) => open
                .coordinated
                .seen_snapshot
                .as_ref()
                .map(|s| s.signatures.len())
                .unwrap_or(0),
            _ => 0,
        };
        let before = sig_count(&fx.nodes[0]);
        let second = fx.nodes[0].handle(Input::Network {
            ttl: 5,
            from: leader,
            msg: ack,
        });
        assert!(second.is_empty());
        assert_eq!(sig_count(&fx.nodes[0]), before);
    }

    #[test]
    fn ack_sn_with_bad_signature_is_dropped() {
        let mut fx = Fixture::new(2);
        let utxo = fx.open_head();
        let tx = spend_first_output(&utxo, "recipient");

        let submitter = fx.party(0);
        for node in fx.nodes.iter_mut() {
            node.handle(Input::Network {
                ttl: 5,
                from: submitter,
                msg: Message::ReqTx {
                    transaction: tx.clone(),
                },
            });
        }
        let leader = fx.party(1);
        fx.nodes[0].handle(Input::Network {
            ttl: 5,
            from: leader,
            msg: Message::ReqSn {
                snapshot_number: 1,
                transaction_ids: vec![MockLedger.tx_id(&tx)],
            },
        });

        // A signature over the wrong bytes must not count.
        let forged = signing_key_from_seed(&[2; 32]).sign(b"anything else");
        let effects = fx.nodes[0].handle(Input::Network {
            ttl: 5,
            from: leader,
            msg: Message::AckSn {
                party: leader,
                snapshot_number: 1,
                signature: forged,
            },
        });
        assert!(effects.is_empty());
        match fx.nodes[0].state() {
            HeadState::Open(open) => {
                let seen = open.coordinated.seen_snapshot.as_ref().unwrap();
                // Only our own signature is in the set.
                assert_eq!(seen.signatures.len(), 1);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn req_tx_with_missing_inputs_retries_until_ttl_expires() {
        let mut fx = Fixture::new(2);
        fx.open_head();

        let phantom = MockTx::new(
            vec![hydra_ledger::TxIn {
                tx_id: Hash::from_bytes(b"still in flight"),
                index: 0,
            }],
            vec![TxOut::new("nobody", 1)],
        );
        let from = fx.party(1);

        let mut input = Input::Network {
            ttl: 2,
            from,
            msg: Message::ReqTx {
                transaction: phantom,
            },
        };
        let mut retries = 0;
        loop {
            let effects = fx.nodes[0].handle(input);
            match effects.as_slice() {
                [Effect::Delay { input: delayed, .. }] => {
                    retries += 1;
                    input = (**delayed).clone();
                }
                [Effect::ClientOutput {
                    output: ServerOutput::TxInvalid { .. },
                }] => break,
                other => panic!("unexpected effects: {other:?}"),
            }
            assert!(retries <= 2, "retried past the TTL budget");
        }
        assert_eq!(retries, 2);
    }

    // ─── Close / contest / fanout ───────────────────────────────────────

    fn close_head(fx: &mut Fixture, snapshot_number: u64, deadline: SystemTime) {
        fx.observe_all(Observation::Close {
            head_id: fx.head_id.clone(),
            snapshot_number,
            contestation_deadline: deadline,
        });
    }

    #[test]
    fn close_schedules_deadline_and_tick_makes_fanout_possible() {
        let mut fx = Fixture::new(2);
        fx.open_head();
        let deadline = SystemTime::UNIX_EPOCH + Duration::from_secs(100);

        let chain_state = fx.next_chain_state();
        let effects = fx.nodes[0].handle(Input::Chain {
            event: ChainEvent::Observation {
                observed: Observation::Close {
                    head_id: fx.head_id.clone(),
                    snapshot_number: 0,
                    contestation_deadline: deadline,
                },
                new_chain_state: chain_state,
            },
        });
        assert!(matches!(
            effects.as_slice(),
            [
                Effect::ClientOutput {
                    output: ServerOutput::HeadIsClosed { .. }
                },
                Effect::Delay { until, .. },
            ] if *until == deadline
        ));

        // A tick before the deadline changes nothing.
        let early = fx.nodes[0].handle(Input::Tick {
            now: deadline - Duration::from_secs(1),
        });
        assert!(early.is_empty());

        // Fanout before the deadline is refused.
        let refused = fx.nodes[0].handle(Input::Client {
            command: ClientCommand::Fanout,
        });
        assert!(matches!(
            outputs(&refused).as_slice(),
            [ServerOutput::CommandFailed { .. }]
        ));

        let due = fx.nodes[0].handle(Input::Tick { now: deadline });
        assert!(matches!(
            outputs(&due).as_slice(),
            [ServerOutput::ReadyToFanout { .. }]
        ));

        // Ready is edge-triggered; later ticks stay silent.
        let again = fx.nodes[0].handle(Input::Tick {
            now: deadline + Duration::from_secs(1),
        });
        assert!(again.is_empty());

        let fanout = fx.nodes[0].handle(Input::Client {
            command: ClientCommand::Fanout,
        });
        assert!(matches!(
            posted(&fanout).as_slice(),
            [PostChainTx::FanoutTx { .. }]
        ));
    }

    #[test]
    fn contest_extends_deadline_and_raises_recorded_number() {
        // S4: closed with an old snapshot, contested with a newer one.
        let mut fx = Fixture::new(2);
        let utxo = fx.open_head();
        let tx = spend_first_output(&utxo, "recipient");
        let submitter = fx.party(0);
        fx.deliver(submitter, Message::ReqTx { transaction: tx });

        // All nodes confirmed snapshot 1; the chain records a close with 0.
        let deadline = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        close_head(&mut fx, 0, deadline);

        let contest = fx.nodes[0].handle(Input::Client {
            command: ClientCommand::Contest,
        });
        assert!(matches!(
            posted(&contest).as_slice(),
            [PostChainTx::ContestTx { .. }]
        ));

        let all = fx.observe_all(Observation::Contest {
            head_id: fx.head_id.clone(),
            snapshot_number: 1,
        });
        for effects in &all {
            assert!(matches!(
                effects.as_slice(),
                [
                    Effect::ClientOutput {
                        output: ServerOutput::HeadIsContested {
                            snapshot_number: 1,
                            ..
                        }
                    },
                    Effect::Delay { until, .. },
                ] if *until == deadline + Duration::from_secs(PERIOD_SECS)
            ));
        }

        // Contesting again with the same number has no effect.
        let stale = fx.observe_all(Observation::Contest {
            head_id: fx.head_id.clone(),
            snapshot_number: 1,
        });
        for effects in &stale {
            assert!(effects.is_empty());
        }

        // A second contest is now refused client-side: our confirmed
        // snapshot no longer beats the recorded number.
        let refused = fx.nodes[0].handle(Input::Client {
            command: ClientCommand::Contest,
        });
        assert!(matches!(
            outputs(&refused).as_slice(),
            [ServerOutput::CommandFailed { .. }]
        ));
    }

    #[test]
    fn fanout_observation_finalizes_head() {
        let mut fx = Fixture::new(2);
        let expected = fx.open_head();
        close_head(
            &mut fx,
            0,
            SystemTime::UNIX_EPOCH + Duration::from_secs(100),
        );
        let all = fx.observe_all(Observation::Fanout {
            head_id: fx.head_id.clone(),
        });
        for effects in &all {
            match outputs(effects).as_slice() {
                [ServerOutput::HeadIsFinalized { utxo, .. }] => assert_eq!(utxo, &expected),
                other => panic!("expected HeadIsFinalized, got {other:?}"),
            }
        }
    }

    // ─── Rollback ───────────────────────────────────────────────────────

    #[test]
    fn rollback_erases_init() {
        // S5: rolling back past the init returns to Idle.
        let mut fx = Fixture::new(2);
        fx.observe_all(Observation::Init {
            head_id: fx.head_id.clone(),
            parameters: fx.parameters.clone(),
            seed: Hash::from_bytes(b"seed"),
        });
        assert!(matches!(fx.nodes[0].state(), HeadState::Initial(_)));

        let effects = fx.nodes[0].handle(Input::Chain {
            event: ChainEvent::Rollback {
                rolled_back_to: ChainState::at_slot(0),
            },
        });
        assert!(matches!(
            outputs(&effects).as_slice(),
            [ServerOutput::RolledBack]
        ));
        match fx.nodes[0].state() {
            HeadState::Idle { chain_state } => assert_eq!(chain_state.slot, ChainSlot(0)),
            other => panic!("expected Idle, got {}", other.status_name()),
        }
    }

    #[test]
    fn rollback_to_mid_initial_keeps_earlier_commits() {
        let mut fx = Fixture::new(2);
        fx.observe_all(Observation::Init {
            head_id: fx.head_id.clone(),
            parameters: fx.parameters.clone(),
            seed: Hash::from_bytes(b"seed"),
        });
        let party0 = fx.party(0);
        let party1 = fx.party(1);
        fx.observe_all(Observation::Commit {
            head_id: fx.head_id.clone(),
            party: party0,
            utxo: per_party_utxo(0),
        });
        let commit0_slot = fx.slot;
        fx.observe_all(Observation::Commit {
            head_id: fx.head_id.clone(),
            party: party1,
            utxo: per_party_utxo(1),
        });

        fx.nodes[0].handle(Input::Chain {
            event: ChainEvent::Rollback {
                rolled_back_to: ChainState::at_slot(commit0_slot),
            },
        });
        match fx.nodes[0].state() {
            HeadState::Initial(initial) => {
                assert!(initial.committed.contains_key(&party0));
                assert!(!initial.committed.contains_key(&party1));
            }
            other => panic!("expected Initial, got {}", other.status_name()),
        }
    }

    #[test]
    fn vacuous_rollback_is_ignored() {
        let mut fx = Fixture::new(2);
        fx.open_head();
        let ahead = fx.slot + 10;
        let effects = fx.nodes[0].handle(Input::Chain {
            event: ChainEvent::Rollback {
                rolled_back_to: ChainState::at_slot(ahead),
            },
        });
        assert!(effects.is_empty());
        assert!(matches!(fx.nodes[0].state(), HeadState::Open(_)));
    }

    // ─── Failures ───────────────────────────────────────────────────────

    #[test]
    fn post_tx_failure_surfaces_without_state_change() {
        let mut fx = Fixture::new(2);
        let utxo = fx.open_head();
        let before = fx.nodes[0].state().clone();

        let effects = fx.nodes[0].handle(Input::Chain {
            event: ChainEvent::PostTxFailed {
                failed_tx: PostChainTx::FanoutTx {
                    head_id: fx.head_id.clone(),
                    utxo,
                },
                reason: "transaction exceeds size limit".into(),
            },
        });
        assert!(matches!(
            outputs(&effects).as_slice(),
            [ServerOutput::PostTxOnChainFailed { .. }]
        ));
        assert_eq!(fx.nodes[0].state(), &before);
    }

    #[test]
    fn persisted_roundtrip_preserves_state() {
        let mut fx = Fixture::new(2);
        let utxo = fx.open_head();
        let tx = spend_first_output(&utxo, "recipient");
        let submitter = fx.party(0);
        fx.deliver(submitter, Message::ReqTx { transaction: tx });

        let persisted = fx.nodes[0].persisted();
        let json = serde_json::to_string(&persisted).unwrap();
        let reloaded: PersistedState<MockLedger> = serde_json::from_str(&json).unwrap();
        assert_eq!(persisted, reloaded);

        let env = Environment::new(
            signing_key_from_seed(&[1; 32]),
            vec![fx.party(1)],
            ContestationPeriod::from_secs(PERIOD_SECS),
        );
        let restored = HeadLogic::restore(env, MockLedger, LogicConfig::default(), reloaded);
        assert_eq!(restored.state(), fx.nodes[0].state());
    }
}
