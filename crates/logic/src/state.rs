//! Head state: the typed lifecycle of a single head.

use hydra_core::{ChainSlot, ChainState};
use hydra_ledger::{ConfirmedSnapshot, Ledger, Snapshot};
use hydra_types::{Hash, HeadId, HeadParameters, Party, Signature};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::time::SystemTime;

/// Lifecycle state of the head this node participates in.
///
/// ```text
/// Idle → Initial → Open → Closed → Final
///            └──── Abort ────────────┘
/// ```
///
/// Rollbacks move backwards along observed chain transitions via the
/// checkpoint ring kept by the state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "", tag = "tag")]
pub enum HeadState<L: Ledger> {
    /// No head open; waiting for an init we are part of.
    #[serde(rename_all = "camelCase")]
    Idle { chain_state: ChainState },
    /// Init observed, collecting commits.
    Initial(InitialState<L>),
    /// Head open, running the snapshot protocol.
    Open(OpenState<L>),
    /// Close observed, contestation period running.
    Closed(ClosedState<L>),
    /// Head settled (fanned out or aborted).
    #[serde(rename_all = "camelCase")]
    Final {
        head_id: HeadId,
        utxo: L::UTxO,
        chain_state: ChainState,
    },
}

impl<L: Ledger> HeadState<L> {
    /// Fresh state before any head exists.
    pub fn idle(chain_state: ChainState) -> Self {
        HeadState::Idle { chain_state }
    }

    /// The latest chain state threaded through this head state.
    pub fn chain_state(&self) -> &ChainState {
        match self {
            HeadState::Idle { chain_state } => chain_state,
            HeadState::Initial(s) => &s.chain_state,
            HeadState::Open(s) => &s.chain_state,
            HeadState::Closed(s) => &s.chain_state,
            HeadState::Final { chain_state, .. } => chain_state,
        }
    }

    /// The head id, once one exists.
    pub fn head_id(&self) -> Option<&HeadId> {
        match self {
            HeadState::Idle { .. } => None,
            HeadState::Initial(s) => Some(&s.head_id),
            HeadState::Open(s) => Some(&s.head_id),
            HeadState::Closed(s) => Some(&s.head_id),
            HeadState::Final { head_id, .. } => Some(head_id),
        }
    }

    /// Human-readable status, used in `Greetings`.
    pub fn status_name(&self) -> &'static str {
        match self {
            HeadState::Idle { .. } => "Idle",
            HeadState::Initial(_) => "Initializing",
            HeadState::Open(_) => "Open",
            HeadState::Closed(s) if s.ready_to_fanout => "FanoutPossible",
            HeadState::Closed(_) => "Closed",
            HeadState::Final { .. } => "Final",
        }
    }
}

/// State while collecting commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "", rename_all = "camelCase")]
pub struct InitialState<L: Ledger> {
    pub head_id: HeadId,
    pub parameters: HeadParameters,
    /// One committed UTxO set per party that has committed so far.
    pub committed: BTreeMap<Party, L::UTxO>,
    /// The seed output consumed by the observed init transaction.
    pub seed: Hash,
    pub chain_state: ChainState,
}

/// State of an open head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "", rename_all = "camelCase")]
pub struct OpenState<L: Ledger> {
    pub head_id: HeadId,
    pub parameters: HeadParameters,
    pub coordinated: CoordinatedState<L>,
    pub chain_state: ChainState,
}

/// The off-chain ledger bookkeeping of an open head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "", rename_all = "camelCase")]
pub struct CoordinatedState<L: Ledger> {
    /// UTxO set the head opened with (union of all commits).
    pub initial_utxo: L::UTxO,
    /// Transactions this node submitted, not yet confirmed by a snapshot.
    pub local_txs: Vec<L::Tx>,
    /// Transactions applied to the seen ledger since the last confirmed
    /// snapshot, in application order.
    pub seen_txs: Vec<L::Tx>,
    /// Ledger state after applying `seen_txs` to the confirmed UTxO set.
    pub seen_utxo: L::UTxO,
    /// Latest snapshot confirmed by all parties.
    pub confirmed_snapshot: ConfirmedSnapshot<L>,
    /// In-flight snapshot, if a `ReqSn` was accepted.
    pub seen_snapshot: Option<SeenSnapshot<L>>,
    /// Every transaction seen since the last confirmed snapshot, by id.
    /// `ReqSn` resolves its transaction references here.
    pub all_txs: BTreeMap<Hash, L::Tx>,
}

impl<L: Ledger> CoordinatedState<L> {
    /// Coordinated state right after collect: snapshot 0 over the union of
    /// commits, nothing seen yet.
    pub fn open(initial_utxo: L::UTxO) -> Self {
        Self {
            seen_utxo: initial_utxo.clone(),
            confirmed_snapshot: ConfirmedSnapshot::Initial {
                utxo: initial_utxo.clone(),
            },
            initial_utxo,
            local_txs: Vec::new(),
            seen_txs: Vec::new(),
            seen_snapshot: None,
            all_txs: BTreeMap::new(),
        }
    }
}

/// An accepted snapshot proposal collecting acknowledgements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "", rename_all = "camelCase")]
pub struct SeenSnapshot<L: Ledger> {
    /// The proposed snapshot, already validated against the confirmed UTxO.
    pub candidate: Snapshot<L>,
    /// Collected signatures, keyed by canonical party index. The map makes
    /// duplicate acknowledgements idempotent.
    pub signatures: BTreeMap<usize, Signature>,
}

/// State of a closed head during contestation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "", rename_all = "camelCase")]
pub struct ClosedState<L: Ledger> {
    pub head_id: HeadId,
    pub parameters: HeadParameters,
    /// Our latest confirmed snapshot (may be higher than the closed one,
    /// in which case `Contest` is possible).
    pub confirmed_snapshot: ConfirmedSnapshot<L>,
    /// Snapshot number currently recorded on chain (close or best contest).
    pub closed_snapshot_number: u64,
    /// Deadline after which fanout becomes possible; extended per contest.
    pub contestation_deadline: SystemTime,
    /// Set once the deadline passed.
    pub ready_to_fanout: bool,
    pub chain_state: ChainState,
}

/// A prior head state restorable by rollback.
///
/// Captured after every chain-caused transition, tagged with the slot of
/// the observation that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "", rename_all = "camelCase")]
pub struct Checkpoint<L: Ledger> {
    pub slot: ChainSlot,
    pub state: HeadState<L>,
}

/// What the node persists after every step: the head state plus the
/// checkpoint ring needed to honor rollbacks after a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "", rename_all = "camelCase")]
pub struct PersistedState<L: Ledger> {
    pub head: HeadState<L>,
    pub checkpoints: VecDeque<Checkpoint<L>>,
}
