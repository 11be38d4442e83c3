//! Head identity and immutable protocol parameters.

use crate::party::Party;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Opaque identifier of a head instance, minted by the chain at init.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeadId(String);

impl HeadId {
    /// Wrap an identifier string (hex-rendered on chain).
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier bytes used in canonical signing messages.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for HeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HeadId({})", self.0)
    }
}

impl fmt::Display for HeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wall-clock window after a close during which contests are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContestationPeriod(pub Duration);

impl ContestationPeriod {
    /// Construct from whole seconds, the on-chain granularity.
    pub fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    /// The underlying duration.
    pub fn duration(&self) -> Duration {
        self.0
    }
}

/// Immutable parameters of a head, fixed at initialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadParameters {
    /// Contestation window applied after close and per contest.
    pub contestation_period: ContestationPeriod,
    /// Canonically ordered party set. Sorted on construction; every
    /// index-based rule (leader rotation, signature slots) reads this order.
    pub parties: Vec<Party>,
}

impl HeadParameters {
    /// Build parameters with the party set brought into canonical order.
    pub fn new(contestation_period: ContestationPeriod, mut parties: Vec<Party>) -> Self {
        parties.sort();
        parties.dedup();
        Self {
            contestation_period,
            parties,
        }
    }

    /// Whether `party` belongs to this head.
    pub fn contains(&self, party: &Party) -> bool {
        self.parties.binary_search(party).is_ok()
    }

    /// Canonical index of `party`, if a member.
    pub fn index_of(&self, party: &Party) -> Option<usize> {
        self.parties.binary_search(party).ok()
    }

    /// Snapshot leader for snapshot `number`: deterministic rotation over
    /// the canonical party order.
    pub fn leader(&self, number: u64) -> &Party {
        &self.parties[(number % self.parties.len() as u64) as usize]
    }

    /// Number of parties in the head.
    pub fn len(&self) -> usize {
        self.parties.len()
    }

    /// A head with no parties cannot exist; required by convention.
    pub fn is_empty(&self) -> bool {
        self.parties.is_empty()
    }
}
