//! Peer liveness tracking.
//!
//! A transport-independent state machine in the style of the protocol
//! engines: the runtime feeds it ticks and received heartbeats, it answers
//! with heartbeats to send and connectivity changes to report.

use hydra_types::Party;
use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, SystemTime};

/// Heartbeat timing parameters.
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// How often we announce ourselves.
    pub period: Duration,
    /// Peers missing this many periods are reported down.
    pub miss_threshold: u32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(3),
            miss_threshold: 3,
        }
    }
}

/// Outputs of the liveness state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatOutput {
    /// Time to broadcast our own heartbeat.
    SendHeartbeat,
    /// A peer started (or resumed) responding.
    PeerUp(Party),
    /// A peer missed too many heartbeats.
    PeerDown(Party),
}

/// Tracks which peers are alive based on their heartbeats.
#[derive(Debug)]
pub struct Heartbeat {
    config: HeartbeatConfig,
    /// Last heartbeat seen per tracked peer.
    last_seen: BTreeMap<Party, SystemTime>,
    /// Peers currently considered up.
    alive: BTreeSet<Party>,
    /// When we last sent our own heartbeat.
    last_sent: Option<SystemTime>,
}

impl Heartbeat {
    /// Track the given peers, all initially down.
    pub fn new(config: HeartbeatConfig, peers: impl IntoIterator<Item = Party>) -> Self {
        Self {
            config,
            last_seen: peers.into_iter().map(|p| (p, SystemTime::UNIX_EPOCH)).collect(),
            alive: BTreeSet::new(),
            last_sent: None,
        }
    }

    /// A heartbeat (or any authenticated message) arrived from a peer.
    pub fn on_message(&mut self, from: Party, now: SystemTime) -> Option<HeartbeatOutput> {
        if !self.last_seen.contains_key(&from) {
            return None;
        }
        self.last_seen.insert(from, now);
        if self.alive.insert(from) {
            Some(HeartbeatOutput::PeerUp(from))
        } else {
            None
        }
    }

    /// Advance time: emit our own heartbeat on schedule and demote peers
    /// that have been quiet for too long.
    pub fn on_tick(&mut self, now: SystemTime) -> Vec<HeartbeatOutput> {
        let mut outputs = Vec::new();

        let due = match self.last_sent {
            None => true,
            Some(sent) => now >= sent + self.config.period,
        };
        if due {
            self.last_sent = Some(now);
            outputs.push(HeartbeatOutput::SendHeartbeat);
        }

        let cutoff = self.config.period * self.config.miss_threshold;
        let lapsed: Vec<Party> = self
            .alive
            .iter()
            .copied()
            .filter(|party| {
                self.last_seen
                    .get(party)
                    .is_some_and(|seen| now.duration_since(*seen).unwrap_or_default() > cutoff)
            })
            .collect();
        for party in lapsed {
            self.alive.remove(&party);
            outputs.push(HeartbeatOutput::PeerDown(party));
        }

        outputs
    }

    /// Peers currently considered up.
    pub fn alive(&self) -> impl Iterator<Item = &Party> {
        self.alive.iter()
    }
}
