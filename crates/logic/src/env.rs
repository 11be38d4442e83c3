//! Local identity and static protocol parameters.

use hydra_types::{ContestationPeriod, HeadParameters, Party, SigningKey};

/// The node's identity and the parameters it will initialize heads with.
///
/// Built once at startup from the run options and never mutated.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Our own party.
    pub party: Party,
    /// Key used for snapshot acknowledgements and network envelopes.
    pub signing_key: SigningKey,
    /// The other parties expected in the head.
    pub other_parties: Vec<Party>,
    /// Contestation period for heads we initialize.
    pub contestation_period: ContestationPeriod,
}

impl Environment {
    /// Build an environment from a signing key and the peer parties.
    pub fn new(
        signing_key: SigningKey,
        other_parties: Vec<Party>,
        contestation_period: ContestationPeriod,
    ) -> Self {
        Self {
            party: Party::new(signing_key.verification_key()),
            signing_key,
            other_parties,
            contestation_period,
        }
    }

    /// Head parameters for an init we would post: all parties, canonically
    /// ordered.
    pub fn head_parameters(&self) -> HeadParameters {
        let mut parties = self.other_parties.clone();
        parties.push(self.party);
        HeadParameters::new(self.contestation_period, parties)
    }
}
