use serde::{Deserialize, Serialize};

/// Candidate IDs are dense, zero-based insertion indices.
pub type CandidateId = u32;

/// A candidate standing in the election, with its running tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub name: String,
    pub party: String,
    /// Never decreases.
    pub vote_count: u64,
}

impl Candidate {
    /// Create a candidate with no votes.
    pub fn new(id: CandidateId, name: impl Into<String>, party: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            party: party.into(),
            vote_count: 0,
        }
    }
}
