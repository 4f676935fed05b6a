use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    candidate::{Candidate, CandidateId},
    election::{ElectionMetadata, ElectionPhase},
    voter::{Voter, VoterHash},
};

/// Everything needed to rebuild an election: voters keyed by hash, candidates
/// by sequence number, the election record, and the vote records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    pub voters: BTreeMap<VoterHash, Voter>,
    pub candidates: Vec<Candidate>,
    pub election: ElectionMetadata,
    pub vote_records: BTreeMap<VoterHash, CandidateId>,
}

impl PersistedState {
    pub fn from_json(json: &str) -> Result<Self> {
        let state: Self = serde_json::from_str(json)
            .map_err(|e| Error::Validation(format!("Malformed persisted state: {e}")))?;
        state.validate()?;
        Ok(state)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Check the relationships the running system maintains between its parts.
    pub fn validate(&self) -> Result<()> {
        for (key, voter) in &self.voters {
            if &voter.voter_hash != key {
                return Err(invalid(format!(
                    "Voter stored under {key} has hash {}",
                    voter.voter_hash
                )));
            }
            if voter.has_voted && !voter.is_registered {
                return Err(invalid(format!(
                    "Voter {key} has voted without being registered"
                )));
            }
        }

        for (index, candidate) in self.candidates.iter().enumerate() {
            if usize::try_from(candidate.id).ok() != Some(index) {
                return Err(invalid(format!(
                    "Candidate at position {index} has ID {}",
                    candidate.id
                )));
            }
        }

        if !self.election.is_consistent() {
            return Err(invalid(format!(
                "Election in phase '{}' has an inconsistent voting window",
                self.election.phase
            )));
        }
        if self.election.phase != ElectionPhase::Created && self.candidates.is_empty() {
            return Err(invalid("A started election must have candidates".into()));
        }
        if self.election.phase == ElectionPhase::Created {
            if !self.vote_records.is_empty() {
                return Err(invalid(format!(
                    "Election has not started but holds {} vote records",
                    self.vote_records.len()
                )));
            }
            if let Some(candidate) = self.candidates.iter().find(|c| c.vote_count != 0) {
                return Err(invalid(format!(
                    "Election has not started but candidate {} has a tally of {}",
                    candidate.id, candidate.vote_count
                )));
            }
        }

        let mut tallies = vec![0u64; self.candidates.len()];
        for (voter_hash, &candidate_id) in &self.vote_records {
            if !self.voters.get(voter_hash).map_or(false, |v| v.has_voted) {
                return Err(invalid(format!(
                    "Vote recorded for {voter_hash}, who is not marked as voted"
                )));
            }
            let tally = usize::try_from(candidate_id)
                .ok()
                .and_then(|i| tallies.get_mut(i))
                .ok_or_else(|| {
                    invalid(format!(
                        "Vote recorded for {voter_hash} names unknown candidate {candidate_id}"
                    ))
                })?;
            *tally += 1;
        }
        for (candidate, tally) in self.candidates.iter().zip(tallies) {
            if candidate.vote_count != tally {
                return Err(invalid(format!(
                    "Candidate {} has a tally of {} but {tally} recorded votes",
                    candidate.id, candidate.vote_count
                )));
            }
        }

        Ok(())
    }
}

fn invalid(message: String) -> Error {
    Error::Validation(message)
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;
    use crate::clock::Timestamp;
    use crate::model::election::VotingWindow;

    impl PersistedState {
        /// Alice has voted for candidate 0; Bob has not voted.
        pub fn example() -> Self {
            let alice = VoterHash::example("alice");
            let mut alice_voter = Voter::example("alice");
            alice_voter.has_voted = true;
            let mut first = Candidate::new(0, "Alice", "Blue");
            first.vote_count = 1;

            let window = VotingWindow::new(Timestamp::from(100), Timestamp::from(200))
                .expect("window is valid");
            Self {
                voters: BTreeMap::from([
                    (alice, alice_voter),
                    (VoterHash::example("bob"), Voter::example("bob")),
                ]),
                candidates: vec![first, Candidate::new(1, "Bob", "Red")],
                election: ElectionMetadata {
                    name: "Student Council 2026".into(),
                    phase: ElectionPhase::Active,
                    window: Some(window),
                },
                vote_records: BTreeMap::from([(alice, 0)]),
            }
        }
    }
}
