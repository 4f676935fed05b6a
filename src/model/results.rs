use serde::{Deserialize, Serialize};

use crate::model::candidate::{Candidate, CandidateId};

/// Declared results: parallel candidate IDs and tallies, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionResults {
    pub candidate_ids: Vec<CandidateId>,
    pub vote_counts: Vec<u64>,
}

impl ElectionResults {
    pub fn from_candidates(candidates: &[Candidate]) -> Self {
        let (candidate_ids, vote_counts) = candidates
            .iter()
            .map(|c| (c.id, c.vote_count))
            .unzip();
        Self {
            candidate_ids,
            vote_counts,
        }
    }

    /// Total number of votes counted.
    pub fn total(&self) -> u64 {
        self.vote_counts.iter().sum()
    }

    /// Every candidate sharing the highest tally. Empty if nobody received a vote.
    pub fn winners(&self) -> Vec<CandidateId> {
        let top = self.vote_counts.iter().copied().max().unwrap_or(0);
        if top == 0 {
            return Vec::new();
        }
        self.candidate_ids
            .iter()
            .zip(&self.vote_counts)
            .filter(|(_, count)| **count == top)
            .map(|(&id, _)| id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results(counts: &[u64]) -> ElectionResults {
        let candidates: Vec<_> = counts
            .iter()
            .enumerate()
            .map(|(i, &count)| {
                let mut candidate = Candidate::new(i as CandidateId, format!("C{i}"), "Independent");
                candidate.vote_count = count;
                candidate
            })
            .collect();
        ElectionResults::from_candidates(&candidates)
    }

    #[test]
    fn parallel_sequences() {
        let results = results(&[3, 0, 5]);
        assert_eq!(results.candidate_ids, vec![0, 1, 2]);
        assert_eq!(results.vote_counts, vec![3, 0, 5]);
        assert_eq!(results.total(), 8);
    }

    #[test]
    fn single_winner() {
        assert_eq!(results(&[3, 0, 5]).winners(), vec![2]);
    }

    #[test]
    fn tied_winners() {
        assert_eq!(results(&[4, 4, 1]).winners(), vec![0, 1]);
    }

    #[test]
    fn no_votes_no_winner() {
        assert!(results(&[0, 0]).winners().is_empty());
        assert!(results(&[]).winners().is_empty());
    }
}
