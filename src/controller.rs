use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex};

use crate::auth::Administrator;
use crate::clock::{SharedClock, Timestamp};
use crate::error::{Error, Result};
use crate::logging::operation;
use crate::model::{
    candidate::{Candidate, CandidateId},
    election::{ElectionMetadata, ElectionPhase, VotingWindow},
    event::{Event, SharedSink},
    identity::Identity,
    results::ElectionResults,
    voter::VoterHash,
};
use crate::registry::{BallotCapability, VoterRegistry, VoterTable};
use crate::transaction::{atomically, read, Transaction};

/// Everything the controller owns, guarded as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ElectionRecord {
    pub metadata: ElectionMetadata,
    /// Indexed by candidate ID.
    pub candidates: Vec<Candidate>,
    /// Written exactly once per voter, alongside the tally.
    pub vote_records: HashMap<VoterHash, CandidateId>,
}

impl ElectionRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            metadata: ElectionMetadata::new(name),
            candidates: Vec::new(),
            vote_records: HashMap::new(),
        }
    }

    fn require_phase(&self, expected: ElectionPhase, action: &str) -> Result<()> {
        if self.metadata.phase == expected {
            Ok(())
        } else {
            Err(Error::State(format!(
                "Cannot {action}: election '{}' is {}, not {expected}",
                self.metadata.name, self.metadata.phase
            )))
        }
    }
}

/// Drives the election through its phases and casts votes against the registry.
pub struct ElectionController {
    admin: Administrator,
    state: Mutex<ElectionRecord>,
    ballots: BallotCapability,
    clock: SharedClock,
    events: SharedSink,
}

impl ElectionController {
    /// Create an election in the `Created` phase, wired to `registry`.
    ///
    /// The caller must be the registry's administrator, who becomes the
    /// election's administrator too. Each registry serves a single controller.
    pub fn new(
        caller: &Identity,
        name: impl Into<String>,
        registry: &Arc<VoterRegistry>,
        clock: SharedClock,
        events: SharedSink,
    ) -> Result<Self> {
        let ballots = registry.delegate_ballots(caller)?;
        Ok(Self::with_record(
            ballots,
            ElectionRecord::new(name),
            clock,
            events,
        ))
    }

    pub(crate) fn with_record(
        ballots: BallotCapability,
        record: ElectionRecord,
        clock: SharedClock,
        events: SharedSink,
    ) -> Self {
        Self {
            admin: Administrator::new(ballots.registry().administrator().clone()),
            state: Mutex::new(record),
            ballots,
            clock,
            events,
        }
    }

    /// The registry this election casts votes against.
    pub fn registry(&self) -> &Arc<VoterRegistry> {
        self.ballots.registry()
    }

    /// Append a candidate. Only possible before the election starts.
    pub fn add_candidate(
        &self,
        caller: &Identity,
        name: impl Into<String>,
        party: impl Into<String>,
    ) -> Result<CandidateId> {
        let name = name.into();
        let party = party.into();
        operation("add_candidate", || {
            self.admin.authorize(caller, "add candidates")?;
            atomically(&self.state, |election| {
                election.require_phase(ElectionPhase::Created, "add candidates")?;
                if name.trim().is_empty() {
                    return Err(Error::Validation("Candidate name must not be blank".into()));
                }
                let id = CandidateId::try_from(election.candidates.len())
                    .map_err(|_| Error::Validation("Too many candidates".into()))?;
                election.candidates.push(Candidate::new(id, name, party));
                Ok(id)
            })
        })
    }

    /// Fix the voting window and open the election.
    /// Emits [`Event::ElectionStarted`].
    pub fn start_election(
        &self,
        caller: &Identity,
        start_time: Timestamp,
        end_time: Timestamp,
    ) -> Result<()> {
        operation("start_election", || {
            self.admin.authorize(caller, "start the election")?;
            let mut election = Transaction::begin(&self.state);
            election.require_phase(ElectionPhase::Created, "start the election")?;
            let window = VotingWindow::new(start_time, end_time)?;
            if election.candidates.is_empty() {
                return Err(Error::Validation(
                    "Cannot start an election with no candidates".into(),
                ));
            }
            election.metadata.window = Some(window);
            election.metadata.phase = ElectionPhase::Active;
            let name = election.metadata.name.clone();
            let _published = election.commit();

            self.events.emit(Event::ElectionStarted {
                name,
                start_time,
                end_time,
            });
            Ok(())
        })
    }

    /// Cast a vote for `candidate_id` on behalf of the voter identified by `voter_hash`.
    ///
    /// Marking the voter as voted, recording the vote and incrementing the
    /// tally happen together or not at all. Emits
    /// [`Event::VoterMarkedAsVoted`] followed by [`Event::VoteCast`].
    pub fn cast_vote(&self, voter_hash: VoterHash, candidate_id: CandidateId) -> Result<()> {
        operation("cast_vote", || {
            // Lock order: controller, then registry.
            let mut election = Transaction::begin(&self.state);
            let window = election.metadata.active_window()?;
            let now = self.clock.now();
            if !window.contains(now) {
                return Err(Error::State(format!(
                    "Voting is open during [{}, {}], not at {now}",
                    window.start_time, window.end_time
                )));
            }

            let mut ballots = self.ballots.begin();
            if !ballots.is_eligible(&voter_hash) {
                return Err(Error::Authorization(format!(
                    "Voter {voter_hash} is not eligible to vote"
                )));
            }
            let index = usize::try_from(candidate_id).unwrap_or(usize::MAX);
            if index >= election.candidates.len() {
                return Err(Error::Validation(format!(
                    "No candidate with ID {candidate_id}"
                )));
            }

            ballots.mark_voted(voter_hash)?;
            if election.vote_records.insert(voter_hash, candidate_id).is_some() {
                return Err(Error::Duplicate(format!(
                    "A vote is already recorded for voter {voter_hash}"
                )));
            }
            election.candidates[index].vote_count += 1;

            // Both locks are held until both halves are published; the
            // controller's until VoteCast is emitted.
            let _published = election.commit();
            ballots.commit();

            self.events.emit(Event::VoteCast {
                voter_hash,
                candidate_id,
            });
            Ok(())
        })
    }

    /// Close the election once its window has passed.
    /// Emits [`Event::ElectionEnded`] with the closing time.
    pub fn end_election(&self, caller: &Identity) -> Result<()> {
        operation("end_election", || {
            self.admin.authorize(caller, "end the election")?;
            let mut election = Transaction::begin(&self.state);
            let window = election.metadata.active_window()?;
            let now = self.clock.now();
            if now < window.end_time {
                return Err(Error::State(format!(
                    "Voting continues until {}, it is now {now}",
                    window.end_time
                )));
            }
            election.metadata.phase = ElectionPhase::Closed;
            let _published = election.commit();

            self.events.emit(Event::ElectionEnded { end_time: now });
            Ok(())
        })
    }

    /// Make the results of a closed election public.
    /// Emits [`Event::ResultDeclared`].
    pub fn declare_results(&self, caller: &Identity) -> Result<()> {
        operation("declare_results", || {
            self.admin.authorize(caller, "declare results")?;
            let mut election = Transaction::begin(&self.state);
            election.require_phase(ElectionPhase::Closed, "declare results")?;
            election.metadata.phase = ElectionPhase::ResultDeclared;
            let _published = election.commit();

            self.events.emit(Event::ResultDeclared);
            Ok(())
        })
    }

    /// Candidate IDs and tallies in insertion order, once declared.
    pub fn get_results(&self) -> Result<ElectionResults> {
        read(&self.state, |election| {
            election.require_phase(ElectionPhase::ResultDeclared, "read results")?;
            Ok(ElectionResults::from_candidates(&election.candidates))
        })
    }

    pub fn candidate_count(&self) -> usize {
        read(&self.state, |election| election.candidates.len())
    }

    pub fn candidate(&self, candidate_id: CandidateId) -> Option<Candidate> {
        read(&self.state, |election| {
            usize::try_from(candidate_id)
                .ok()
                .and_then(|i| election.candidates.get(i))
                .cloned()
        })
    }

    pub fn candidates(&self) -> Vec<Candidate> {
        read(&self.state, |election| election.candidates.clone())
    }

    pub fn metadata(&self) -> ElectionMetadata {
        read(&self.state, |election| election.metadata.clone())
    }

    pub fn phase(&self) -> ElectionPhase {
        read(&self.state, |election| election.metadata.phase)
    }

    /// The candidate a voter chose, if they voted through this election.
    pub fn vote_of(&self, voter_hash: &VoterHash) -> Option<CandidateId> {
        read(&self.state, |election| {
            election.vote_records.get(voter_hash).copied()
        })
    }

    /// Sum of all tallies.
    pub fn total_votes(&self) -> u64 {
        read(&self.state, |election| {
            election.candidates.iter().map(|c| c.vote_count).sum()
        })
    }

    /// Read the controller's state and the registry's voters as one consistent snapshot.
    pub(crate) fn read_with_voters<R>(
        &self,
        op: impl FnOnce(&ElectionRecord, &VoterTable) -> R,
    ) -> R {
        read(&self.state, |election| {
            self.registry().read_voters(|voters| op(election, voters))
        })
    }
}

impl Debug for ElectionController {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElectionController")
            .field("admin", &self.admin)
            .finish_non_exhaustive()
    }
}
