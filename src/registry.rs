use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::debug;

use crate::auth::Administrator;
use crate::error::{Error, Result};
use crate::logging::operation;
use crate::model::{
    event::{Event, SharedSink},
    identity::Identity,
    voter::{Voter, VoterHash},
};
use crate::transaction::{read, Transaction};

/// Voter records keyed by identity hash.
pub(crate) type VoterTable = HashMap<VoterHash, Voter>;

/// The authoritative record of who may vote and who already has.
///
/// Only the administrator can register voters or mark them as voted directly.
/// The election controller marks voters through a [`BallotCapability`], which
/// the registry hands out exactly once.
pub struct VoterRegistry {
    admin: Administrator,
    voters: Mutex<VoterTable>,
    events: SharedSink,
    delegated: AtomicBool,
}

impl VoterRegistry {
    /// Create an empty registry administered by `administrator`.
    pub fn new(administrator: Identity, events: SharedSink) -> Arc<Self> {
        Self::with_voters(administrator, VoterTable::new(), events)
    }

    pub(crate) fn with_voters(
        administrator: Identity,
        voters: VoterTable,
        events: SharedSink,
    ) -> Arc<Self> {
        Arc::new(Self {
            admin: Administrator::new(administrator),
            voters: Mutex::new(voters),
            events,
            delegated: AtomicBool::new(false),
        })
    }

    pub fn administrator(&self) -> &Identity {
        self.admin.identity()
    }

    /// Register a new voter. Emits [`Event::VoterRegistered`].
    ///
    /// The holder address is the voter's own identity and may not be the
    /// administrator's.
    pub fn register(
        &self,
        caller: &Identity,
        voter_hash: VoterHash,
        holder_address: Identity,
    ) -> Result<()> {
        operation("register", || {
            self.admin.authorize(caller, "register voters")?;
            if &holder_address == self.admin.identity() {
                return Err(Error::Validation(format!(
                    "Voter {voter_hash} cannot be held by the administrator"
                )));
            }
            let mut voters = Transaction::begin(&self.voters);
            if voters.contains_key(&voter_hash) {
                return Err(Error::Duplicate(format!(
                    "Voter {voter_hash} is already registered"
                )));
            }
            voters.insert(voter_hash, Voter::new(voter_hash, holder_address));
            let _published = voters.commit();

            self.events.emit(Event::VoterRegistered { voter_hash });
            Ok(())
        })
    }

    /// Registered and has not yet voted.
    pub fn is_eligible(&self, voter_hash: &VoterHash) -> bool {
        read(&self.voters, |voters| is_eligible_in(voters, voter_hash))
    }

    /// Record that a voter has voted, without casting a ballot.
    /// Emits [`Event::VoterMarkedAsVoted`].
    pub fn mark_voted(&self, caller: &Identity, voter_hash: VoterHash) -> Result<()> {
        operation("mark_voted", || {
            self.admin.authorize(caller, "mark voters as voted")?;
            let mut voters = Transaction::begin(&self.voters);
            mark_voted_in(&mut voters, &voter_hash)?;
            let _published = voters.commit();

            self.events.emit(Event::VoterMarkedAsVoted { voter_hash });
            Ok(())
        })
    }

    pub fn voter(&self, voter_hash: &VoterHash) -> Option<Voter> {
        read(&self.voters, |voters| voters.get(voter_hash).cloned())
    }

    pub fn has_voted(&self, voter_hash: &VoterHash) -> bool {
        read(&self.voters, |voters| {
            voters.get(voter_hash).map_or(false, |v| v.has_voted)
        })
    }

    pub fn voter_count(&self) -> usize {
        read(&self.voters, HashMap::len)
    }

    /// Number of voters recorded as having voted.
    pub fn voted_count(&self) -> usize {
        read(&self.voters, |voters| {
            voters.values().filter(|v| v.has_voted).count()
        })
    }

    /// Issue the capability to mark voters as voted on the administrator's
    /// behalf. It can be issued only once per registry.
    pub fn delegate_ballots(self: &Arc<Self>, caller: &Identity) -> Result<BallotCapability> {
        operation("delegate_ballots", || {
            self.admin.authorize(caller, "delegate ballot handling")?;
            if self.delegated.swap(true, Ordering::SeqCst) {
                return Err(Error::Duplicate(
                    "Ballot handling has already been delegated".to_string(),
                ));
            }
            Ok(BallotCapability {
                registry: Arc::clone(self),
            })
        })
    }

    /// Read the committed voter table under the registry lock.
    pub(crate) fn read_voters<R>(&self, op: impl FnOnce(&VoterTable) -> R) -> R {
        read(&self.voters, op)
    }
}

impl Debug for VoterRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoterRegistry")
            .field("admin", &self.admin)
            .finish_non_exhaustive()
    }
}

fn is_eligible_in(voters: &VoterTable, voter_hash: &VoterHash) -> bool {
    voters.get(voter_hash).map_or(false, Voter::is_eligible)
}

fn mark_voted_in(voters: &mut VoterTable, voter_hash: &VoterHash) -> Result<()> {
    let voter = voters
        .get_mut(voter_hash)
        .filter(|v| v.is_registered)
        .ok_or_else(|| Error::Validation(format!("Voter {voter_hash} is not registered")))?;
    if voter.has_voted {
        return Err(Error::Duplicate(format!(
            "Voter {voter_hash} has already voted"
        )));
    }
    voter.has_voted = true;
    Ok(())
}

/// Permission to mark voters as voted, granted by the registry to the
/// election controller. Holding one stands in for administrator authority on
/// that single path; it cannot register voters.
pub struct BallotCapability {
    registry: Arc<VoterRegistry>,
}

impl BallotCapability {
    /// The registry this capability was issued by.
    pub fn registry(&self) -> &Arc<VoterRegistry> {
        &self.registry
    }

    /// Lock the registry and stage voter updates until commit.
    pub(crate) fn begin(&self) -> BallotTransaction<'_> {
        BallotTransaction {
            registry: &self.registry,
            voters: Transaction::begin(&self.registry.voters),
            marked: Vec::new(),
        }
    }
}

impl Debug for BallotCapability {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BallotCapability")
            .field("registry", &self.registry)
            .finish()
    }
}

/// Staged registry updates made through a [`BallotCapability`].
/// Nothing is visible outside until [`BallotTransaction::commit`].
pub(crate) struct BallotTransaction<'a> {
    registry: &'a VoterRegistry,
    voters: Transaction<'a, VoterTable>,
    marked: Vec<VoterHash>,
}

impl BallotTransaction<'_> {
    pub fn is_eligible(&self, voter_hash: &VoterHash) -> bool {
        is_eligible_in(&self.voters, voter_hash)
    }

    pub fn mark_voted(&mut self, voter_hash: VoterHash) -> Result<()> {
        mark_voted_in(&mut self.voters, &voter_hash)?;
        debug!("Staged voter {voter_hash} as voted");
        self.marked.push(voter_hash);
        Ok(())
    }

    /// Publish the staged updates and emit [`Event::VoterMarkedAsVoted`] for
    /// each marked voter before releasing the registry.
    pub fn commit(self) {
        let Self {
            registry,
            voters,
            marked,
        } = self;
        let _published = voters.commit();
        for voter_hash in marked {
            registry.events.emit(Event::VoterMarkedAsVoted { voter_hash });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::ErrorKind;
    use crate::model::event::EventLog;

    fn registry() -> (Arc<VoterRegistry>, EventLog) {
        let events = EventLog::new();
        let registry = VoterRegistry::new(Identity::admin_example(), Arc::new(events.clone()));
        (registry, events)
    }

    fn admin() -> Identity {
        Identity::admin_example()
    }

    #[test]
    fn register_creates_eligible_voter() {
        let (registry, events) = registry();
        let alice = VoterHash::example("alice");
        registry
            .register(&admin(), alice, Identity::holder_example("alice"))
            .unwrap();

        assert!(registry.is_eligible(&alice));
        assert_eq!(registry.voter(&alice), Some(Voter::example("alice")));
        assert_eq!(registry.voter_count(), 1);
        assert_eq!(
            events.events(),
            vec![Event::VoterRegistered { voter_hash: alice }]
        );
    }

    #[test]
    fn register_requires_administrator() {
        let (registry, events) = registry();
        let alice = VoterHash::example("alice");
        let err = registry
            .register(
                &Identity::intruder_example(),
                alice,
                Identity::holder_example("alice"),
            )
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Authorization);
        assert!(registry.voter(&alice).is_none());
        assert!(events.is_empty());
    }

    #[test]
    fn reregistration_is_rejected() {
        let (registry, events) = registry();
        let alice = VoterHash::example("alice");
        registry
            .register(&admin(), alice, Identity::holder_example("alice"))
            .unwrap();
        let err = registry
            .register(&admin(), alice, Identity::holder_example("impostor"))
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Duplicate);
        // The original holder is untouched.
        assert_eq!(
            registry.voter(&alice).unwrap().holder_address,
            Identity::holder_example("alice")
        );
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn administrator_cannot_hold_a_voter() {
        let (registry, events) = registry();
        let alice = VoterHash::example("alice");
        let err = registry.register(&admin(), alice, admin()).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(registry.voter(&alice).is_none());
        assert!(events.is_empty());
    }

    #[test]
    fn unknown_voters_are_not_eligible() {
        let (registry, _) = registry();
        assert!(!registry.is_eligible(&VoterHash::example("nobody")));
        assert!(!registry.has_voted(&VoterHash::example("nobody")));
    }

    #[test]
    fn mark_voted_succeeds_once() {
        let (registry, events) = registry();
        let bob = VoterHash::example("bob");
        registry
            .register(&admin(), bob, Identity::holder_example("bob"))
            .unwrap();

        registry.mark_voted(&admin(), bob).unwrap();
        assert!(registry.has_voted(&bob));
        assert!(!registry.is_eligible(&bob));

        let err = registry.mark_voted(&admin(), bob).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Duplicate);
        assert!(registry.has_voted(&bob));
        assert_eq!(
            events.events(),
            vec![
                Event::VoterRegistered { voter_hash: bob },
                Event::VoterMarkedAsVoted { voter_hash: bob },
            ]
        );
    }

    #[test]
    fn mark_voted_checks_caller_then_registration() {
        let (registry, _) = registry();
        let ghost = VoterHash::example("ghost");

        let err = registry
            .mark_voted(&Identity::intruder_example(), ghost)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);

        let err = registry.mark_voted(&admin(), ghost).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn capability_is_issued_once_to_the_administrator() {
        let (registry, _) = registry();
        let err = registry
            .delegate_ballots(&Identity::intruder_example())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);

        let capability = registry.delegate_ballots(&admin()).unwrap();
        assert!(Arc::ptr_eq(capability.registry(), &registry));

        let err = registry.delegate_ballots(&admin()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Duplicate);
    }

    #[test]
    fn ballot_transaction_is_invisible_until_commit() {
        let (registry, events) = registry();
        let carol = VoterHash::example("carol");
        registry
            .register(&admin(), carol, Identity::holder_example("carol"))
            .unwrap();
        let capability = registry.delegate_ballots(&admin()).unwrap();

        // Staged, then abandoned.
        {
            let mut ballots = capability.begin();
            assert!(ballots.is_eligible(&carol));
            ballots.mark_voted(carol).unwrap();
            assert!(!ballots.is_eligible(&carol));
        }
        assert!(registry.is_eligible(&carol));
        assert_eq!(events.len(), 1);

        // Staged, then committed.
        let mut ballots = capability.begin();
        ballots.mark_voted(carol).unwrap();
        let err = ballots.mark_voted(carol).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Duplicate);
        ballots.commit();
        assert!(registry.has_voted(&carol));
        assert_eq!(registry.voted_count(), 1);
        assert_eq!(
            events.events().last(),
            Some(&Event::VoterMarkedAsVoted { voter_hash: carol })
        );
    }
}
