use std::sync::Arc;

use log::info;

use crate::clock::SharedClock;
use crate::config::Config;
use crate::controller::{ElectionController, ElectionRecord};
use crate::error::Result;
use crate::model::{event::SharedSink, persisted::PersistedState};
use crate::registry::VoterRegistry;

/// A registry and the election controller wired to it.
#[derive(Debug, Clone)]
pub struct ElectionSystem {
    registry: Arc<VoterRegistry>,
    controller: Arc<ElectionController>,
}

impl ElectionSystem {
    /// Build an empty registry and a `Created` election from `config`.
    pub fn new(config: &Config, clock: SharedClock, events: SharedSink) -> Result<Self> {
        let registry = VoterRegistry::new(config.administrator().clone(), events.clone());
        let controller = ElectionController::new(
            config.administrator(),
            config.election_name(),
            &registry,
            clock,
            events,
        )?;
        info!(
            "Election '{}' created, administered by '{}'",
            config.election_name(),
            config.administrator()
        );
        Ok(Self {
            registry,
            controller: Arc::new(controller),
        })
    }

    /// Rebuild a system from previously exported state.
    /// The configured administrator takes over; no events are emitted.
    pub fn restore(
        config: &Config,
        state: PersistedState,
        clock: SharedClock,
        events: SharedSink,
    ) -> Result<Self> {
        state.validate()?;
        let PersistedState {
            voters,
            candidates,
            election,
            vote_records,
        } = state;

        let registry = VoterRegistry::with_voters(
            config.administrator().clone(),
            voters.into_iter().collect(),
            events.clone(),
        );
        let ballots = registry.delegate_ballots(config.administrator())?;
        let record = ElectionRecord {
            metadata: election,
            candidates,
            vote_records: vote_records.into_iter().collect(),
        };
        info!(
            "Election '{}' restored in phase '{}' with {} voters",
            record.metadata.name,
            record.metadata.phase,
            registry.voter_count()
        );
        let controller = ElectionController::with_record(ballots, record, clock, events);
        Ok(Self {
            registry,
            controller: Arc::new(controller),
        })
    }

    pub fn registry(&self) -> &Arc<VoterRegistry> {
        &self.registry
    }

    pub fn controller(&self) -> &Arc<ElectionController> {
        &self.controller
    }

    /// A consistent snapshot of the whole system.
    pub fn export_state(&self) -> PersistedState {
        self.controller.read_with_voters(|election, voters| PersistedState {
            voters: voters.iter().map(|(k, v)| (*k, v.clone())).collect(),
            candidates: election.candidates.clone(),
            election: election.metadata.clone(),
            vote_records: election
                .vote_records
                .iter()
                .map(|(k, v)| (*k, *v))
                .collect(),
        })
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    use crate::clock::{ManualClock, Timestamp};
    use crate::model::{event::EventLog, identity::Identity, voter::VoterHash};

    pub const EXAMPLE_VOTERS: [&str; 3] = ["alice", "bob", "carol"];

    impl ElectionSystem {
        /// A fresh system built from the example config, sharing `clock` and `events`.
        pub fn example(clock: &ManualClock, events: &EventLog) -> Self {
            Self::new(
                &Config::example(),
                Arc::new(clock.clone()),
                Arc::new(events.clone()),
            )
            .expect("example config is valid")
        }

        pub fn register_example_voters(&self) {
            for name in EXAMPLE_VOTERS {
                self.registry
                    .register(
                        &Identity::admin_example(),
                        VoterHash::example(name),
                        Identity::holder_example(name),
                    )
                    .expect("example voters register");
            }
        }

        /// Candidates 0 ("Alice") and 1 ("Bob").
        pub fn add_example_candidates(&self) {
            let admin = Identity::admin_example();
            self.controller
                .add_candidate(&admin, "Alice", "Blue")
                .expect("example candidate added");
            self.controller
                .add_candidate(&admin, "Bob", "Red")
                .expect("example candidate added");
        }

        /// Register the example voters, add the example candidates, open
        /// voting over [100, 200] and move the clock to 150.
        pub fn start_example(&self, clock: &ManualClock) {
            self.register_example_voters();
            self.add_example_candidates();
            self.controller
                .start_election(
                    &Identity::admin_example(),
                    Timestamp::from(100),
                    Timestamp::from(200),
                )
                .expect("example election starts");
            clock.set(Timestamp::from(150));
        }

        /// Move the clock past the window and end the election.
        pub fn close_example(&self, clock: &ManualClock) {
            clock.set(Timestamp::from(250));
            self.controller
                .end_election(&Identity::admin_example())
                .expect("example election ends");
        }
    }
}
