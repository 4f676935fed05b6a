use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, PoisonError};

use log::info;
use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;
use crate::model::{candidate::CandidateId, voter::VoterHash};

/// Side signals emitted after each successful state change.
/// Nothing in this crate reads them back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum Event {
    VoterRegistered {
        voter_hash: VoterHash,
    },
    VoterMarkedAsVoted {
        voter_hash: VoterHash,
    },
    ElectionStarted {
        name: String,
        start_time: Timestamp,
        end_time: Timestamp,
    },
    VoteCast {
        voter_hash: VoterHash,
        candidate_id: CandidateId,
    },
    ElectionEnded {
        end_time: Timestamp,
    },
    ResultDeclared,
}

impl Display for Event {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VoterRegistered { voter_hash } => write!(f, "VoterRegistered({voter_hash})"),
            Self::VoterMarkedAsVoted { voter_hash } => {
                write!(f, "VoterMarkedAsVoted({voter_hash})")
            }
            Self::ElectionStarted {
                name,
                start_time,
                end_time,
            } => write!(f, "ElectionStarted({name}, {start_time}..={end_time})"),
            Self::VoteCast {
                voter_hash,
                candidate_id,
            } => write!(f, "VoteCast({voter_hash} -> {candidate_id})"),
            Self::ElectionEnded { end_time } => write!(f, "ElectionEnded({end_time})"),
            Self::ResultDeclared => write!(f, "ResultDeclared"),
        }
    }
}

/// Observer of election events.
///
/// Delivery cannot fail an operation: sinks swallow their own problems.
/// Events are emitted in commit order, after the change is committed and
/// before the emitting component releases its lock. A sink must not call back
/// into the registry or the controller.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// Shared handle to an event sink.
pub type SharedSink = Arc<dyn EventSink>;

/// An event together with its position in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub index: u64,
    #[serde(flatten)]
    pub event: Event,
}

impl Display for EventRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} {}", self.index, self.event)
    }
}

/// Append-only, indexed, in-memory event log. Clones share the same log.
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    records: Arc<Mutex<Vec<EventRecord>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record so far, in emission order.
    pub fn records(&self) -> Vec<EventRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Every event so far, in emission order, without indices.
    pub fn events(&self) -> Vec<Event> {
        self.records().into_iter().map(|r| r.event).collect()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for EventLog {
    fn emit(&self, event: Event) {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let index = records.len() as u64;
        records.push(EventRecord { index, event });
    }
}

/// Writes every event to the log at info level.
#[derive(Debug, Default, Copy, Clone)]
pub struct LoggingSink;

impl EventSink for LoggingSink {
    fn emit(&self, event: Event) {
        info!("event: {event}");
    }
}

/// Delivers every event to each of several sinks, in order.
#[derive(Default, Clone)]
pub struct Broadcast {
    sinks: Vec<SharedSink>,
}

impl Broadcast {
    pub fn new(sinks: Vec<SharedSink>) -> Self {
        Self { sinks }
    }
}

impl EventSink for Broadcast {
    fn emit(&self, event: Event) {
        for sink in &self.sinks {
            sink.emit(event.clone());
        }
    }
}
