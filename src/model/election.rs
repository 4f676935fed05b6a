use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::clock::Timestamp;
use crate::error::{Error, Result};

/// Phases in the election lifecycle. Transitions are strictly linear.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum ElectionPhase {
    /// Candidates can be added; no voting yet.
    Created = 0,
    /// The voting window is fixed and votes can be cast within it.
    Active = 1,
    /// Voting is over; tallies are frozen.
    Closed = 2,
    /// Results are public. Terminal.
    ResultDeclared = 3,
}

impl Display for ElectionPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Active => "active",
            Self::Closed => "closed",
            Self::ResultDeclared => "result declared",
        };
        f.write_str(name)
    }
}

/// The period during which votes are accepted, inclusive at both ends.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingWindow {
    pub start_time: Timestamp,
    pub end_time: Timestamp,
}

impl VotingWindow {
    /// Create a window, rejecting one that does not end strictly after it starts.
    pub fn new(start_time: Timestamp, end_time: Timestamp) -> Result<Self> {
        if end_time <= start_time {
            return Err(Error::Validation(format!(
                "Voting window must end after it starts, got [{start_time}, {end_time}]"
            )));
        }
        Ok(Self {
            start_time,
            end_time,
        })
    }

    pub fn contains(&self, time: Timestamp) -> bool {
        self.start_time <= time && time <= self.end_time
    }
}

/// The election's singleton state record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionMetadata {
    /// Election name.
    pub name: String,
    /// Current phase.
    pub phase: ElectionPhase,
    /// Fixed when the election starts.
    pub window: Option<VotingWindow>,
}

impl ElectionMetadata {
    /// A new election, not yet started.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phase: ElectionPhase::Created,
            window: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.phase == ElectionPhase::Active
    }

    pub fn result_declared(&self) -> bool {
        self.phase == ElectionPhase::ResultDeclared
    }

    pub fn start_time(&self) -> Option<Timestamp> {
        self.window.map(|w| w.start_time)
    }

    pub fn end_time(&self) -> Option<Timestamp> {
        self.window.map(|w| w.end_time)
    }

    /// The voting window of an active election.
    pub fn active_window(&self) -> Result<VotingWindow> {
        match (self.phase, self.window) {
            (ElectionPhase::Active, Some(window)) => Ok(window),
            (phase, _) => Err(Error::State(format!(
                "Election '{}' is not active (phase: {phase})",
                self.name
            ))),
        }
    }

    /// Whether the window is present exactly when the phase requires one.
    pub fn is_consistent(&self) -> bool {
        match self.phase {
            ElectionPhase::Created => self.window.is_none(),
            _ => self
                .window
                .map(|w| w.end_time > w.start_time)
                .unwrap_or(false),
        }
    }
}
