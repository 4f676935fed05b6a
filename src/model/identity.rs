use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// An opaque token naming whoever is acting: the administrator, or a voter's
/// own holder address. Authentication happens upstream; this crate only
/// compares identities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}
