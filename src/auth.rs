use crate::error::{Error, Result};
use crate::model::identity::Identity;

/// The single privileged identity, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Administrator {
    identity: Identity,
}

impl Administrator {
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Guard for privileged operations: succeed only if `caller` is the administrator.
    pub fn authorize(&self, caller: &Identity, action: &str) -> Result<()> {
        if caller == &self.identity {
            Ok(())
        } else {
            Err(Error::Authorization(format!(
                "'{caller}' is not permitted to {action}"
            )))
        }
    }
}
