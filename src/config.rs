use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::identity::Identity;

/// File the configuration is read from, relative to the working directory.
pub const CONFIG_FILE: &str = "Election.toml";

/// Prefix of environment variables that override the configuration file.
pub const ENV_PREFIX: &str = "ELECTION_";

/// Election configuration, derived from `Election.toml` and `ELECTION_*`
/// environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    // non-secrets
    administrator: Identity,
    election_name: String,
    // secrets
    hmac_secret: String,
}

impl Config {
    pub fn new(
        administrator: Identity,
        election_name: impl Into<String>,
        hmac_secret: impl Into<String>,
    ) -> Self {
        Self {
            administrator,
            election_name: election_name.into(),
            hmac_secret: hmac_secret.into(),
        }
    }

    /// The providers configuration is extracted from, in increasing priority.
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// Load the configuration from the default providers.
    pub fn load() -> Result<Self> {
        Self::from_figment(&Self::figment())
    }

    pub fn from_figment(figment: &Figment) -> Result<Self> {
        Ok(figment.extract()?)
    }

    /// The identity allowed to register voters and drive the election.
    /// Fixed for the lifetime of a registry.
    pub fn administrator(&self) -> &Identity {
        &self.administrator
    }

    /// Display name of the election.
    pub fn election_name(&self) -> &str {
        &self.election_name
    }

    /// Secret key used to derive voter hashes from real-world identifiers.
    pub fn hmac_secret(&self) -> &[u8] {
        self.hmac_secret.as_bytes()
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Config {
        pub fn example() -> Self {
            Self::new(
                Identity::admin_example(),
                "Student Council 2026",
                "not-a-real-secret",
            )
        }
    }
}
