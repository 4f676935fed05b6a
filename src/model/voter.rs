use std::fmt::{Display, Formatter};
use std::str::FromStr;

use data_encoding::HEXLOWER;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::config::Config;
use crate::model::identity::Identity;

pub type HmacSha256 = Hmac<Sha256>;

/// Length of a voter hash in bytes.
pub const VOTER_HASH_LEN: usize = 32;

/// Voter unique ID: a fixed-size hash of their real-world identifier.
/// The identifier itself never reaches the registry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VoterHash([u8; VOTER_HASH_LEN]);

impl VoterHash {
    pub fn from_bytes(bytes: [u8; VOTER_HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Derive the hash of a real-world identifier, keyed with the configured secret.
    pub fn from_identifier(identifier: &str, config: &Config) -> Self {
        let mut hmac = HmacSha256::new_from_slice(config.hmac_secret())
            .expect("HMAC can take key of any size");
        hmac.update(identifier.as_bytes());
        let mut bytes = [0; VOTER_HASH_LEN];
        bytes.copy_from_slice(&hmac.finalize().into_bytes());
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; VOTER_HASH_LEN] {
        &self.0
    }
}

impl Display for VoterHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&HEXLOWER.encode(&self.0))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VoterHashError {
    #[error("Voter hash is not valid hex: {0}")]
    Encoding(#[from] data_encoding::DecodeError),
    #[error("Voter hash must be 32 bytes, got {0}")]
    Length(usize),
}

impl FromStr for VoterHash {
    type Err = VoterHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decoded = HEXLOWER.decode(s.to_ascii_lowercase().as_bytes())?;
        let bytes: [u8; VOTER_HASH_LEN] = decoded
            .try_into()
            .map_err(|wrong: Vec<u8>| VoterHashError::Length(wrong.len()))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for VoterHash {
    type Error = VoterHashError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<VoterHash> for String {
    fn from(hash: VoterHash) -> Self {
        hash.to_string()
    }
}

/// Voter record, as held by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    pub voter_hash: VoterHash,
    /// The voter's own acting identity, distinct from the administrator's.
    pub holder_address: Identity,
    pub is_registered: bool,
    /// Only ever transitions from false to true.
    pub has_voted: bool,
}

impl Voter {
    /// A freshly registered voter who has not voted.
    pub fn new(voter_hash: VoterHash, holder_address: Identity) -> Self {
        Self {
            voter_hash,
            holder_address,
            is_registered: true,
            has_voted: false,
        }
    }

    /// Registered and has not yet voted.
    pub fn is_eligible(&self) -> bool {
        self.is_registered && !self.has_voted
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let hash = VoterHash::example("alice");
        let text = hash.to_string();
        assert_eq!(text.len(), 2 * VOTER_HASH_LEN);
        assert_eq!(text.parse::<VoterHash>().unwrap(), hash);
        assert_eq!(text.to_uppercase().parse::<VoterHash>().unwrap(), hash);
    }

    #[test]
    fn rejects_malformed_hex() {
        assert_eq!(
            "abcd".parse::<VoterHash>(),
            Err(VoterHashError::Length(2))
        );
        assert!(matches!(
            "zz".repeat(VOTER_HASH_LEN).parse::<VoterHash>(),
            Err(VoterHashError::Encoding(_))
        ));
    }

    #[test]
    fn serializes_as_hex_string() {
        let hash = VoterHash::example("bob");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{hash}\""));
        let back: VoterHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }

    #[test]
    fn identifier_hash_depends_on_secret() {
        let config = Config::example();
        let other = Config::new(Identity::admin_example(), "Other", "another-secret");
        let a = VoterHash::from_identifier("AB123456C", &config);
        assert_eq!(a, VoterHash::from_identifier("AB123456C", &config));
        assert_ne!(a, VoterHash::from_identifier("AB123456D", &config));
        assert_ne!(a, VoterHash::from_identifier("AB123456C", &other));
    }

    #[test]
    fn eligibility() {
        let mut voter = Voter::example("carol");
        assert!(voter.is_eligible());
        voter.has_voted = true;
        assert!(!voter.is_eligible());
        voter.has_voted = false;
        voter.is_registered = false;
        assert!(!voter.is_eligible());
    }
}
