#[cfg(test)]
#[macro_use]
extern crate election_test;

pub mod auth;
pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod model;
pub mod registry;
pub mod system;
pub mod transaction;

pub use config::Config;
pub use controller::ElectionController;
pub use error::{Error, ErrorKind, Result};
pub use registry::{BallotCapability, VoterRegistry};
pub use system::ElectionSystem;
