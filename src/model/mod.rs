pub mod candidate;
pub mod election;
pub mod event;
pub mod identity;
pub mod persisted;
pub mod results;
pub mod voter;
