// Use cases layer: application workflows for the match server.

pub mod account;
pub mod match_engine;
pub mod matchmaker;
pub mod protocol;
pub mod test_support;
pub mod types;

pub use types::{MatchEvent, MatchKey, MatchLifecycle, OutboundFrame};
