//! Optimistic voting.
//!
//! `state.rs` holds the pure transition rules; `controller.rs` applies them
//! ahead of the server and reconciles when the request settles.

pub mod controller;
pub mod state;

pub use controller::{VoteCallback, VoteController, VoteOutcome, VoteSubmitter};
pub use state::{VoteCounts, VoteState};
