//! Vote state and transition rules.

use crate::api::types::VoteType;

/// Server-reported counters a controller starts from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoteCounts {
    pub upvotes: i64,
    pub downvotes: i64,
}

impl VoteCounts {
    pub fn new(upvotes: i64, downvotes: i64) -> Self {
        Self { upvotes, downvotes }
    }
}

/// What a vote widget shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoteState {
    pub upvotes: i64,
    pub downvotes: i64,
    pub user_vote: Option<VoteType>,
    pub is_submitting: bool,
}

impl VoteState {
    pub fn from_counts(counts: VoteCounts) -> Self {
        Self {
            upvotes: counts.upvotes,
            downvotes: counts.downvotes,
            user_vote: None,
            is_submitting: false,
        }
    }

    /// Always derived, never stored.
    pub fn score(&self) -> i64 {
        self.upvotes - self.downvotes
    }

    /// State after the user clicks `clicked`.
    ///
    /// Clicking the current vote removes it; clicking the other one moves it.
    pub fn apply(&self, clicked: VoteType) -> VoteState {
        let mut next = *self;

        match self.user_vote {
            Some(VoteType::Upvote) => next.upvotes -= 1,
            Some(VoteType::Downvote) => next.downvotes -= 1,
            None => {}
        }

        if self.user_vote == Some(clicked) {
            next.user_vote = None;
        } else {
            match clicked {
                VoteType::Upvote => next.upvotes += 1,
                VoteType::Downvote => next.downvotes += 1,
            }
            next.user_vote = Some(clicked);
        }
        next
    }
}
