//! Optimistic vote controller.
//!
//! # Responsibilities
//! - Apply a vote locally before the server confirms it
//! - Send the resulting vote (or its removal) to the API
//! - Roll back on failure, notify the owner on success
//!
//! # Design Decisions
//! - Rollback restores the construction-time counts with no user vote, not
//!   the state just before the failed click
//! - Concurrent submissions are independent unless single-flight is enabled;
//!   the last response to settle wins
//! - After teardown, settling requests leave state untouched
//! - In-flight tracking is an RAII guard so a dropped submission still
//!   clears `is_submitting`

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};

use crate::api::client::ApiClient;
use crate::api::error::ApiError;
use crate::api::types::{TargetType, VoteRequest, VoteType};
use crate::config::VoteConfig;
use crate::observability::metrics;
use crate::votes::state::{VoteCounts, VoteState};

/// Anything that can deliver a vote to the server.
#[async_trait]
pub trait VoteSubmitter: Send + Sync {
    async fn send_vote(&self, request: VoteRequest) -> Result<(), ApiError>;
}

#[async_trait]
impl VoteSubmitter for ApiClient {
    async fn send_vote(&self, request: VoteRequest) -> Result<(), ApiError> {
        self.submit_vote(&request).await.map(|_| ())
    }
}

/// Called with the confirmed vote after a successful submission.
pub type VoteCallback = Arc<dyn Fn(Option<VoteType>) + Send + Sync>;

/// How a submission settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    /// The server accepted the vote; the optimistic state stands.
    Confirmed(Option<VoteType>),
    /// The request failed and state went back to the initial counts.
    RolledBack,
    /// The controller was torn down; state was not touched.
    Discarded,
}

/// Vote state for one post or comment.
pub struct VoteController {
    target_id: String,
    target_type: TargetType,
    initial: VoteCounts,
    state: watch::Sender<VoteState>,
    in_flight: AtomicUsize,
    torn_down: AtomicBool,
    single_flight: Option<Mutex<()>>,
    submitter: Arc<dyn VoteSubmitter>,
    on_vote_change: Option<VoteCallback>,
}

impl VoteController {
    pub fn new(
        target_id: impl Into<String>,
        target_type: TargetType,
        initial: VoteCounts,
        submitter: Arc<dyn VoteSubmitter>,
    ) -> Self {
        let (state, _) = watch::channel(VoteState::from_counts(initial));
        Self {
            target_id: target_id.into(),
            target_type,
            initial,
            state,
            in_flight: AtomicUsize::new(0),
            torn_down: AtomicBool::new(false),
            single_flight: None,
            submitter,
            on_vote_change: None,
        }
    }

    /// Register the success callback.
    pub fn on_vote_change(mut self, callback: impl Fn(Option<VoteType>) + Send + Sync + 'static) -> Self {
        self.on_vote_change = Some(Arc::new(callback));
        self
    }

    /// Allow only one in-flight submission at a time.
    pub fn single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled.then(|| Mutex::new(()));
        self
    }

    pub fn with_config(self, config: &VoteConfig) -> Self {
        self.single_flight(config.serialize_submissions)
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn state(&self) -> VoteState {
        *self.state.borrow()
    }

    pub fn score(&self) -> i64 {
        self.state.borrow().score()
    }

    /// Watch every state change.
    pub fn subscribe(&self) -> watch::Receiver<VoteState> {
        self.state.subscribe()
    }

    /// Stop applying server responses to state.
    pub fn teardown(&self) {
        if !self.torn_down.swap(true, Ordering::SeqCst) {
            tracing::debug!(target_id = %self.target_id, "Vote controller torn down");
        }
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    /// Apply `clicked` optimistically and confirm it with the server.
    pub async fn submit_vote(&self, clicked: VoteType) -> VoteOutcome {
        if self.is_torn_down() {
            return VoteOutcome::Discarded;
        }

        let _turn = match &self.single_flight {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };
        if self.is_torn_down() {
            return VoteOutcome::Discarded;
        }

        let _in_flight = InFlight::enter(self);
        let mut resulting = None;
        self.state.send_modify(|s| {
            let next = s.apply(clicked);
            resulting = next.user_vote;
            *s = VoteState {
                is_submitting: true,
                ..next
            };
        });

        tracing::debug!(
            target_id = %self.target_id,
            target_type = %self.target_type,
            vote = ?resulting,
            "Submitting vote"
        );

        let request = VoteRequest {
            target_id: self.target_id.clone(),
            target_type: self.target_type,
            vote_type: resulting,
        };
        let result = self.submitter.send_vote(request).await;

        if self.is_torn_down() {
            metrics::record_vote("discarded");
            return VoteOutcome::Discarded;
        }

        match result {
            Ok(()) => {
                metrics::record_vote("confirmed");
                if let Some(callback) = &self.on_vote_change {
                    callback(resulting);
                }
                VoteOutcome::Confirmed(resulting)
            }
            Err(err) => {
                tracing::warn!(
                    target_id = %self.target_id,
                    error = %err,
                    "Vote failed, rolling back"
                );
                metrics::record_vote("rolled_back");
                let initial = self.initial;
                self.state.send_modify(|s| {
                    s.upvotes = initial.upvotes;
                    s.downvotes = initial.downvotes;
                    s.user_vote = None;
                });
                VoteOutcome::RolledBack
            }
        }
    }
}

impl std::fmt::Debug for VoteController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoteController")
            .field("target_id", &self.target_id)
            .field("target_type", &self.target_type)
            .field("state", &self.state())
            .finish()
    }
}

/// Counts a submission as in flight until dropped.
struct InFlight<'a> {
    controller: &'a VoteController,
}

impl<'a> InFlight<'a> {
    fn enter(controller: &'a VoteController) -> Self {
        controller.in_flight.fetch_add(1, Ordering::SeqCst);
        Self { controller }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let remaining = self.controller.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining == 0 && !self.controller.is_torn_down() {
            self.controller.state.send_modify(|s| s.is_submitting = false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::{mpsc, oneshot};

    /// Answers immediately, recording every request.
    #[derive(Default)]
    struct Recorder {
        fail: bool,
        seen: StdMutex<Vec<VoteRequest>>,
    }

    #[async_trait]
    impl VoteSubmitter for Recorder {
        async fn send_vote(&self, request: VoteRequest) -> Result<(), ApiError> {
            self.seen.lock().unwrap().push(request);
            if self.fail {
                Err(ApiError::http(500, None, None))
            } else {
                Ok(())
            }
        }
    }

    type Reply = oneshot::Sender<Result<(), ApiError>>;

    /// Hands each request to the test and waits for its verdict.
    struct Gate {
        tx: mpsc::UnboundedSender<(VoteRequest, Reply)>,
    }

    #[async_trait]
    impl VoteSubmitter for Gate {
        async fn send_vote(&self, request: VoteRequest) -> Result<(), ApiError> {
            let (reply, verdict) = oneshot::channel();
            self.tx
                .send((request, reply))
                .map_err(|_| ApiError::Other("gate closed".into()))?;
            verdict
                .await
                .unwrap_or_else(|_| Err(ApiError::Other("gate dropped".into())))
        }
    }

    fn gated() -> (Arc<VoteController>, mpsc::UnboundedReceiver<(VoteRequest, Reply)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = VoteController::new("p1", TargetType::Post, VoteCounts::new(5, 1), Arc::new(Gate { tx }));
        (Arc::new(controller), rx)
    }

    #[tokio::test]
    async fn test_optimistic_then_rollback_to_initial() {
        let (controller, mut requests) = gated();

        let c = controller.clone();
        let task = tokio::spawn(async move { c.submit_vote(VoteType::Upvote).await });

        let (request, reply) = requests.recv().await.unwrap();
        assert_eq!(request.vote_type, Some(VoteType::Upvote));
        let during = controller.state();
        assert_eq!(during.upvotes, 6);
        assert_eq!(during.user_vote, Some(VoteType::Upvote));
        assert!(during.is_submitting);

        reply.send(Err(ApiError::Network {
            kind: crate::api::error::NetworkErrorKind::ConnectionRefused,
            message: "refused".into(),
        }))
        .unwrap();
        assert_eq!(task.await.unwrap(), VoteOutcome::RolledBack);

        let after = controller.state();
        assert_eq!((after.upvotes, after.downvotes, after.user_vote), (5, 1, None));
        assert!(!after.is_submitting);
    }

    #[tokio::test]
    async fn test_same_vote_twice_returns_to_original() {
        let submitter = Arc::new(Recorder::default());
        let changes = Arc::new(StdMutex::new(Vec::new()));
        let sink = changes.clone();
        let controller = VoteController::new("c9", TargetType::Comment, VoteCounts::new(5, 1), submitter.clone())
            .on_vote_change(move |v| sink.lock().unwrap().push(v));

        assert_eq!(
            controller.submit_vote(VoteType::Upvote).await,
            VoteOutcome::Confirmed(Some(VoteType::Upvote))
        );
        assert_eq!(controller.submit_vote(VoteType::Upvote).await, VoteOutcome::Confirmed(None));

        let state = controller.state();
        assert_eq!((state.upvotes, state.downvotes, state.user_vote), (5, 1, None));
        assert_eq!(*changes.lock().unwrap(), vec![Some(VoteType::Upvote), None]);

        let seen = submitter.seen.lock().unwrap();
        assert_eq!(seen[0].vote_type, Some(VoteType::Upvote));
        assert_eq!(seen[1].vote_type, None);
        assert_eq!(seen[1].target_type, TargetType::Comment);
    }

    #[tokio::test]
    async fn test_rollback_skips_intermediate_state() {
        let submitter = Arc::new(Recorder::default());
        let controller = VoteController::new("p1", TargetType::Post, VoteCounts::new(5, 1), submitter);
        controller.submit_vote(VoteType::Upvote).await;

        let failing = Arc::new(Recorder {
            fail: true,
            ..Recorder::default()
        });
        // Same construction-time counts, confirmed upvote, then a failing switch.
        let controller = VoteController {
            submitter: failing,
            ..controller
        };
        assert_eq!(controller.submit_vote(VoteType::Downvote).await, VoteOutcome::RolledBack);
        let state = controller.state();
        assert_eq!((state.upvotes, state.downvotes, state.user_vote), (5, 1, None));
    }

    #[tokio::test]
    async fn test_overlapping_submissions() {
        let (controller, mut requests) = gated();

        let first = tokio::spawn({
            let c = controller.clone();
            async move { c.submit_vote(VoteType::Upvote).await }
        });
        let (req1, reply1) = requests.recv().await.unwrap();
        assert_eq!(req1.vote_type, Some(VoteType::Upvote));

        let second = tokio::spawn({
            let c = controller.clone();
            async move { c.submit_vote(VoteType::Downvote).await }
        });
        let (req2, reply2) = requests.recv().await.unwrap();
        assert_eq!(req2.vote_type, Some(VoteType::Downvote));
        let both = controller.state();
        assert_eq!((both.upvotes, both.downvotes, both.user_vote), (5, 2, Some(VoteType::Downvote)));

        reply1.send(Err(ApiError::http(503, None, None))).unwrap();
        assert_eq!(first.await.unwrap(), VoteOutcome::RolledBack);
        let mid = controller.state();
        assert!(mid.is_submitting, "second request is still pending");
        assert_eq!((mid.upvotes, mid.downvotes, mid.user_vote), (5, 1, None));

        reply2.send(Ok(())).unwrap();
        assert_eq!(second.await.unwrap(), VoteOutcome::Confirmed(Some(VoteType::Downvote)));
        // The later success leaves the rolled-back counts in place.
        let last = controller.state();
        assert!(!last.is_submitting);
        assert_eq!((last.upvotes, last.downvotes, last.user_vote), (5, 1, None));
    }

    #[tokio::test]
    async fn test_teardown_discards_late_response() {
        let (controller, mut requests) = gated();
        let c = controller.clone();
        let task = tokio::spawn(async move { c.submit_vote(VoteType::Downvote).await });

        let (_, reply) = requests.recv().await.unwrap();
        controller.teardown();
        reply.send(Err(ApiError::http(503, None, None))).unwrap();

        assert_eq!(task.await.unwrap(), VoteOutcome::Discarded);
        // Optimistic state stays as it was at teardown.
        assert_eq!(controller.state().downvotes, 2);
        assert_eq!(controller.submit_vote(VoteType::Upvote).await, VoteOutcome::Discarded);
    }

    #[tokio::test]
    async fn test_single_flight_serializes() {
        let (tx, mut requests) = mpsc::unbounded_channel();
        let controller = Arc::new(
            VoteController::new("p1", TargetType::Post, VoteCounts::new(0, 0), Arc::new(Gate { tx }))
                .single_flight(true),
        );

        let first = tokio::spawn({
            let c = controller.clone();
            async move { c.submit_vote(VoteType::Upvote).await }
        });
        let (req1, reply1) = requests.recv().await.unwrap();

        let second = tokio::spawn({
            let c = controller.clone();
            async move { c.submit_vote(VoteType::Downvote).await }
        });
        tokio::task::yield_now().await;
        assert!(requests.try_recv().is_err(), "second vote must wait for the first");

        reply1.send(Ok(())).unwrap();
        assert_eq!(first.await.unwrap(), VoteOutcome::Confirmed(req1.vote_type));

        let (req2, reply2) = requests.recv().await.unwrap();
        assert_eq!(req2.vote_type, Some(VoteType::Downvote));
        reply2.send(Ok(())).unwrap();
        second.await.unwrap();

        let state = controller.state();
        assert_eq!((state.upvotes, state.downvotes), (0, 1));
    }

    #[tokio::test]
    async fn test_subscribe_sees_updates() {
        let controller = VoteController::new("p1", TargetType::Post, VoteCounts::new(1, 0), Arc::new(Recorder::default()));
        let mut rx = controller.subscribe();
        controller.submit_vote(VoteType::Upvote).await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().upvotes, 2);
    }
}
