//! Keeps one screen's post list consistent with the server by full
//! re-fetch-and-replace, and runs the like toggle.

use ripple_common::model::{
    Id,
    feed::{FeedScope, feed_order},
    post::{Post, PostMarker},
    profile::ProfileMarker,
    session::Session,
};
use ripple_db::store::{FeedStore, StoreError};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub type Result<T, E = SyncError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Fetching the feed failed: {0}")]
    Fetch(#[source] StoreError),
    #[error("Toggling the like failed: {0}")]
    ToggleLike(#[source] StoreError),
    #[error("The synchronizer has been closed")]
    Closed,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub enum FeedPhase {
    #[default]
    Idle,
    Loading,
    Ready,
    /// The last refresh failed. `posts` still holds the last good view so
    /// callers can render stale data next to an error indicator.
    Errored,
}

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct FeedState {
    pub phase: FeedPhase,
    pub posts: Vec<Post>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ToggleOutcome {
    Liked,
    Unliked,
    /// A toggle for the same (post, user) was already running; this call
    /// did nothing.
    InFlight,
}

/// Owns the post list for one screen scope. The list is only ever replaced
/// wholesale by a completed fetch; refreshes are serialized so the view
/// always corresponds to exactly one fetch, never a mix of two.
pub struct FeedSynchronizer {
    store: Arc<dyn FeedStore>,
    session: Session,
    scope: FeedScope,
    state: watch::Sender<FeedState>,
    refresh_gate: Mutex<()>,
    refresh_queued: AtomicBool,
    toggles_in_flight: Mutex<HashSet<(Id<PostMarker>, Id<ProfileMarker>)>>,
    closed: CancellationToken,
}

impl FeedSynchronizer {
    #[must_use]
    pub fn new(store: Arc<dyn FeedStore>, session: Session, scope: FeedScope) -> Self {
        let (state, _) = watch::channel(FeedState::default());

        Self {
            store,
            session,
            scope,
            state,
            refresh_gate: Mutex::new(()),
            refresh_queued: AtomicBool::new(false),
            toggles_in_flight: Mutex::new(HashSet::new()),
            closed: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn scope(&self) -> &FeedScope {
        &self.scope
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Snapshot of the current view.
    #[must_use]
    pub fn posts(&self) -> Vec<Post> {
        self.state.borrow().posts.clone()
    }

    #[must_use]
    pub fn phase(&self) -> FeedPhase {
        self.state.borrow().phase
    }

    /// Watch channel observing every state transition.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<FeedState> {
        self.state.subscribe()
    }

    /// Fetches all posts in scope and replaces the view. On failure the
    /// previous view stays untouched and the phase becomes `Errored`.
    pub async fn refresh(&self) -> Result<()> {
        let _serialized = self.refresh_gate.lock().await;
        self.refresh_locked().await
    }

    /// Wakeup from the change notifier: re-fetch with the same scope. A
    /// burst of wakeups collapses into the refresh already waiting on the
    /// gate, so an in-flight refresh is followed by at most one more.
    pub async fn on_external_change(&self) {
        if self.refresh_queued.swap(true, Ordering::AcqRel) {
            return;
        }

        let _serialized = self.refresh_gate.lock().await;
        self.refresh_queued.store(false, Ordering::Release);

        match self.refresh_locked().await {
            Ok(()) | Err(SyncError::Closed) => {}
            Err(error) => warn!(%error, "Refresh after a change notification failed"),
        }
    }

    /// Likes the post if the session user has no like on it, otherwise
    /// removes the existing like, then refreshes the view.
    ///
    /// The check-then-write is not transactional: two clients toggling the
    /// same (post, user) concurrently can double-insert or double-delete,
    /// and this method does not promise exactly-once semantics across
    /// clients. Within one synchronizer, concurrent calls for the same
    /// (post, user) coalesce: the later call returns
    /// [`ToggleOutcome::InFlight`] without touching the server. It never
    /// corrupts the view either way.
    pub async fn toggle_like(&self, post_id: &Id<PostMarker>) -> Result<ToggleOutcome> {
        if self.closed.is_cancelled() {
            return Err(SyncError::Closed);
        }

        let key = (post_id.clone(), self.session.user_id().clone());
        {
            let mut in_flight = self.toggles_in_flight.lock().await;
            if !in_flight.insert(key.clone()) {
                debug!(post = %post_id, "Toggle already in flight, ignoring");
                return Ok(ToggleOutcome::InFlight);
            }
        }

        let result = self.toggle_like_guarded(post_id).await;
        self.toggles_in_flight.lock().await.remove(&key);
        result
    }

    async fn toggle_like_guarded(&self, post_id: &Id<PostMarker>) -> Result<ToggleOutcome> {
        let user = self.session.user_id();

        let existing = self
            .store
            .fetch_like(post_id, user)
            .await
            .map_err(SyncError::ToggleLike)?;

        let outcome = match existing {
            Some(like) => {
                self.store
                    .delete_like(&like.id)
                    .await
                    .map_err(SyncError::ToggleLike)?;
                ToggleOutcome::Unliked
            }
            None => {
                self.store
                    .insert_like(post_id, user)
                    .await
                    .map_err(SyncError::ToggleLike)?;
                ToggleOutcome::Liked
            }
        };

        // Like counts are not denormalized anywhere; the view reflects the
        // change by re-fetching after the mutation completed.
        self.refresh().await?;

        Ok(outcome)
    }

    /// Tears the synchronizer down. Fetches still in flight complete but
    /// are never applied to the view.
    pub fn close(&self) {
        self.closed.cancel();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    async fn refresh_locked(&self) -> Result<()> {
        if self.closed.is_cancelled() {
            return Err(SyncError::Closed);
        }

        self.state
            .send_modify(|state| state.phase = FeedPhase::Loading);

        match self.store.fetch_posts(&self.scope).await {
            Ok(mut posts) => {
                // The store orders its result already; re-sorting pins the
                // deterministic order on the view itself.
                posts.sort_by(feed_order);

                if self.closed.is_cancelled() {
                    return Err(SyncError::Closed);
                }

                self.state.send_modify(|state| {
                    state.phase = FeedPhase::Ready;
                    state.posts = posts;
                });
                Ok(())
            }
            Err(error) => {
                if !self.closed.is_cancelled() {
                    self.state
                        .send_modify(|state| state.phase = FeedPhase::Errored);
                }
                Err(SyncError::Fetch(error))
            }
        }
    }
}
