//! Bridges the push channel into the synchronizer: one subscription per
//! screen, every event forwarded as a plain "re-synchronize" wakeup.

use crate::sync::FeedSynchronizer;
use ripple_db::store::{ChangeSubscription, PushChannel, SubscribeError};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Owns one push-channel subscription for the lifetime of a screen. The
/// subscription is released exactly once, when the forwarding task ends.
pub struct ChangeNotifier {
    stopped: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ChangeNotifier {
    /// Subscribes to all mutation events on `resource` and forwards each
    /// one to `sync`. A failed subscription is returned as-is; there is no
    /// internal retry, the caller decides when to try again.
    pub async fn spawn(
        channel: &dyn PushChannel,
        resource: &str,
        sync: Arc<FeedSynchronizer>,
    ) -> Result<Self, SubscribeError> {
        let subscription = channel.subscribe(resource).await?;
        let stopped = CancellationToken::new();
        let task = tokio::spawn(forward_changes(subscription, sync, stopped.clone()));

        Ok(Self {
            stopped,
            task: Some(task),
        })
    }

    /// Stops forwarding and waits for the subscription to be released.
    pub async fn shutdown(mut self) {
        self.stopped.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ChangeNotifier {
    fn drop(&mut self) {
        self.stopped.cancel();
    }
}

async fn forward_changes(
    mut subscription: Box<dyn ChangeSubscription>,
    sync: Arc<FeedSynchronizer>,
    stopped: CancellationToken,
) {
    loop {
        tokio::select! {
            () = stopped.cancelled() => break,
            event = subscription.next() => match event {
                Some(_) => sync.on_external_change().await,
                None => {
                    debug!("Change subscription ended");
                    break;
                }
            },
        }
    }
    // `subscription` drops here, releasing the registration.
}

#[cfg(test)]
mod tests {
    use crate::notifier::ChangeNotifier;
    use crate::sync::FeedSynchronizer;
    use async_trait::async_trait;
    use ripple_common::model::{
        Id,
        feed::FeedScope,
        like::{Like, LikeMarker},
        post::{AuthorSnapshot, CreatePost, Post, PostMarker},
        profile::{Profile, ProfileMarker},
        session::Session,
    };
    use ripple_db::store::{
        ChangeEvent, ChangeSubscription, FeedStore, POSTS_RESOURCE, PushChannel, StoreError,
        SubscribeError,
    };
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use time::macros::utc_datetime;
    use tokio::sync::{Semaphore, mpsc};

    fn post(id: &str) -> Post {
        Post {
            id: id.into(),
            author: "u1".into(),
            content: Some("hi".to_owned()),
            image_url: None,
            created_at: utc_datetime!(2025-06-01 12:00),
            author_snapshot: AuthorSnapshot::default(),
        }
    }

    struct CountingStore {
        fetches: AtomicUsize,
        posts: Mutex<Vec<Post>>,
        fetch_gate: Option<Semaphore>,
    }

    impl CountingStore {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                fetches: AtomicUsize::new(0),
                posts: Mutex::new(Vec::new()),
                fetch_gate: None,
            })
        }

        fn gated() -> Arc<Self> {
            Arc::new(Self {
                fetches: AtomicUsize::new(0),
                posts: Mutex::new(Vec::new()),
                fetch_gate: Some(Semaphore::new(0)),
            })
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FeedStore for CountingStore {
        async fn fetch_posts(&self, _scope: &FeedScope) -> Result<Vec<Post>, StoreError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.fetch_gate {
                gate.acquire().await.unwrap().forget();
            }
            Ok(self.posts.lock().unwrap().clone())
        }

        async fn create_post(&self, _post: &CreatePost) -> Result<Id<PostMarker>, StoreError> {
            unimplemented!("not used by notifier tests")
        }

        async fn fetch_like(
            &self,
            _post: &Id<PostMarker>,
            _user: &Id<ProfileMarker>,
        ) -> Result<Option<Like>, StoreError> {
            Ok(None)
        }

        async fn insert_like(
            &self,
            _post: &Id<PostMarker>,
            _user: &Id<ProfileMarker>,
        ) -> Result<Id<LikeMarker>, StoreError> {
            unimplemented!("not used by notifier tests")
        }

        async fn delete_like(&self, _like: &Id<LikeMarker>) -> Result<(), StoreError> {
            Ok(())
        }

        async fn fetch_profile(
            &self,
            _profile: &Id<ProfileMarker>,
        ) -> Result<Option<Profile>, StoreError> {
            Ok(None)
        }

        async fn update_avatar_url(
            &self,
            _profile: &Id<ProfileMarker>,
            _avatar_url: &str,
        ) -> Result<(), StoreError> {
            Ok(())
        }
    }

    struct FakeChannel {
        events: Mutex<Option<mpsc::Receiver<ChangeEvent>>>,
        released: Arc<AtomicUsize>,
        fail_subscribe: bool,
    }

    impl FakeChannel {
        fn new() -> (Self, mpsc::Sender<ChangeEvent>, Arc<AtomicUsize>) {
            let (sender, receiver) = mpsc::channel(16);
            let released = Arc::new(AtomicUsize::new(0));
            let channel = Self {
                events: Mutex::new(Some(receiver)),
                released: released.clone(),
                fail_subscribe: false,
            };
            (channel, sender, released)
        }

        fn failing() -> Self {
            Self {
                events: Mutex::new(None),
                released: Arc::new(AtomicUsize::new(0)),
                fail_subscribe: true,
            }
        }
    }

    struct FakeSubscription {
        events: mpsc::Receiver<ChangeEvent>,
        released: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ChangeSubscription for FakeSubscription {
        async fn next(&mut self) -> Option<ChangeEvent> {
            self.events.recv().await
        }
    }

    impl Drop for FakeSubscription {
        fn drop(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl PushChannel for FakeChannel {
        async fn subscribe(
            &self,
            _resource: &str,
        ) -> Result<Box<dyn ChangeSubscription>, SubscribeError> {
            if self.fail_subscribe {
                return Err(SubscribeError::Sqlx(sqlx::Error::PoolClosed));
            }

            let events = self
                .events
                .lock()
                .unwrap()
                .take()
                .expect("subscribed twice");
            Ok(Box::new(FakeSubscription {
                events,
                released: self.released.clone(),
            }))
        }
    }

    fn synchronizer(store: &Arc<CountingStore>) -> Arc<FeedSynchronizer> {
        Arc::new(FeedSynchronizer::new(
            store.clone(),
            Session::new("u1", "u1@example.com"),
            FeedScope::Global,
        ))
    }

    async fn wait_until(condition: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while !condition() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn events_trigger_refreshes() {
        let store = CountingStore::new();
        let sync = synchronizer(&store);
        let (channel, events, _released) = FakeChannel::new();

        let notifier = ChangeNotifier::spawn(&channel, POSTS_RESOURCE, sync.clone())
            .await
            .unwrap();

        events.send(ChangeEvent).await.unwrap();
        wait_until(|| store.fetches() == 1).await;

        events.send(ChangeEvent).await.unwrap();
        wait_until(|| store.fetches() == 2).await;

        notifier.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_releases_subscription_exactly_once() {
        let store = CountingStore::new();
        let sync = synchronizer(&store);
        let (channel, events, released) = FakeChannel::new();

        let notifier = ChangeNotifier::spawn(&channel, POSTS_RESOURCE, sync.clone())
            .await
            .unwrap();
        notifier.shutdown().await;

        assert_eq!(released.load(Ordering::SeqCst), 1);

        // The receiver is gone, so this event reaches nobody.
        assert!(events.send(ChangeEvent).await.is_err());
        assert_eq!(store.fetches(), 0);
    }

    #[tokio::test]
    async fn teardown_discards_inflight_notification() {
        let store = CountingStore::gated();
        let sync = synchronizer(&store);
        let (channel, events, released) = FakeChannel::new();

        let notifier = ChangeNotifier::spawn(&channel, POSTS_RESOURCE, sync.clone())
            .await
            .unwrap();

        // The fetch that this notification triggers would change the view
        // if it were applied.
        store.posts.lock().unwrap().push(post("a"));
        events.send(ChangeEvent).await.unwrap();
        wait_until(|| store.fetches() == 1).await;
        let before = sync.posts();
        assert!(before.is_empty());

        sync.close();
        store.fetch_gate.as_ref().unwrap().add_permits(1);
        notifier.shutdown().await;

        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert_eq!(before, sync.posts());
    }

    #[tokio::test]
    async fn subscribe_failure_is_surfaced() {
        let store = CountingStore::new();
        let sync = synchronizer(&store);
        let channel = FakeChannel::failing();

        let result = ChangeNotifier::spawn(&channel, POSTS_RESOURCE, sync).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn ended_channel_stops_forwarding() {
        let store = CountingStore::new();
        let sync = synchronizer(&store);
        let (channel, events, released) = FakeChannel::new();

        let notifier = ChangeNotifier::spawn(&channel, POSTS_RESOURCE, sync)
            .await
            .unwrap();

        drop(events);
        wait_until(|| released.load(Ordering::SeqCst) == 1).await;

        notifier.shutdown().await;
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
