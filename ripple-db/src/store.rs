//! The seams towards the hosted backend: queries and mutations, the push
//! channel, and the object store. The feed core only ever talks to these
//! traits; production implementations live in this crate, test doubles in
//! the callers' test modules.

use async_trait::async_trait;
use ripple_common::model::{
    Id, ModelValidationError,
    feed::FeedScope,
    like::{Like, LikeMarker},
    post::{CreatePost, Post, PostMarker},
    profile::{Profile, ProfileMarker},
};
use thiserror::Error;

/// Resource name of the posts collection, as used for push subscriptions.
pub const POSTS_RESOURCE: &str = "posts";

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum SubscribeError {
    #[error("Subscribing to change notifications failed: {0}")]
    Sqlx(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum ObjectError {
    #[error("Uploading to the object store failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("The object path does not form a valid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Queries and mutations against the posts, likes, and profiles resources.
#[async_trait]
pub trait FeedStore: Send + Sync {
    /// All posts in `scope`, each joined with its author's current display
    /// fields, newest first.
    async fn fetch_posts(&self, scope: &FeedScope) -> Result<Vec<Post>>;

    async fn create_post(&self, post: &CreatePost) -> Result<Id<PostMarker>>;

    async fn fetch_like(
        &self,
        post: &Id<PostMarker>,
        user: &Id<ProfileMarker>,
    ) -> Result<Option<Like>>;

    async fn insert_like(
        &self,
        post: &Id<PostMarker>,
        user: &Id<ProfileMarker>,
    ) -> Result<Id<LikeMarker>>;

    /// Deleting an already-removed like is a no-op, not an error.
    async fn delete_like(&self, like: &Id<LikeMarker>) -> Result<()>;

    async fn fetch_profile(&self, profile: &Id<ProfileMarker>) -> Result<Option<Profile>>;

    async fn update_avatar_url(
        &self,
        profile: &Id<ProfileMarker>,
        avatar_url: &str,
    ) -> Result<()>;
}

/// A single row-level mutation happened somewhere in the subscribed
/// resource. Carries no payload: the channel is a level-triggered wakeup,
/// not a change feed.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct ChangeEvent;

/// One active push registration. Dropping it releases the registration,
/// which makes the release happen exactly once.
#[async_trait]
pub trait ChangeSubscription: Send {
    /// The next change event, or `None` once the underlying channel is gone.
    /// Events may be delayed, duplicated, or dropped by the transport.
    async fn next(&mut self) -> Option<ChangeEvent>;
}

/// Server-to-client notification of mutations on a named resource.
#[async_trait]
pub trait PushChannel: Send + Sync {
    async fn subscribe(
        &self,
        resource: &str,
    ) -> Result<Box<dyn ChangeSubscription>, SubscribeError>;
}

/// Binary blob storage addressed by path, with public URLs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Uploads `bytes` to `path`, replacing any previous object there, and
    /// returns the public URL of the uploaded object.
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ObjectError>;
}
