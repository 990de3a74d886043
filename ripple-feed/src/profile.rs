//! The session user's profile: fetching it and replacing its avatar.

use ripple_common::model::{
    Id,
    profile::{Profile, ProfileMarker},
    session::Session,
};
use ripple_db::store::{FeedStore, ObjectError, ObjectStore, StoreError};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Uploading the avatar failed: {0}")]
    Upload(#[from] ObjectError),
    #[error("Updating the profile failed: {0}")]
    Store(#[from] StoreError),
    #[error("No profile exists for user {0}")]
    NotFound(Id<ProfileMarker>),
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
}

impl ImageFormat {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Webp => "webp",
        }
    }

    #[must_use]
    pub fn content_type(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Webp => "image/webp",
        }
    }
}

pub struct AvatarUpload {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

pub struct ProfileManager {
    store: Arc<dyn FeedStore>,
    objects: Arc<dyn ObjectStore>,
    session: Session,
}

impl ProfileManager {
    #[must_use]
    pub fn new(store: Arc<dyn FeedStore>, objects: Arc<dyn ObjectStore>, session: Session) -> Self {
        Self {
            store,
            objects,
            session,
        }
    }

    pub async fn profile(&self) -> Result<Profile, ProfileError> {
        let user = self.session.user_id();
        self.store
            .fetch_profile(user)
            .await?
            .ok_or_else(|| ProfileError::NotFound(user.clone()))
    }

    /// Uploads the image, points the profile row at its public URL, and
    /// returns the re-fetched profile. A failed upload leaves the profile
    /// row untouched.
    pub async fn update_avatar(&self, upload: AvatarUpload) -> Result<Profile, ProfileError> {
        let path = self.avatar_path(upload.format);
        let public_url = self
            .objects
            .put(&path, upload.bytes, upload.format.content_type())
            .await?;

        self.store
            .update_avatar_url(self.session.user_id(), &public_url)
            .await?;

        self.profile().await
    }

    /// One avatar object per user; re-uploads replace it in place.
    fn avatar_path(&self, format: ImageFormat) -> String {
        format!(
            "avatars/{}/avatar.{}",
            self.session.user_id(),
            format.extension()
        )
    }
}
