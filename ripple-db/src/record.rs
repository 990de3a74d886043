use ripple_common::model::{
    ModelValidationError,
    like::Like,
    post::{AuthorSnapshot, Post},
    profile::{Profile, Username},
};
use sqlx::FromRow;
use time::OffsetDateTime;

/// A posts row joined with its author's display fields.
#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub struct FeedPostRecord {
    pub id: String,
    pub author_id: String,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub created_at: OffsetDateTime,
    pub username: String,
    pub avatar_url: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub struct ProfileRecord {
    pub id: String,
    pub username: String,
    pub avatar_url: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub struct LikeRecord {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
}

impl TryFrom<FeedPostRecord> for Post {
    type Error = ModelValidationError;

    fn try_from(value: FeedPostRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id.into(),
            author: value.author_id.into(),
            content: value.content,
            image_url: value.image_url,
            created_at: value.created_at.to_utc(),
            author_snapshot: AuthorSnapshot {
                username: Username::new(value.username)?,
                avatar_url: value.avatar_url,
            },
        })
    }
}

impl TryFrom<ProfileRecord> for Profile {
    type Error = ModelValidationError;

    fn try_from(value: ProfileRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id.into(),
            username: Username::new(value.username)?,
            avatar_url: value.avatar_url,
        })
    }
}

impl From<LikeRecord> for Like {
    fn from(value: LikeRecord) -> Self {
        Self {
            id: value.id.into(),
            post: value.post_id.into(),
            user: value.user_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::record::{FeedPostRecord, LikeRecord, ProfileRecord};
    use ripple_common::model::{like::Like, post::Post, profile::Profile};
    use time::macros::datetime;

    #[test]
    fn feed_post_record_conversion() {
        let record = FeedPostRecord {
            id: "p1".to_owned(),
            author_id: "u1".to_owned(),
            content: Some("hello".to_owned()),
            image_url: None,
            created_at: datetime!(2025-06-01 12:00 UTC),
            username: "ada".to_owned(),
            avatar_url: Some("https://img.example/a.jpg".to_owned()),
        };

        let post = Post::try_from(record).unwrap();
        assert_eq!(post.id.as_str(), "p1");
        assert_eq!(post.author.as_str(), "u1");
        assert_eq!(post.content.as_deref(), Some("hello"));
        assert_eq!(post.author_snapshot.username.get(), "ada");
        assert_eq!(
            post.author_snapshot.avatar_url.as_deref(),
            Some("https://img.example/a.jpg")
        );
    }

    #[test]
    fn invalid_username_is_rejected() {
        let record = ProfileRecord {
            id: "u1".to_owned(),
            username: "a".repeat(51),
            avatar_url: None,
        };

        assert!(Profile::try_from(record).is_err());
    }

    #[test]
    fn like_record_conversion() {
        let like = Like::from(LikeRecord {
            id: "l1".to_owned(),
            post_id: "p1".to_owned(),
            user_id: "u1".to_owned(),
        });

        assert_eq!(like.id.as_str(), "l1");
        assert_eq!(like.post.as_str(), "p1");
        assert_eq!(like.user.as_str(), "u1");
    }
}
