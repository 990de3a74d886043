use crate::record::{FeedPostRecord, LikeRecord, ProfileRecord};
use crate::store::{FeedStore, Result};
use async_trait::async_trait;
use ripple_common::model::{
    Id,
    feed::FeedScope,
    like::{Like, LikeMarker},
    post::{CreatePost, Post, PostMarker},
    profile::{Profile, ProfileMarker},
};
use sqlx::{PgPool, postgres::PgPoolOptions};

const MAX_CONNECTIONS: u32 = 5;

pub async fn connect(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect(database_url)
        .await?;

    Ok(pool)
}

const SELECT_FEED: &str = "
    SELECT
        posts.id,
        posts.author_id,
        posts.content,
        posts.image_url,
        posts.created_at,
        profiles.username,
        profiles.avatar_url
    FROM
        posts JOIN profiles ON profiles.id = posts.author_id
    ORDER BY
        posts.created_at DESC, posts.id DESC
";

const SELECT_AUTHOR_FEED: &str = "
    SELECT
        posts.id,
        posts.author_id,
        posts.content,
        posts.image_url,
        posts.created_at,
        profiles.username,
        profiles.avatar_url
    FROM
        posts JOIN profiles ON profiles.id = posts.author_id
    WHERE
        posts.author_id = $1
    ORDER BY
        posts.created_at DESC, posts.id DESC
";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FeedStore for PgStore {
    async fn fetch_posts(&self, scope: &FeedScope) -> Result<Vec<Post>> {
        let records = match scope {
            FeedScope::Global => {
                sqlx::query_as::<_, FeedPostRecord>(SELECT_FEED)
                    .fetch_all(&self.pool)
                    .await?
            }
            FeedScope::Author(author) => {
                sqlx::query_as::<_, FeedPostRecord>(SELECT_AUTHOR_FEED)
                    .bind(author.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let posts = records
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<_, _>>()?;
        Ok(posts)
    }

    async fn create_post(&self, post: &CreatePost) -> Result<Id<PostMarker>> {
        let id: String = sqlx::query_scalar(
            "
            INSERT INTO posts (author_id, content, image_url)
            VALUES ($1, $2, $3)
            RETURNING id
            ",
        )
        .bind(post.author().as_str())
        .bind(post.content())
        .bind(post.image_url())
        .fetch_one(&self.pool)
        .await?;

        Ok(id.into())
    }

    async fn fetch_like(
        &self,
        post: &Id<PostMarker>,
        user: &Id<ProfileMarker>,
    ) -> Result<Option<Like>> {
        let record = sqlx::query_as::<_, LikeRecord>(
            "
            SELECT
                likes.id,
                likes.post_id,
                likes.user_id
            FROM
                likes
            WHERE
                likes.post_id = $1 AND likes.user_id = $2
            ",
        )
        .bind(post.as_str())
        .bind(user.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Like::from))
    }

    async fn insert_like(
        &self,
        post: &Id<PostMarker>,
        user: &Id<ProfileMarker>,
    ) -> Result<Id<LikeMarker>> {
        let id: String = sqlx::query_scalar(
            "
            INSERT INTO likes (post_id, user_id)
            VALUES ($1, $2)
            RETURNING id
            ",
        )
        .bind(post.as_str())
        .bind(user.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(id.into())
    }

    async fn delete_like(&self, like: &Id<LikeMarker>) -> Result<()> {
        sqlx::query("DELETE FROM likes WHERE id = $1")
            .bind(like.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn fetch_profile(&self, profile: &Id<ProfileMarker>) -> Result<Option<Profile>> {
        let record = sqlx::query_as::<_, ProfileRecord>(
            "
            SELECT
                profiles.id,
                profiles.username,
                profiles.avatar_url
            FROM
                profiles
            WHERE
                profiles.id = $1
            ",
        )
        .bind(profile.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let profile = record.map(Profile::try_from).transpose()?;
        Ok(profile)
    }

    async fn update_avatar_url(
        &self,
        profile: &Id<ProfileMarker>,
        avatar_url: &str,
    ) -> Result<()> {
        sqlx::query("UPDATE profiles SET avatar_url = $1 WHERE id = $2")
            .bind(avatar_url)
            .bind(profile.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
