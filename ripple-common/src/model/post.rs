use crate::model::Id;
use crate::model::profile::{ProfileMarker, Username};
use thiserror::Error;
use time::UtcDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub author: Id<ProfileMarker>,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub created_at: UtcDateTime,
    pub author_snapshot: AuthorSnapshot,
}

/// The author's display fields as resolved at fetch time.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct AuthorSnapshot {
    pub username: Username,
    pub avatar_url: Option<String>,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("A post needs text content or an image")]
pub struct EmptyPostError;

/// A new post as accepted by the creation path. Construction is the one
/// place that enforces the content-or-image invariant; empty strings count
/// as absent.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct CreatePost {
    author: Id<ProfileMarker>,
    content: Option<String>,
    image_url: Option<String>,
}

impl CreatePost {
    pub fn new(
        author: Id<ProfileMarker>,
        content: Option<String>,
        image_url: Option<String>,
    ) -> Result<Self, EmptyPostError> {
        let content = content.filter(|content| !content.is_empty());
        let image_url = image_url.filter(|url| !url.is_empty());

        if content.is_none() && image_url.is_none() {
            return Err(EmptyPostError);
        }

        Ok(Self {
            author,
            content,
            image_url,
        })
    }

    #[must_use]
    pub fn author(&self) -> &Id<ProfileMarker> {
        &self.author
    }

    #[must_use]
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    #[must_use]
    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use crate::model::post::{CreatePost, EmptyPostError};

    #[test]
    fn create_post_needs_content_or_image() {
        assert_eq!(
            CreatePost::new("u1".into(), None, None),
            Err(EmptyPostError)
        );
        assert_eq!(
            CreatePost::new("u1".into(), Some(String::new()), Some(String::new())),
            Err(EmptyPostError)
        );

        let text_only = CreatePost::new("u1".into(), Some("hello".to_owned()), None).unwrap();
        assert_eq!(text_only.content(), Some("hello"));
        assert_eq!(text_only.image_url(), None);

        let image_only =
            CreatePost::new("u1".into(), None, Some("https://img.example/p.jpg".to_owned()))
                .unwrap();
        assert_eq!(image_only.content(), None);
        assert_eq!(image_only.image_url(), Some("https://img.example/p.jpg"));
    }

    #[test]
    fn create_post_drops_empty_strings() {
        let post = CreatePost::new(
            "u1".into(),
            Some("hello".to_owned()),
            Some(String::new()),
        )
        .unwrap();
        assert_eq!(post.image_url(), None);
    }
}
