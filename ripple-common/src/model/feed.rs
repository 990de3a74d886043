use crate::model::Id;
use crate::model::post::Post;
use crate::model::profile::ProfileMarker;
use std::cmp::Ordering;

/// Which posts belong to one screen's feed.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub enum FeedScope {
    #[default]
    Global,
    Author(Id<ProfileMarker>),
}

impl FeedScope {
    #[must_use]
    pub fn author(id: impl Into<Id<ProfileMarker>>) -> Self {
        Self::Author(id.into())
    }

    #[must_use]
    pub fn matches(&self, post: &Post) -> bool {
        match self {
            FeedScope::Global => true,
            FeedScope::Author(author) => post.author == *author,
        }
    }
}

/// Canonical feed ordering: newest first, id descending as tie-break so the
/// order is deterministic for equal timestamps.
#[must_use]
pub fn feed_order(a: &Post, b: &Post) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}
