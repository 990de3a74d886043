use crate::model::Id;
use crate::model::post::PostMarker;
use crate::model::profile::ProfileMarker;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct LikeMarker;

/// One user's like on one post. At most one per (post, user) pair is
/// intended; the toggle path upholds this only per client, see
/// `FeedSynchronizer::toggle_like`.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct Like {
    pub id: Id<LikeMarker>,
    pub post: Id<PostMarker>,
    pub user: Id<ProfileMarker>,
}
