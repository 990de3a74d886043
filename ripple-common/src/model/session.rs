use crate::model::Id;
use crate::model::profile::ProfileMarker;

/// The authenticated user's identity, resolved by the auth layer before any
/// of it is used. Carried by value so no operation ever reads an unresolved
/// auth accessor mid-query.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct Session {
    user_id: Id<ProfileMarker>,
    email: String,
}

impl Session {
    #[must_use]
    pub fn new(user_id: impl Into<Id<ProfileMarker>>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
        }
    }

    #[must_use]
    pub fn user_id(&self) -> &Id<ProfileMarker> {
        &self.user_id
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }
}
