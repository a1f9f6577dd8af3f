use crate::model::{Id, user::UserCard};
use serde::{Deserialize, Serialize};
use time::{Duration, UtcDateTime};

/// Stories disappear 24 hours after creation.
pub const STORY_TTL: Duration = Duration::hours(24);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct StoryMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Story {
    pub id: Id<StoryMarker>,
    pub user: UserCard,
    pub image_url: String,
    pub created_at: UtcDateTime,
    pub expires_at: UtcDateTime,
}

impl Story {
    /// Whether the story is still visible. The boundary is exclusive: a story
    /// whose expiry equals `now` is already gone.
    #[must_use]
    pub fn is_active(&self, now: UtcDateTime) -> bool {
        self.expires_at > now
    }
}

/// A story inside a per-user group; the owner lives on the group.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct StoryItem {
    pub id: Id<StoryMarker>,
    pub image_url: String,
    pub created_at: UtcDateTime,
}

/// One contributing user's active stories, newest first.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct StoryGroup {
    pub user: UserCard,
    pub stories: Vec<StoryItem>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::user::Username;
    use time::macros::utc_datetime;

    fn story(created_at: UtcDateTime) -> Story {
        Story {
            id: Id::random(),
            user: UserCard {
                id: Id::random(),
                username: Username::new("alice".to_owned()).unwrap(),
                profile_photo: None,
            },
            image_url: "https://img.example/1.jpg".to_owned(),
            created_at,
            expires_at: created_at + STORY_TTL,
        }
    }

    #[test]
    fn story_active_within_ttl() {
        let created = utc_datetime!(2026-03-01 12:00);
        let story = story(created);
        assert!(story.is_active(created));
        assert!(story.is_active(created + Duration::hours(23)));
    }

    #[test]
    fn story_expired_after_ttl() {
        let created = utc_datetime!(2026-03-01 12:00);
        let story = story(created);
        assert!(!story.is_active(created + Duration::hours(25)));
    }

    #[test]
    fn story_expiry_boundary_is_exclusive() {
        let created = utc_datetime!(2026-03-01 12:00);
        let story = story(created);
        assert!(!story.is_active(created + STORY_TTL));
        assert!(story.is_active(created + STORY_TTL - Duration::seconds(1)));
    }
}
