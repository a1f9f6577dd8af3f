use crate::model::{Id, user::UserSummary};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use thiserror::Error;
use time::UtcDateTime;

pub const CAPTION_MAX_LEN: usize = 500;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

/// A post as shown in the feed and on profile grids, annotated for the viewer.
#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub user: UserSummary,
    pub image_url: String,
    pub caption: Caption,
    pub likes: Vec<UserSummary>,
    pub likes_count: usize,
    pub is_liked: bool,
    pub created_at: UtcDateTime,
}

/// A single-post view, which additionally tells the viewer whether they own it.
#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub struct PostWithOwnership {
    #[serde(flatten)]
    pub post: Post,
    pub is_owner: bool,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct Caption(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The caption is too long")]
pub struct InvalidCaptionError(String);

impl Caption {
    /// Captions may be empty; the upper bound is all that is enforced.
    pub fn new(caption: String) -> Result<Self, InvalidCaptionError> {
        let caption = caption.trim().to_owned();
        if caption.chars().count() <= CAPTION_MAX_LEN {
            Ok(Caption(caption))
        } else {
            Err(InvalidCaptionError(caption))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for Caption {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Caption::new(inner).map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"Caption"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caption_may_be_empty() {
        assert_eq!(Caption::new(String::new()).unwrap(), Caption::default());
    }

    #[test]
    fn caption_length_bound() {
        assert!(Caption::new("a".repeat(CAPTION_MAX_LEN)).is_ok());
        assert!(Caption::new("a".repeat(CAPTION_MAX_LEN + 1)).is_err());
    }
}
