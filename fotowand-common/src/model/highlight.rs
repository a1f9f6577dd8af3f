use crate::model::{
    Id,
    story::StoryItem,
    user::UserCard,
};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use thiserror::Error;

pub const HIGHLIGHT_TITLE_MAX_LEN: usize = 30;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct HighlightMarker;

/// A highlight tile on a profile. The cover image is frozen at creation time;
/// it is not refreshed when the source story later expires.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct HighlightSummary {
    pub id: Id<HighlightMarker>,
    pub title: HighlightTitle,
    pub cover_image: Option<String>,
    pub stories_count: usize,
}

/// An opened highlight with its curated stories in their pinned order.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Highlight {
    pub id: Id<HighlightMarker>,
    pub title: HighlightTitle,
    pub user: UserCard,
    pub stories: Vec<StoryItem>,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct HighlightTitle(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum InvalidHighlightTitleError {
    #[error("Title is required")]
    Empty,
    #[error("The title is too long")]
    TooLong(String),
}

impl HighlightTitle {
    pub fn new(title: String) -> Result<Self, InvalidHighlightTitleError> {
        let title = title.trim().to_owned();
        if title.is_empty() {
            return Err(InvalidHighlightTitleError::Empty);
        }
        if title.chars().count() > HIGHLIGHT_TITLE_MAX_LEN {
            return Err(InvalidHighlightTitleError::TooLong(title));
        }
        Ok(HighlightTitle(title))
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

impl<'de> Deserialize<'de> for HighlightTitle {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        HighlightTitle::new(inner.clone())
            .map_err(|_| Error::invalid_value(Unexpected::Str(&inner), &"HighlightTitle"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_must_not_be_blank() {
        assert_eq!(
            HighlightTitle::new("  ".to_owned()),
            Err(InvalidHighlightTitleError::Empty)
        );
    }

    #[test]
    fn title_length_bound() {
        assert!(HighlightTitle::new("a".repeat(HIGHLIGHT_TITLE_MAX_LEN)).is_ok());
        assert!(HighlightTitle::new("a".repeat(HIGHLIGHT_TITLE_MAX_LEN + 1)).is_err());
    }
}
