use crate::model::{Id, user::UserSummary};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use thiserror::Error;
use time::UtcDateTime;

pub const COMMENT_MAX_LEN: usize = 500;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CommentMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Comment {
    pub id: Id<CommentMarker>,
    pub user: UserSummary,
    pub text: CommentText,
    pub created_at: UtcDateTime,
}

/// A comment in a post's comment list, annotated with the viewer's delete
/// permissions (own comment, or any comment under the viewer's own post).
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct CommentWithPermissions {
    #[serde(flatten)]
    pub comment: Comment,
    pub is_owner: bool,
    pub post_owner: bool,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct CommentText(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum InvalidCommentTextError {
    #[error("Comment text is required")]
    Empty,
    #[error("The comment is too long")]
    TooLong(String),
}

impl CommentText {
    pub fn new(text: String) -> Result<Self, InvalidCommentTextError> {
        let text = text.trim().to_owned();
        if text.is_empty() {
            return Err(InvalidCommentTextError::Empty);
        }
        if text.chars().count() > COMMENT_MAX_LEN {
            return Err(InvalidCommentTextError::TooLong(text));
        }
        Ok(CommentText(text))
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

impl<'de> Deserialize<'de> for CommentText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        CommentText::new(inner.clone())
            .map_err(|_| Error::invalid_value(Unexpected::Str(&inner), &"CommentText"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_must_not_be_blank() {
        assert_eq!(
            CommentText::new(String::new()),
            Err(InvalidCommentTextError::Empty)
        );
        assert_eq!(
            CommentText::new("   ".to_owned()),
            Err(InvalidCommentTextError::Empty)
        );
    }

    #[test]
    fn comment_is_trimmed() {
        let text = CommentText::new("  nice shot  ".to_owned()).unwrap();
        assert_eq!(text.get(), "nice shot");
    }

    #[test]
    fn comment_length_bound() {
        assert!(CommentText::new("a".repeat(COMMENT_MAX_LEN)).is_ok());
        assert!(CommentText::new("a".repeat(COMMENT_MAX_LEN + 1)).is_err());
    }
}
