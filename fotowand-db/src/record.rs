use fotowand_common::model::{
    ModelValidationError,
    auth::Session,
    comment::{Comment, CommentText},
    highlight::{HighlightSummary, HighlightTitle},
    story::{Story, StoryItem},
    user::{Bio, EmailAddress, SearchedUser, User, UserCard, UserSummary, Username},
};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Debug, FromRow)]
pub(crate) struct UserRow {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub profile_photo: Option<String>,
    pub bio: String,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Debug, FromRow)]
pub(crate) struct UserSummaryRow {
    pub user_id: Uuid,
    pub username: String,
}

#[derive(Clone, Debug, FromRow)]
pub(crate) struct UserCardRow {
    pub user_id: Uuid,
    pub username: String,
    pub profile_photo: Option<String>,
}

#[derive(Clone, Debug, FromRow)]
pub(crate) struct CredentialsRow {
    pub user_id: Uuid,
    pub password_hash: String,
}

#[derive(Clone, Debug, FromRow)]
pub(crate) struct SessionRow {
    pub user_id: Uuid,
    pub token_hash: Vec<u8>,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

#[derive(Clone, Debug, FromRow)]
pub(crate) struct PostRow {
    pub post_id: Uuid,
    pub image_url: String,
    pub caption: String,
    pub created_at: OffsetDateTime,
    pub author_id: Uuid,
    pub author_username: String,
}

#[derive(Clone, Debug, FromRow)]
pub(crate) struct PostLikeRow {
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
}

#[derive(Clone, Debug, FromRow)]
pub(crate) struct CommentRow {
    pub comment_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub body: String,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Debug, FromRow)]
pub(crate) struct CommentOwnersRow {
    pub comment_author: Uuid,
    pub post_author: Uuid,
}

#[derive(Clone, Debug, FromRow)]
pub(crate) struct StoryRow {
    pub story_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub profile_photo: Option<String>,
    pub image_url: String,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

#[derive(Clone, Debug, FromRow)]
pub(crate) struct StoryItemRow {
    pub story_id: Uuid,
    pub image_url: String,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Debug, FromRow)]
pub(crate) struct HighlightSummaryRow {
    pub highlight_id: Uuid,
    pub title: String,
    pub cover_image: Option<String>,
    pub stories_count: i64,
}

#[derive(Clone, Debug, FromRow)]
pub(crate) struct HighlightHeadRow {
    pub highlight_id: Uuid,
    pub title: String,
    pub user_id: Uuid,
    pub username: String,
    pub profile_photo: Option<String>,
}

#[derive(Clone, Debug, FromRow)]
pub(crate) struct SearchedUserRow {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub is_following: bool,
}

impl TryFrom<UserRow> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.user_id.into(),
            username: Username::new(value.username)?,
            email: EmailAddress::new(value.email)?,
            profile_photo: value.profile_photo,
            bio: Bio::new(value.bio)?,
            created_at: value.created_at.to_utc(),
        })
    }
}

impl TryFrom<UserSummaryRow> for UserSummary {
    type Error = ModelValidationError;

    fn try_from(value: UserSummaryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.user_id.into(),
            username: Username::new(value.username)?,
        })
    }
}

impl TryFrom<UserCardRow> for UserCard {
    type Error = ModelValidationError;

    fn try_from(value: UserCardRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.user_id.into(),
            username: Username::new(value.username)?,
            profile_photo: value.profile_photo,
        })
    }
}

impl TryFrom<SessionRow> for Session {
    type Error = ModelValidationError;

    fn try_from(value: SessionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            user: value.user_id.into(),
            token_hash: value.token_hash.into_boxed_slice().try_into()?,
            created_at: value.created_at.to_utc(),
            expires_at: value.expires_at.to_utc(),
        })
    }
}

impl TryFrom<CommentRow> for Comment {
    type Error = ModelValidationError;

    fn try_from(value: CommentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.comment_id.into(),
            user: UserSummary {
                id: value.user_id.into(),
                username: Username::new(value.username)?,
            },
            text: CommentText::new(value.body)?,
            created_at: value.created_at.to_utc(),
        })
    }
}

impl TryFrom<StoryRow> for Story {
    type Error = ModelValidationError;

    fn try_from(value: StoryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.story_id.into(),
            user: UserCard {
                id: value.user_id.into(),
                username: Username::new(value.username)?,
                profile_photo: value.profile_photo,
            },
            image_url: value.image_url,
            created_at: value.created_at.to_utc(),
            expires_at: value.expires_at.to_utc(),
        })
    }
}

impl From<StoryItemRow> for StoryItem {
    fn from(value: StoryItemRow) -> Self {
        Self {
            id: value.story_id.into(),
            image_url: value.image_url,
            created_at: value.created_at.to_utc(),
        }
    }
}

impl TryFrom<HighlightSummaryRow> for HighlightSummary {
    type Error = ModelValidationError;

    fn try_from(value: HighlightSummaryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.highlight_id.into(),
            title: HighlightTitle::new(value.title)?,
            cover_image: value.cover_image,
            stories_count: usize::try_from(value.stories_count).unwrap_or_default(),
        })
    }
}

impl TryFrom<SearchedUserRow> for SearchedUser {
    type Error = ModelValidationError;

    fn try_from(value: SearchedUserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.user_id.into(),
            username: Username::new(value.username)?,
            email: EmailAddress::new(value.email)?,
            is_following: value.is_following,
        })
    }
}
