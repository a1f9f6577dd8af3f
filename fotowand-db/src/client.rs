use crate::record::{
    CommentOwnersRow, CommentRow, CredentialsRow, HighlightHeadRow, HighlightSummaryRow,
    PostLikeRow, PostRow, SearchedUserRow, SessionRow, StoryItemRow, StoryRow, UserCardRow,
    UserRow, UserSummaryRow,
};
use fotowand_common::model::{
    Id, ModelValidationError,
    auth::{AuthTokenHash, Session},
    comment::{Comment, CommentMarker, CommentText, CommentWithPermissions},
    highlight::{Highlight, HighlightMarker, HighlightSummary, HighlightTitle},
    post::{Caption, Post, PostMarker, PostWithOwnership},
    story::{STORY_TTL, Story, StoryGroup, StoryMarker},
    user::{
        Bio, EmailAddress, Profile, SearchedUser, User, UserCard, UserMarker, UserSummary,
        Username,
    },
};
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use time::{OffsetDateTime, UtcDateTime};
use uuid::Uuid;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

/// The feed never returns more than this many posts.
pub const FEED_LIMIT: i64 = 50;
/// Cap on follow suggestions.
pub const SUGGESTION_LIMIT: i64 = 10;
/// Cap on username search results.
pub const SEARCH_LIMIT: i64 = 20;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("You cannot follow yourself")]
    SelfFollow,
    #[error("You are already following this user")]
    AlreadyFollowing,
    #[error("You are not following this user")]
    NotFollowing,
    #[error("Post already liked")]
    AlreadyLiked,
    #[error("Post not liked yet")]
    NotLiked,
    #[error("A user with this email or username already exists")]
    DuplicateUser,
    #[error("Username already taken")]
    UsernameTaken,
    #[error("User with id {0} was not found")]
    UserNotFound(Id<UserMarker>),
    #[error("Post with id {0} was not found")]
    PostNotFound(Id<PostMarker>),
    #[error("Comment with id {0} was not found")]
    CommentNotFound(Id<CommentMarker>),
    #[error("Story with id {0} was not found")]
    StoryNotFound(Id<StoryMarker>),
    #[error("Highlight with id {0} was not found")]
    HighlightNotFound(Id<HighlightMarker>),
    #[error("You can only edit your own posts")]
    NotPostOwner,
    #[error("You can only delete your own comments or comments on your posts")]
    CommentNotDeletable,
    #[error("You can only delete your own stories")]
    NotStoryOwner,
    #[error("You can only delete your own highlights")]
    NotHighlightOwner,
    #[error("None of the selected stories belong to you")]
    NoOwnedStories,
}

/// A user's login identity: the account id plus the stored PHC password hash.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub user_id: Id<UserMarker>,
    pub password_hash: String,
}

pub struct DbClient {
    pool: PgPool,
}

impl std::fmt::Debug for DbClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbClient").finish_non_exhaustive()
    }
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    // ==== users ====

    pub async fn create_user(
        &self,
        username: &Username,
        email: &EmailAddress,
        password_hash: &str,
    ) -> Result<User> {
        let user_id = Id::<UserMarker>::random();

        let row = sqlx::query_as::<_, UserRow>(
            "
            INSERT INTO users (user_id, username, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING user_id, username, email, profile_photo, bio, created_at
            ",
        )
        .bind(user_id.uuid())
        .bind(username.get())
        .bind(email.get())
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| on_unique_violation(err, DbError::DuplicateUser))?;

        Ok(row.try_into()?)
    }

    pub async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "
            SELECT user_id, username, email, profile_photo, bio, created_at
            FROM users
            WHERE user_id = $1
            ",
        )
        .bind(user_id.uuid())
        .fetch_optional(&self.pool)
        .await?;

        let user = row.map(User::try_from).transpose()?;
        Ok(user)
    }

    pub async fn fetch_credentials(&self, email: &EmailAddress) -> Result<Option<Credentials>> {
        let row = sqlx::query_as::<_, CredentialsRow>(
            "
            SELECT user_id, password_hash
            FROM users
            WHERE email = $1
            ",
        )
        .bind(email.get())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Credentials {
            user_id: row.user_id.into(),
            password_hash: row.password_hash,
        }))
    }

    /// A profile page with both relationship sides populated, annotated
    /// relative to `viewer`.
    pub async fn fetch_profile(
        &self,
        user_id: Id<UserMarker>,
        viewer: Id<UserMarker>,
    ) -> Result<Option<Profile>> {
        let Some(user_row) = sqlx::query_as::<_, UserRow>(
            "
            SELECT user_id, username, email, profile_photo, bio, created_at
            FROM users
            WHERE user_id = $1
            ",
        )
        .bind(user_id.uuid())
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let followers = sqlx::query_as::<_, UserSummaryRow>(
            "
            SELECT u.user_id, u.username
            FROM follows f
            JOIN users u ON u.user_id = f.follower_id
            WHERE f.followee_id = $1
            ORDER BY f.created_at
            ",
        )
        .bind(user_id.uuid())
        .fetch_all(&self.pool)
        .await?;

        let following = sqlx::query_as::<_, UserSummaryRow>(
            "
            SELECT u.user_id, u.username
            FROM follows f
            JOIN users u ON u.user_id = f.followee_id
            WHERE f.follower_id = $1
            ORDER BY f.created_at
            ",
        )
        .bind(user_id.uuid())
        .fetch_all(&self.pool)
        .await?;

        let followers = followers
            .into_iter()
            .map(UserSummary::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let following = following
            .into_iter()
            .map(UserSummary::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let user = User::try_from(user_row)?;
        let is_following = followers.iter().any(|follower| follower.id == viewer);

        Ok(Some(Profile {
            id: user.id,
            username: user.username,
            email: user.email,
            profile_photo: user.profile_photo,
            bio: user.bio,
            followers_count: followers.len(),
            following_count: following.len(),
            followers,
            following,
            is_following,
            created_at: user.created_at,
        }))
    }

    /// Partial profile update; absent fields keep their current value.
    pub async fn update_profile(
        &self,
        user_id: Id<UserMarker>,
        username: Option<&Username>,
        bio: Option<&Bio>,
        profile_photo: Option<&str>,
    ) -> Result<User> {
        if let Some(username) = username {
            let taken = sqlx::query_scalar::<_, bool>(
                "
                SELECT EXISTS (
                    SELECT 1 FROM users
                    WHERE username = $1 AND user_id <> $2
                )
                ",
            )
            .bind(username.get())
            .bind(user_id.uuid())
            .fetch_one(&self.pool)
            .await?;

            if taken {
                return Err(DbError::UsernameTaken);
            }
        }

        let row = sqlx::query_as::<_, UserRow>(
            "
            UPDATE users
            SET username = COALESCE($2, username),
                bio = COALESCE($3, bio),
                profile_photo = COALESCE($4, profile_photo)
            WHERE user_id = $1
            RETURNING user_id, username, email, profile_photo, bio, created_at
            ",
        )
        .bind(user_id.uuid())
        .bind(username.map(Username::get))
        .bind(bio.map(Bio::get))
        .bind(profile_photo)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| on_unique_violation(err, DbError::UsernameTaken))?;

        let row = row.ok_or(DbError::UserNotFound(user_id))?;
        Ok(row.try_into()?)
    }

    // ==== sessions ====

    pub async fn create_session(&self, session: &Session) -> Result<()> {
        sqlx::query(
            "
            INSERT INTO sessions (token_hash, user_id, created_at, expires_at)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(&session.token_hash.0[..])
        .bind(session.user.uuid())
        .bind(OffsetDateTime::from(session.created_at))
        .bind(OffsetDateTime::from(session.expires_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn fetch_session(&self, token_hash: &AuthTokenHash) -> Result<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(
            "
            SELECT user_id, token_hash, created_at, expires_at
            FROM sessions
            WHERE token_hash = $1
            ",
        )
        .bind(&token_hash.0[..])
        .fetch_optional(&self.pool)
        .await?;

        let session = row.map(Session::try_from).transpose()?;
        Ok(session)
    }

    pub async fn delete_expired_sessions(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    // ==== follow graph ====

    /// Adds the edge `actor -> target`. The existence check and the insert run
    /// in one transaction so a failure partway leaves no half-written edge.
    pub async fn follow(&self, actor: Id<UserMarker>, target: Id<UserMarker>) -> Result<()> {
        if actor == target {
            return Err(DbError::SelfFollow);
        }

        let mut tx = self.pool.begin().await?;

        let target_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE user_id = $1)")
                .bind(target.uuid())
                .fetch_one(&mut *tx)
                .await?;
        if !target_exists {
            return Err(DbError::UserNotFound(target));
        }

        let inserted = sqlx::query(
            "
            INSERT INTO follows (follower_id, followee_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(actor.uuid())
        .bind(target.uuid())
        .execute(&mut *tx)
        .await?;
        if inserted.rows_affected() == 0 {
            return Err(DbError::AlreadyFollowing);
        }

        tx.commit().await?;
        Ok(())
    }

    /// Removes the edge `actor -> target`; the symmetric inverse of [`Self::follow`].
    pub async fn unfollow(&self, actor: Id<UserMarker>, target: Id<UserMarker>) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let target_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE user_id = $1)")
                .bind(target.uuid())
                .fetch_one(&mut *tx)
                .await?;
        if !target_exists {
            return Err(DbError::UserNotFound(target));
        }

        let deleted = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND followee_id = $2")
            .bind(actor.uuid())
            .bind(target.uuid())
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(DbError::NotFollowing);
        }

        tx.commit().await?;
        Ok(())
    }

    // ==== feed & posts ====

    /// Posts by followed users, newest first, capped at [`FEED_LIMIT`].
    pub async fn fetch_feed(&self, viewer: Id<UserMarker>) -> Result<Vec<Post>> {
        let rows = sqlx::query_as::<_, PostRow>(
            "
            SELECT p.post_id, p.image_url, p.caption, p.created_at,
                   u.user_id AS author_id, u.username AS author_username
            FROM posts p
            JOIN follows f ON f.followee_id = p.user_id
            JOIN users u ON u.user_id = p.user_id
            WHERE f.follower_id = $1
            ORDER BY p.created_at DESC
            LIMIT $2
            ",
        )
        .bind(viewer.uuid())
        .bind(FEED_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        let likes = self.fetch_likes_for(&rows).await?;
        Ok(assemble_posts(rows, likes, viewer)?)
    }

    pub async fn create_post(
        &self,
        author: Id<UserMarker>,
        image_url: &str,
        caption: &Caption,
    ) -> Result<Post> {
        let post_id = Id::<PostMarker>::random();

        let row = sqlx::query_as::<_, PostRow>(
            "
            INSERT INTO posts (post_id, user_id, image_url, caption)
            VALUES ($1, $2, $3, $4)
            RETURNING post_id, image_url, caption, created_at,
                      user_id AS author_id,
                      (SELECT username FROM users WHERE user_id = $2) AS author_username
            ",
        )
        .bind(post_id.uuid())
        .bind(author.uuid())
        .bind(image_url)
        .bind(caption.get())
        .fetch_one(&self.pool)
        .await?;

        Ok(assemble_post(row, Vec::new(), author)?)
    }

    pub async fn fetch_post(
        &self,
        post_id: Id<PostMarker>,
        viewer: Id<UserMarker>,
    ) -> Result<Option<PostWithOwnership>> {
        let Some(row) = sqlx::query_as::<_, PostRow>(
            "
            SELECT p.post_id, p.image_url, p.caption, p.created_at,
                   u.user_id AS author_id, u.username AS author_username
            FROM posts p
            JOIN users u ON u.user_id = p.user_id
            WHERE p.post_id = $1
            ",
        )
        .bind(post_id.uuid())
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let is_owner = row.author_id == viewer.uuid();
        let likes = self.fetch_likes_for(std::slice::from_ref(&row)).await?;

        Ok(Some(PostWithOwnership {
            post: assemble_post(row, likes, viewer)?,
            is_owner,
        }))
    }

    /// All posts by one user, newest first. `None` when the user is absent.
    pub async fn fetch_user_posts(
        &self,
        user_id: Id<UserMarker>,
        viewer: Id<UserMarker>,
    ) -> Result<Option<Vec<Post>>> {
        let user_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE user_id = $1)")
                .bind(user_id.uuid())
                .fetch_one(&self.pool)
                .await?;
        if !user_exists {
            return Ok(None);
        }

        let rows = sqlx::query_as::<_, PostRow>(
            "
            SELECT p.post_id, p.image_url, p.caption, p.created_at,
                   u.user_id AS author_id, u.username AS author_username
            FROM posts p
            JOIN users u ON u.user_id = p.user_id
            WHERE p.user_id = $1
            ORDER BY p.created_at DESC
            ",
        )
        .bind(user_id.uuid())
        .fetch_all(&self.pool)
        .await?;

        let likes = self.fetch_likes_for(&rows).await?;
        Ok(Some(assemble_posts(rows, likes, viewer)?))
    }

    pub async fn update_caption(
        &self,
        post_id: Id<PostMarker>,
        actor: Id<UserMarker>,
        caption: &Caption,
    ) -> Result<PostWithOwnership> {
        let author = sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM posts WHERE post_id = $1")
            .bind(post_id.uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DbError::PostNotFound(post_id))?;
        if author != actor.uuid() {
            return Err(DbError::NotPostOwner);
        }

        sqlx::query("UPDATE posts SET caption = $2 WHERE post_id = $1")
            .bind(post_id.uuid())
            .bind(caption.get())
            .execute(&self.pool)
            .await?;

        self.fetch_post(post_id, actor)
            .await?
            .ok_or(DbError::PostNotFound(post_id))
    }

    /// Owner-only delete. The post, its likes and all its comments go in one
    /// transaction; a failure partway leaves no orphaned comments.
    pub async fn delete_post(&self, post_id: Id<PostMarker>, actor: Id<UserMarker>) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let author = sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM posts WHERE post_id = $1")
            .bind(post_id.uuid())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DbError::PostNotFound(post_id))?;
        if author != actor.uuid() {
            return Err(DbError::NotPostOwner);
        }

        sqlx::query("DELETE FROM comments WHERE post_id = $1")
            .bind(post_id.uuid())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM post_likes WHERE post_id = $1")
            .bind(post_id.uuid())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM posts WHERE post_id = $1")
            .bind(post_id.uuid())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Adds `actor` to the post's like set and returns the new like count.
    pub async fn like_post(
        &self,
        post_id: Id<PostMarker>,
        actor: Id<UserMarker>,
    ) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        let post_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM posts WHERE post_id = $1)")
                .bind(post_id.uuid())
                .fetch_one(&mut *tx)
                .await?;
        if !post_exists {
            return Err(DbError::PostNotFound(post_id));
        }

        let inserted = sqlx::query(
            "
            INSERT INTO post_likes (post_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(post_id.uuid())
        .bind(actor.uuid())
        .execute(&mut *tx)
        .await?;
        if inserted.rows_affected() == 0 {
            return Err(DbError::AlreadyLiked);
        }

        let count =
            sqlx::query_scalar::<_, i64>("SELECT count(*) FROM post_likes WHERE post_id = $1")
                .bind(post_id.uuid())
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Removes `actor` from the post's like set and returns the new like count.
    pub async fn unlike_post(
        &self,
        post_id: Id<PostMarker>,
        actor: Id<UserMarker>,
    ) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        let post_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM posts WHERE post_id = $1)")
                .bind(post_id.uuid())
                .fetch_one(&mut *tx)
                .await?;
        if !post_exists {
            return Err(DbError::PostNotFound(post_id));
        }

        let deleted = sqlx::query("DELETE FROM post_likes WHERE post_id = $1 AND user_id = $2")
            .bind(post_id.uuid())
            .bind(actor.uuid())
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(DbError::NotLiked);
        }

        let count =
            sqlx::query_scalar::<_, i64>("SELECT count(*) FROM post_likes WHERE post_id = $1")
                .bind(post_id.uuid())
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn fetch_likes_for(&self, posts: &[PostRow]) -> Result<Vec<PostLikeRow>> {
        if posts.is_empty() {
            return Ok(Vec::new());
        }

        let post_ids: Vec<Uuid> = posts.iter().map(|post| post.post_id).collect();
        let likes = sqlx::query_as::<_, PostLikeRow>(
            "
            SELECT pl.post_id, pl.user_id, u.username
            FROM post_likes pl
            JOIN users u ON u.user_id = pl.user_id
            WHERE pl.post_id = ANY($1)
            ORDER BY pl.created_at
            ",
        )
        .bind(post_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(likes)
    }

    // ==== comments ====

    pub async fn add_comment(
        &self,
        post_id: Id<PostMarker>,
        author: Id<UserMarker>,
        text: &CommentText,
    ) -> Result<Comment> {
        let post_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM posts WHERE post_id = $1)")
                .bind(post_id.uuid())
                .fetch_one(&self.pool)
                .await?;
        if !post_exists {
            return Err(DbError::PostNotFound(post_id));
        }

        let comment_id = Id::<CommentMarker>::random();
        let row = sqlx::query_as::<_, CommentRow>(
            "
            INSERT INTO comments (comment_id, post_id, user_id, body)
            VALUES ($1, $2, $3, $4)
            RETURNING comment_id, user_id,
                      (SELECT username FROM users WHERE user_id = $3) AS username,
                      body, created_at
            ",
        )
        .bind(comment_id.uuid())
        .bind(post_id.uuid())
        .bind(author.uuid())
        .bind(text.get())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_into()?)
    }

    /// A post's comments, newest first, annotated with the viewer's delete
    /// permissions. `None` when the post is absent.
    pub async fn fetch_comments(
        &self,
        post_id: Id<PostMarker>,
        viewer: Id<UserMarker>,
    ) -> Result<Option<Vec<CommentWithPermissions>>> {
        let Some(post_author) =
            sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM posts WHERE post_id = $1")
                .bind(post_id.uuid())
                .fetch_optional(&self.pool)
                .await?
        else {
            return Ok(None);
        };

        let rows = sqlx::query_as::<_, CommentRow>(
            "
            SELECT c.comment_id, c.user_id, u.username, c.body, c.created_at
            FROM comments c
            JOIN users u ON u.user_id = c.user_id
            WHERE c.post_id = $1
            ORDER BY c.created_at DESC
            ",
        )
        .bind(post_id.uuid())
        .fetch_all(&self.pool)
        .await?;

        let post_owner = post_author == viewer.uuid();
        let comments = rows
            .into_iter()
            .map(|row| {
                let is_owner = row.user_id == viewer.uuid();
                Ok::<_, ModelValidationError>(CommentWithPermissions {
                    comment: row.try_into()?,
                    is_owner,
                    post_owner,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(comments))
    }

    /// Delete by the comment author or by the owner of the commented post.
    pub async fn delete_comment(
        &self,
        comment_id: Id<CommentMarker>,
        actor: Id<UserMarker>,
    ) -> Result<()> {
        let owners = sqlx::query_as::<_, CommentOwnersRow>(
            "
            SELECT c.user_id AS comment_author, p.user_id AS post_author
            FROM comments c
            JOIN posts p ON p.post_id = c.post_id
            WHERE c.comment_id = $1
            ",
        )
        .bind(comment_id.uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DbError::CommentNotFound(comment_id))?;

        if owners.comment_author != actor.uuid() && owners.post_author != actor.uuid() {
            return Err(DbError::CommentNotDeletable);
        }

        sqlx::query("DELETE FROM comments WHERE comment_id = $1")
            .bind(comment_id.uuid())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // ==== stories ====

    pub async fn create_story(&self, author: Id<UserMarker>, image_url: &str) -> Result<Story> {
        let story_id = Id::<StoryMarker>::random();
        let created_at = UtcDateTime::now();
        let expires_at = created_at + STORY_TTL;

        let row = sqlx::query_as::<_, StoryRow>(
            "
            INSERT INTO stories (story_id, user_id, image_url, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING story_id, user_id,
                      (SELECT username FROM users WHERE user_id = $2) AS username,
                      (SELECT profile_photo FROM users WHERE user_id = $2) AS profile_photo,
                      image_url, created_at, expires_at
            ",
        )
        .bind(story_id.uuid())
        .bind(author.uuid())
        .bind(image_url)
        .bind(OffsetDateTime::from(created_at))
        .bind(OffsetDateTime::from(expires_at))
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_into()?)
    }

    /// Active stories of the viewer and everyone they follow, grouped per
    /// owner. Groups are ordered by their newest story; stories within a group
    /// are newest first.
    pub async fn fetch_story_feed(&self, viewer: Id<UserMarker>) -> Result<Vec<StoryGroup>> {
        let rows = sqlx::query_as::<_, StoryRow>(
            "
            SELECT s.story_id, s.user_id, u.username, u.profile_photo,
                   s.image_url, s.created_at, s.expires_at
            FROM stories s
            JOIN users u ON u.user_id = s.user_id
            WHERE s.expires_at > now()
              AND s.user_id IN (
                  SELECT followee_id FROM follows WHERE follower_id = $1
                  UNION
                  SELECT $1::uuid
              )
            ORDER BY s.created_at DESC
            ",
        )
        .bind(viewer.uuid())
        .fetch_all(&self.pool)
        .await?;

        Ok(group_story_feed(rows)?)
    }

    /// One user's active stories, newest first.
    pub async fn fetch_user_stories(&self, user_id: Id<UserMarker>) -> Result<Vec<Story>> {
        let rows = sqlx::query_as::<_, StoryRow>(
            "
            SELECT s.story_id, s.user_id, u.username, u.profile_photo,
                   s.image_url, s.created_at, s.expires_at
            FROM stories s
            JOIN users u ON u.user_id = s.user_id
            WHERE s.user_id = $1 AND s.expires_at > now()
            ORDER BY s.created_at DESC
            ",
        )
        .bind(user_id.uuid())
        .fetch_all(&self.pool)
        .await?;

        let stories = rows
            .into_iter()
            .map(Story::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(stories)
    }

    pub async fn delete_story(
        &self,
        story_id: Id<StoryMarker>,
        actor: Id<UserMarker>,
    ) -> Result<()> {
        let author =
            sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM stories WHERE story_id = $1")
                .bind(story_id.uuid())
                .fetch_optional(&self.pool)
                .await?
                .ok_or(DbError::StoryNotFound(story_id))?;
        if author != actor.uuid() {
            return Err(DbError::NotStoryOwner);
        }

        sqlx::query("DELETE FROM stories WHERE story_id = $1")
            .bind(story_id.uuid())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Hard-deletes stories past their expiry. Reads already filter on
    /// `expires_at`, so this only reclaims space.
    pub async fn delete_expired_stories(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM stories WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    // ==== suggestions & search ====

    /// Accounts the viewer does not follow yet, newest first.
    pub async fn fetch_suggestions(&self, viewer: Id<UserMarker>) -> Result<Vec<UserCard>> {
        let rows = sqlx::query_as::<_, UserCardRow>(
            "
            SELECT user_id, username, profile_photo
            FROM users
            WHERE user_id <> $1
              AND NOT EXISTS (
                  SELECT 1 FROM follows f
                  WHERE f.follower_id = $1 AND f.followee_id = users.user_id
              )
            ORDER BY created_at DESC
            LIMIT $2
            ",
        )
        .bind(viewer.uuid())
        .bind(SUGGESTION_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        let suggestions = rows
            .into_iter()
            .map(UserCard::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(suggestions)
    }

    /// Case-insensitive substring match on usernames. A blank query returns
    /// nothing rather than everything.
    pub async fn search_users(
        &self,
        viewer: Id<UserMarker>,
        query: &str,
    ) -> Result<Vec<SearchedUser>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let pattern = format!("%{}%", escape_like(query));
        let rows = sqlx::query_as::<_, SearchedUserRow>(
            "
            SELECT u.user_id, u.username, u.email,
                   EXISTS (
                       SELECT 1 FROM follows f
                       WHERE f.follower_id = $1 AND f.followee_id = u.user_id
                   ) AS is_following
            FROM users u
            WHERE u.user_id <> $1 AND u.username ILIKE $2
            ORDER BY u.username
            LIMIT $3
            ",
        )
        .bind(viewer.uuid())
        .bind(pattern)
        .bind(SEARCH_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        let users = rows
            .into_iter()
            .map(SearchedUser::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    // ==== highlights ====

    /// Pins a selection of the caller's stories under a title. Story ids not
    /// owned by the caller (and duplicates) are dropped; the cover is the
    /// explicit override or the first kept story's image, frozen from then on.
    pub async fn create_highlight(
        &self,
        author: Id<UserMarker>,
        title: &HighlightTitle,
        story_ids: &[Id<StoryMarker>],
        cover_override: Option<&str>,
    ) -> Result<HighlightSummary> {
        let ids: Vec<Uuid> = story_ids.iter().map(|id| id.uuid()).collect();
        let owned = sqlx::query_as::<_, StoryItemRow>(
            "
            SELECT story_id, image_url, created_at
            FROM stories
            WHERE user_id = $1 AND story_id = ANY($2)
            ",
        )
        .bind(author.uuid())
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let by_id: HashMap<Uuid, StoryItemRow> = owned
            .into_iter()
            .map(|row| (row.story_id, row))
            .collect();

        let mut seen = HashSet::new();
        let selected: Vec<&StoryItemRow> = story_ids
            .iter()
            .filter(|id| seen.insert(id.uuid()))
            .filter_map(|id| by_id.get(&id.uuid()))
            .collect();

        let Some(first) = selected.first() else {
            return Err(DbError::NoOwnedStories);
        };
        let cover_image = cover_override.map_or_else(|| first.image_url.clone(), str::to_owned);
        let highlight_id = Id::<HighlightMarker>::random();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "
            INSERT INTO highlights (highlight_id, user_id, title, cover_image)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(highlight_id.uuid())
        .bind(author.uuid())
        .bind(title.get())
        .bind(&cover_image)
        .execute(&mut *tx)
        .await?;

        for (position, row) in (0_i32..).zip(selected.iter()) {
            sqlx::query(
                "
                INSERT INTO highlight_stories (highlight_id, story_id, position)
                VALUES ($1, $2, $3)
                ",
            )
            .bind(highlight_id.uuid())
            .bind(row.story_id)
            .bind(position)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(HighlightSummary {
            id: highlight_id,
            title: title.clone(),
            cover_image: Some(cover_image),
            stories_count: selected.len(),
        })
    }

    /// One user's highlight tiles, newest first. When a stored cover is
    /// missing the first still-existing referenced story fills in.
    pub async fn fetch_user_highlights(
        &self,
        user_id: Id<UserMarker>,
    ) -> Result<Vec<HighlightSummary>> {
        let rows = sqlx::query_as::<_, HighlightSummaryRow>(
            "
            SELECT h.highlight_id, h.title,
                   COALESCE(h.cover_image, first_story.image_url) AS cover_image,
                   (
                       SELECT count(*) FROM highlight_stories hs
                       WHERE hs.highlight_id = h.highlight_id
                   ) AS stories_count
            FROM highlights h
            LEFT JOIN LATERAL (
                SELECT s.image_url
                FROM highlight_stories hs
                JOIN stories s ON s.story_id = hs.story_id
                WHERE hs.highlight_id = h.highlight_id
                ORDER BY hs.position
                LIMIT 1
            ) first_story ON TRUE
            WHERE h.user_id = $1
            ORDER BY h.created_at DESC
            ",
        )
        .bind(user_id.uuid())
        .fetch_all(&self.pool)
        .await?;

        let highlights = rows
            .into_iter()
            .map(HighlightSummary::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(highlights)
    }

    /// An opened highlight with its stories in pinned order. References whose
    /// story has since been deleted drop out silently.
    pub async fn fetch_highlight(
        &self,
        highlight_id: Id<HighlightMarker>,
    ) -> Result<Option<Highlight>> {
        let Some(head) = sqlx::query_as::<_, HighlightHeadRow>(
            "
            SELECT h.highlight_id, h.title, u.user_id, u.username, u.profile_photo
            FROM highlights h
            JOIN users u ON u.user_id = h.user_id
            WHERE h.highlight_id = $1
            ",
        )
        .bind(highlight_id.uuid())
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let stories = sqlx::query_as::<_, StoryItemRow>(
            "
            SELECT s.story_id, s.image_url, s.created_at
            FROM highlight_stories hs
            JOIN stories s ON s.story_id = hs.story_id
            WHERE hs.highlight_id = $1
            ORDER BY hs.position
            ",
        )
        .bind(highlight_id.uuid())
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(Highlight {
            id: head.highlight_id.into(),
            title: HighlightTitle::new(head.title).map_err(ModelValidationError::from)?,
            user: UserCard {
                id: head.user_id.into(),
                username: Username::new(head.username).map_err(ModelValidationError::from)?,
                profile_photo: head.profile_photo,
            },
            stories: stories.into_iter().map(Into::into).collect(),
        }))
    }

    pub async fn delete_highlight(
        &self,
        highlight_id: Id<HighlightMarker>,
        actor: Id<UserMarker>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let author = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM highlights WHERE highlight_id = $1",
        )
        .bind(highlight_id.uuid())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DbError::HighlightNotFound(highlight_id))?;
        if author != actor.uuid() {
            return Err(DbError::NotHighlightOwner);
        }

        sqlx::query("DELETE FROM highlight_stories WHERE highlight_id = $1")
            .bind(highlight_id.uuid())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM highlights WHERE highlight_id = $1")
            .bind(highlight_id.uuid())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

fn on_unique_violation(err: sqlx::Error, conflict: DbError) -> DbError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => conflict,
        _ => DbError::Sqlx(err),
    }
}

/// Joins one post row with its like rows and annotates it for `viewer`.
fn assemble_post(
    row: PostRow,
    likes: Vec<PostLikeRow>,
    viewer: Id<UserMarker>,
) -> Result<Post, ModelValidationError> {
    let is_liked = likes.iter().any(|like| like.user_id == viewer.uuid());
    let likes = likes
        .into_iter()
        .map(|like| {
            Ok::<_, ModelValidationError>(UserSummary {
                id: like.user_id.into(),
                username: Username::new(like.username)?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Post {
        id: row.post_id.into(),
        user: UserSummary {
            id: row.author_id.into(),
            username: Username::new(row.author_username)?,
        },
        image_url: row.image_url,
        caption: Caption::new(row.caption)?,
        likes_count: likes.len(),
        is_liked,
        likes,
        created_at: row.created_at.to_utc(),
    })
}

/// [`assemble_post`] over a whole result page, preserving post order.
fn assemble_posts(
    rows: Vec<PostRow>,
    likes: Vec<PostLikeRow>,
    viewer: Id<UserMarker>,
) -> Result<Vec<Post>, ModelValidationError> {
    let mut likes_by_post: HashMap<Uuid, Vec<PostLikeRow>> = HashMap::new();
    for like in likes {
        likes_by_post.entry(like.post_id).or_default().push(like);
    }

    rows.into_iter()
        .map(|row| {
            let likes = likes_by_post.remove(&row.post_id).unwrap_or_default();
            assemble_post(row, likes, viewer)
        })
        .collect()
}

/// Collapses a newest-first story row list into per-user groups. The first
/// row of a user both creates the group and fixes the group's position, so
/// groups come out ordered by their newest story.
fn group_story_feed(rows: Vec<StoryRow>) -> Result<Vec<StoryGroup>, ModelValidationError> {
    let mut order: Vec<Uuid> = Vec::new();
    let mut groups: HashMap<Uuid, StoryGroup> = HashMap::new();

    for row in rows {
        let item = StoryItemRow {
            story_id: row.story_id,
            image_url: row.image_url,
            created_at: row.created_at,
        };

        if let Some(group) = groups.get_mut(&row.user_id) {
            group.stories.push(item.into());
        } else {
            order.push(row.user_id);
            groups.insert(
                row.user_id,
                StoryGroup {
                    user: UserCard {
                        id: row.user_id.into(),
                        username: Username::new(row.username)?,
                        profile_photo: row.profile_photo,
                    },
                    stories: vec![item.into()],
                },
            );
        }
    }

    Ok(order
        .into_iter()
        .filter_map(|user_id| groups.remove(&user_id))
        .collect())
}

/// Escapes `%`, `_` and `\` so user input matches literally under `ILIKE`.
fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn at(hours: i64) -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH + Duration::hours(hours)
    }

    fn post_row(post_id: Uuid, author_id: Uuid, hours: i64) -> PostRow {
        PostRow {
            post_id,
            image_url: "https://img.example/p.jpg".to_owned(),
            caption: "caption".to_owned(),
            created_at: at(hours),
            author_id,
            author_username: "bob".to_owned(),
        }
    }

    fn story_row(story_id: Uuid, user_id: Uuid, username: &str, hours: i64) -> StoryRow {
        StoryRow {
            story_id,
            user_id,
            username: username.to_owned(),
            profile_photo: None,
            image_url: "https://img.example/s.jpg".to_owned(),
            created_at: at(hours),
            expires_at: at(hours + 24),
        }
    }

    #[test]
    fn assemble_posts_annotates_viewer_likes() {
        let viewer = Uuid::from_u128(1);
        let other = Uuid::from_u128(2);
        let author = Uuid::from_u128(3);
        let liked_post = Uuid::from_u128(10);
        let unliked_post = Uuid::from_u128(11);

        let rows = vec![
            post_row(liked_post, author, 2),
            post_row(unliked_post, author, 1),
        ];
        let likes = vec![
            PostLikeRow {
                post_id: liked_post,
                user_id: viewer,
                username: "alice".to_owned(),
            },
            PostLikeRow {
                post_id: liked_post,
                user_id: other,
                username: "carol".to_owned(),
            },
        ];

        let posts = assemble_posts(rows, likes, viewer.into()).unwrap();

        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].likes_count, 2);
        assert!(posts[0].is_liked);
        assert_eq!(posts[0].likes.len(), 2);
        assert_eq!(posts[1].likes_count, 0);
        assert!(!posts[1].is_liked);
        assert!(posts[1].likes.is_empty());
    }

    #[test]
    fn assemble_posts_preserves_row_order() {
        let author = Uuid::from_u128(3);
        let newer = Uuid::from_u128(10);
        let older = Uuid::from_u128(11);

        let posts = assemble_posts(
            vec![post_row(newer, author, 5), post_row(older, author, 1)],
            Vec::new(),
            Uuid::from_u128(1).into(),
        )
        .unwrap();

        assert_eq!(Uuid::from(posts[0].id), newer);
        assert_eq!(Uuid::from(posts[1].id), older);
    }

    #[test]
    fn story_feed_groups_by_owner_newest_first() {
        let alice = Uuid::from_u128(1);
        let bob = Uuid::from_u128(2);

        // newest first, as the query returns them
        let rows = vec![
            story_row(Uuid::from_u128(30), bob, "bob", 12),
            story_row(Uuid::from_u128(31), alice, "alice", 11),
            story_row(Uuid::from_u128(32), bob, "bob", 10),
        ];

        let groups = group_story_feed(rows).unwrap();

        assert_eq!(groups.len(), 2);
        // bob owns the newest story overall, so his group leads
        assert_eq!(Uuid::from(groups[0].user.id), bob);
        assert_eq!(groups[0].stories.len(), 2);
        assert_eq!(Uuid::from(groups[0].stories[0].id), Uuid::from_u128(30));
        assert_eq!(Uuid::from(groups[0].stories[1].id), Uuid::from_u128(32));
        assert_eq!(Uuid::from(groups[1].user.id), alice);
        assert_eq!(groups[1].stories.len(), 1);
    }

    #[test]
    fn story_feed_empty_rows_yield_no_groups() {
        assert!(group_story_feed(Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn like_pattern_escaping() {
        assert_eq!(escape_like("alice"), "alice");
        assert_eq!(escape_like("100%_done"), "100\\%\\_done");
        assert_eq!(escape_like("back\\slash"), "back\\\\slash");
    }
}
