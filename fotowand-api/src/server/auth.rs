use crate::server::ServerError;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::TypedHeader;
use fotowand_common::model::{
    Id,
    auth::{AuthToken, SESSION_TTL, Session},
    user::UserMarker,
};
use fotowand_db::client::DbClient;
use headers::{Authorization, authorization::Bearer};
use std::sync::Arc;
use time::UtcDateTime;

type AuthorizationHeader = TypedHeader<Authorization<Bearer>>;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct AuthenticatedUser {
    id: Id<UserMarker>,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn user_id(self) -> Id<UserMarker> {
        self.id
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<DbClient>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let request_token: AuthToken = AuthorizationHeader::from_request_parts(parts, state)
            .await
            .map_err(ServerError::InvalidAuthorizationHeader)?
            .token()
            .parse()?;

        let token_hash = request_token.hash()?;

        let session = Arc::<DbClient>::from_ref(state)
            .fetch_session(&token_hash)
            .await?
            .ok_or(ServerError::InvalidToken)?;

        assert_eq!(session.token_hash, token_hash);

        if session.is_expired(UtcDateTime::now()) {
            return Err(ServerError::InvalidToken);
        }

        Ok(Self { id: session.user })
    }
}

/// Issues a fresh bearer token for `user_id` and persists its hashed session.
pub async fn issue_session(db: &DbClient, user_id: Id<UserMarker>) -> Result<String, ServerError> {
    let token = AuthToken::generate_random(user_id);
    let token_hash = token.hash()?;

    let created_at = UtcDateTime::now();
    let session = Session {
        user: user_id,
        token_hash,
        created_at,
        expires_at: created_at + SESSION_TTL,
    };
    db.create_session(&session).await?;

    Ok(token.as_token_str())
}
