use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use fotowand_common::model::{
    Id,
    auth::{AuthTokenDecodeError, AuthTokenHashError},
    highlight::HighlightMarker,
    password::PasswordHashingError,
    post::PostMarker,
    user::UserMarker,
};
use fotowand_db::client::{DbClient, DbError};
use json::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

mod auth;
mod json;
mod routes;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, Debug, FromRef)]
pub struct ServerState {
    pub db_client: Arc<DbClient>,
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was missing or invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error("The provided auth token could not be decoded: {0}")]
    InvalidAuthToken(#[from] AuthTokenDecodeError),
    #[error("The auth token could not be hashed: {0}")]
    AuthTokenHash(#[from] AuthTokenHashError),
    #[error("Hashing the password failed")]
    PasswordHash(#[from] PasswordHashingError),
    #[error("Provided token was invalid")]
    InvalidToken,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Image URL is required")]
    MissingImageUrl,
    #[error("User with id {0} was not found.")]
    UserNotFound(Id<UserMarker>),
    #[error("Post with id {0} was not found.")]
    PostNotFound(Id<PostMarker>),
    #[error("Highlight with id {0} was not found.")]
    HighlightNotFound(Id<HighlightMarker>),
    #[error(transparent)]
    Database(#[from] DbError),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::UserNotFound(_)
            | ServerError::PostNotFound(_)
            | ServerError::HighlightNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::InvalidAuthorizationHeader(rejection) if rejection.is_missing() => {
                StatusCode::UNAUTHORIZED
            }
            ServerError::InvalidToken
            | ServerError::InvalidCredentials
            | ServerError::InvalidAuthToken(_) => StatusCode::UNAUTHORIZED,
            ServerError::JsonRejection(_)
            | ServerError::InvalidAuthorizationHeader(_)
            | ServerError::MissingImageUrl => StatusCode::BAD_REQUEST,
            ServerError::JsonResponse(_)
            | ServerError::AuthTokenHash(_)
            | ServerError::PasswordHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Database(err) => db_status(err),
        }
    }
}

fn db_status(err: &DbError) -> StatusCode {
    match err {
        DbError::Data(_) | DbError::Sqlx(_) => StatusCode::INTERNAL_SERVER_ERROR,
        DbError::SelfFollow | DbError::NoOwnedStories => StatusCode::BAD_REQUEST,
        DbError::AlreadyFollowing
        | DbError::NotFollowing
        | DbError::AlreadyLiked
        | DbError::NotLiked
        | DbError::DuplicateUser
        | DbError::UsernameTaken => StatusCode::CONFLICT,
        DbError::UserNotFound(_)
        | DbError::PostNotFound(_)
        | DbError::CommentNotFound(_)
        | DbError::StoryNotFound(_)
        | DbError::HighlightNotFound(_) => StatusCode::NOT_FOUND,
        DbError::NotPostOwner
        | DbError::CommentNotDeletable
        | DbError::NotStoryOwner
        | DbError::NotHighlightOwner => StatusCode::FORBIDDEN,
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
struct ErrorResponse {
    status: u16,
    message: String,
}

impl ServerError {
    /// The message sent to the client. Server-side failures are masked so
    /// internals never leak into a response body.
    fn public_message(&self, status: StatusCode) -> String {
        if status.is_server_error() {
            "Internal server error".to_owned()
        } else {
            self.to_string()
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        let error_response = ErrorResponse {
            status: status.as_u16(),
            message: self.public_message(status),
        };
        (status, Json(error_response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follow_errors_map_to_statuses() {
        assert_eq!(
            ServerError::Database(DbError::SelfFollow).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServerError::Database(DbError::AlreadyFollowing).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServerError::Database(DbError::NotFollowing).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServerError::Database(DbError::UserNotFound(Id::random())).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn ownership_violations_are_forbidden() {
        assert_eq!(
            ServerError::Database(DbError::NotPostOwner).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServerError::Database(DbError::CommentNotDeletable).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServerError::Database(DbError::NotStoryOwner).status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn auth_failures_are_unauthorized() {
        assert_eq!(ServerError::InvalidToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ServerError::InvalidCredentials.status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn conflicts_on_duplicate_unique_fields() {
        assert_eq!(
            ServerError::Database(DbError::DuplicateUser).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServerError::Database(DbError::UsernameTaken).status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn server_errors_mask_internals() {
        let error = ServerError::Database(DbError::Sqlx(sqlx::Error::RowNotFound));
        let status = error.status();

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.public_message(status), "Internal server error");
    }

    #[test]
    fn client_errors_keep_their_message() {
        let error = ServerError::Database(DbError::SelfFollow);
        let message = error.public_message(error.status());

        assert_eq!(message, "You cannot follow yourself");
    }
}
