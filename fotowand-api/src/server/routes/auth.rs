use crate::server::{Result, ServerError, ServerRouter, auth::issue_session, json::Json};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use fotowand_common::model::{
    Id,
    password::{Password, verify_password},
    user::{EmailAddress, User, UserMarker, Username},
};
use fotowand_db::client::DbClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_post(signup).typed_post(login)
}

/// The slice of the account echoed back when a token is issued.
#[derive(Clone, Debug, Serialize)]
struct AccountSummary {
    id: Id<UserMarker>,
    username: Username,
    email: EmailAddress,
}

#[derive(Clone, Debug, Serialize)]
struct AuthResponse {
    token: String,
    user: AccountSummary,
}

impl From<User> for AccountSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
        }
    }
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/auth/signup", rejection(ServerError))]
struct SignupPath();

#[derive(Clone, Deserialize)]
struct SignupRequest {
    username: Username,
    email: EmailAddress,
    password: Password,
}

async fn signup(
    SignupPath(): SignupPath,
    State(db): State<Arc<DbClient>>,
    Json(request): Json<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let password_hash = request.password.hash()?;
    let user = db
        .create_user(&request.username, &request.email, &password_hash)
        .await?;

    let token = issue_session(&db, user.id).await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: user.into(),
        }),
    ))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/auth/login", rejection(ServerError))]
struct LoginPath();

#[derive(Clone, Deserialize)]
struct LoginRequest {
    email: EmailAddress,
    password: String,
}

async fn login(
    LoginPath(): LoginPath,
    State(db): State<Arc<DbClient>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    // An unknown email and a wrong password are indistinguishable to the caller.
    let credentials = db
        .fetch_credentials(&request.email)
        .await?
        .ok_or(ServerError::InvalidCredentials)?;

    if !verify_password(&request.password, &credentials.password_hash)? {
        return Err(ServerError::InvalidCredentials);
    }

    let user = db
        .fetch_user(credentials.user_id)
        .await?
        .ok_or(ServerError::InvalidCredentials)?;

    let token = issue_session(&db, user.id).await?;

    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}
