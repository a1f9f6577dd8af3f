use crate::server::{
    Result, ServerError, ServerRouter, auth::AuthenticatedUser, json::Json,
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use fotowand_common::model::{
    Id,
    user::{Bio, Profile, User, UserMarker, Username},
};
use fotowand_db::client::DbClient;
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_profile)
        .typed_put(update_profile)
        .typed_post(follow_user)
        .typed_post(unfollow_user)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/users/{id}", rejection(ServerError))]
struct GetProfilePath {
    id: Id<UserMarker>,
}

async fn get_profile(
    GetProfilePath { id }: GetProfilePath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<Profile>> {
    let profile = db
        .fetch_profile(id, user.user_id())
        .await?
        .ok_or(ServerError::UserNotFound(id))?;

    Ok(Json(profile))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/users/profile", rejection(ServerError))]
struct UpdateProfilePath();

#[derive(Clone, Debug, Deserialize)]
struct UpdateProfileRequest {
    username: Option<Username>,
    bio: Option<Bio>,
    profile_photo: Option<String>,
}

async fn update_profile(
    UpdateProfilePath(): UpdateProfilePath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<User>> {
    let updated = db
        .update_profile(
            user.user_id(),
            request.username.as_ref(),
            request.bio.as_ref(),
            request.profile_photo.as_deref(),
        )
        .await?;

    Ok(Json(updated))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/users/{id}/follow", rejection(ServerError))]
struct FollowUserPath {
    id: Id<UserMarker>,
}

async fn follow_user(
    FollowUserPath { id }: FollowUserPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    db.follow(user.user_id(), id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/users/{id}/unfollow", rejection(ServerError))]
struct UnfollowUserPath {
    id: Id<UserMarker>,
}

async fn unfollow_user(
    UnfollowUserPath { id }: UnfollowUserPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    db.unfollow(user.user_id(), id).await?;

    Ok(StatusCode::NO_CONTENT)
}
