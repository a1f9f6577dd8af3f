use crate::server::{
    Result, ServerError, ServerRouter, auth::AuthenticatedUser, json::Json,
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use fotowand_common::model::{
    Id,
    story::{Story, StoryGroup, StoryMarker},
    user::UserMarker,
};
use fotowand_db::client::DbClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(create_story)
        .typed_get(get_story_feed)
        .typed_get(get_user_stories)
        .typed_delete(delete_story)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/stories", rejection(ServerError))]
struct CreateStoryPath();

#[derive(Clone, Debug, Deserialize)]
struct CreateStoryRequest {
    image_url: String,
}

async fn create_story(
    CreateStoryPath(): CreateStoryPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(request): Json<CreateStoryRequest>,
) -> Result<(StatusCode, Json<Story>)> {
    if request.image_url.trim().is_empty() {
        return Err(ServerError::MissingImageUrl);
    }

    let story = db.create_story(user.user_id(), &request.image_url).await?;

    Ok((StatusCode::CREATED, Json(story)))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/stories")]
struct GetStoryFeedPath();

#[derive(Clone, Debug, Serialize)]
struct StoryFeedResponse {
    stories: Vec<StoryGroup>,
}

/// Active stories of the caller and everyone they follow, one group per
/// contributing user.
async fn get_story_feed(
    GetStoryFeedPath(): GetStoryFeedPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<StoryFeedResponse>> {
    let stories = db.fetch_story_feed(user.user_id()).await?;

    Ok(Json(StoryFeedResponse { stories }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/stories/user/{id}", rejection(ServerError))]
struct GetUserStoriesPath {
    id: Id<UserMarker>,
}

#[derive(Clone, Debug, Serialize)]
struct UserStoriesResponse {
    stories: Vec<Story>,
}

async fn get_user_stories(
    GetUserStoriesPath { id }: GetUserStoriesPath,
    State(db): State<Arc<DbClient>>,
    _user: AuthenticatedUser,
) -> Result<Json<UserStoriesResponse>> {
    let stories = db.fetch_user_stories(id).await?;

    Ok(Json(UserStoriesResponse { stories }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/stories/{id}", rejection(ServerError))]
struct DeleteStoryPath {
    id: Id<StoryMarker>,
}

async fn delete_story(
    DeleteStoryPath { id }: DeleteStoryPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    db.delete_story(id, user.user_id()).await?;

    Ok(StatusCode::NO_CONTENT)
}
