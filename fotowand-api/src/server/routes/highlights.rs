use crate::server::{
    Result, ServerError, ServerRouter, auth::AuthenticatedUser, json::Json,
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use fotowand_common::model::{
    Id,
    highlight::{Highlight, HighlightMarker, HighlightSummary, HighlightTitle},
    story::StoryMarker,
    user::UserMarker,
};
use fotowand_db::client::DbClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(create_highlight)
        .typed_get(get_user_highlights)
        .typed_get(get_highlight)
        .typed_delete(delete_highlight)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/highlights", rejection(ServerError))]
struct CreateHighlightPath();

#[derive(Clone, Debug, Deserialize)]
struct CreateHighlightRequest {
    title: HighlightTitle,
    story_ids: Vec<Id<StoryMarker>>,
    cover_image: Option<String>,
}

async fn create_highlight(
    CreateHighlightPath(): CreateHighlightPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(request): Json<CreateHighlightRequest>,
) -> Result<(StatusCode, Json<HighlightSummary>)> {
    let highlight = db
        .create_highlight(
            user.user_id(),
            &request.title,
            &request.story_ids,
            request.cover_image.as_deref(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(highlight)))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/highlights/user/{id}", rejection(ServerError))]
struct GetUserHighlightsPath {
    id: Id<UserMarker>,
}

#[derive(Clone, Debug, Serialize)]
struct HighlightsResponse {
    highlights: Vec<HighlightSummary>,
}

async fn get_user_highlights(
    GetUserHighlightsPath { id }: GetUserHighlightsPath,
    State(db): State<Arc<DbClient>>,
    _user: AuthenticatedUser,
) -> Result<Json<HighlightsResponse>> {
    let highlights = db.fetch_user_highlights(id).await?;

    Ok(Json(HighlightsResponse { highlights }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/highlights/{id}", rejection(ServerError))]
struct GetHighlightPath {
    id: Id<HighlightMarker>,
}

async fn get_highlight(
    GetHighlightPath { id }: GetHighlightPath,
    State(db): State<Arc<DbClient>>,
    _user: AuthenticatedUser,
) -> Result<Json<Highlight>> {
    let highlight = db
        .fetch_highlight(id)
        .await?
        .ok_or(ServerError::HighlightNotFound(id))?;

    Ok(Json(highlight))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/highlights/{id}", rejection(ServerError))]
struct DeleteHighlightPath {
    id: Id<HighlightMarker>,
}

async fn delete_highlight(
    DeleteHighlightPath { id }: DeleteHighlightPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    db.delete_highlight(id, user.user_id()).await?;

    Ok(StatusCode::NO_CONTENT)
}
