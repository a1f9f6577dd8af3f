use crate::server::{Result, ServerRouter, auth::AuthenticatedUser, json::Json};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use fotowand_common::model::post::Post;
use fotowand_db::client::DbClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_get(get_feed)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/feed")]
struct GetFeedPath();

#[derive(Clone, Debug, Serialize)]
struct FeedResponse {
    posts: Vec<Post>,
}

/// Posts by everyone the caller follows, newest first, capped at 50. An empty
/// following set yields an empty feed.
async fn get_feed(
    GetFeedPath(): GetFeedPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<FeedResponse>> {
    let posts = db.fetch_feed(user.user_id()).await?;

    Ok(Json(FeedResponse { posts }))
}
