use crate::server::{Result, ServerRouter, auth::AuthenticatedUser, json::Json};
use axum::extract::{Query, State};
use axum_extra::routing::{RouterExt, TypedPath};
use fotowand_common::model::user::{SearchedUser, UserCard};
use fotowand_db::client::DbClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(search_users)
        .typed_get(get_suggestions)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/search/users")]
struct SearchUsersPath();

#[derive(Clone, Debug, Default, Deserialize)]
struct SearchParams {
    #[serde(default)]
    query: String,
}

#[derive(Clone, Debug, Serialize)]
struct SearchResponse {
    users: Vec<SearchedUser>,
}

/// Case-insensitive substring search on usernames. A blank query yields an
/// empty result set, not all users.
async fn search_users(
    SearchUsersPath(): SearchUsersPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>> {
    let users = db.search_users(user.user_id(), &params.query).await?;

    Ok(Json(SearchResponse { users }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/search/suggestions")]
struct GetSuggestionsPath();

#[derive(Clone, Debug, Serialize)]
struct SuggestionsResponse {
    users: Vec<UserCard>,
}

/// Up to ten accounts the caller does not follow yet, newest first.
async fn get_suggestions(
    GetSuggestionsPath(): GetSuggestionsPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<SuggestionsResponse>> {
    let users = db.fetch_suggestions(user.user_id()).await?;

    Ok(Json(SuggestionsResponse { users }))
}
