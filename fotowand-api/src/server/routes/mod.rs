use crate::server::{ServerRouter, json::Json};
use axum::Router;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use time::UtcDateTime;

mod auth;
mod feed;
mod highlights;
mod posts;
mod search;
mod stories;
mod users;

pub fn routes() -> ServerRouter {
    Router::new()
        .merge(auth::routes())
        .merge(feed::routes())
        .merge(highlights::routes())
        .merge(posts::routes())
        .merge(search::routes())
        .merge(stories::routes())
        .merge(users::routes())
        .typed_get(health)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/health")]
struct HealthPath();

#[derive(Clone, Debug, Serialize)]
struct HealthResponse {
    message: &'static str,
    timestamp: UtcDateTime,
}

async fn health(HealthPath(): HealthPath) -> Json<HealthResponse> {
    Json(HealthResponse {
        message: "Server is running",
        timestamp: UtcDateTime::now(),
    })
}
