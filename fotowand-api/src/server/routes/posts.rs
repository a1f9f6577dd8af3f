use crate::server::{
    Result, ServerError, ServerRouter, auth::AuthenticatedUser, json::Json,
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use fotowand_common::model::{
    Id,
    comment::{Comment, CommentMarker, CommentText, CommentWithPermissions},
    post::{Caption, Post, PostMarker, PostWithOwnership},
    user::UserMarker,
};
use fotowand_db::client::DbClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(create_post)
        .typed_get(get_user_posts)
        .typed_delete(delete_comment)
        .typed_get(get_comments)
        .typed_put(update_caption)
        .typed_post(like_post)
        .typed_post(unlike_post)
        .typed_post(add_comment)
        .typed_get(get_post)
        .typed_delete(delete_post)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/posts", rejection(ServerError))]
struct CreatePostPath();

#[derive(Clone, Debug, Deserialize)]
struct CreatePostRequest {
    image_url: String,
    #[serde(default)]
    caption: Caption,
}

async fn create_post(
    CreatePostPath(): CreatePostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(request): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>)> {
    if request.image_url.trim().is_empty() {
        return Err(ServerError::MissingImageUrl);
    }

    let post = db
        .create_post(user.user_id(), &request.image_url, &request.caption)
        .await?;

    Ok((StatusCode::CREATED, Json(post)))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/posts/{id}", rejection(ServerError))]
struct GetPostPath {
    id: Id<PostMarker>,
}

async fn get_post(
    GetPostPath { id }: GetPostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<PostWithOwnership>> {
    let post = db
        .fetch_post(id, user.user_id())
        .await?
        .ok_or(ServerError::PostNotFound(id))?;

    Ok(Json(post))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/posts/user/{id}", rejection(ServerError))]
struct GetUserPostsPath {
    id: Id<UserMarker>,
}

#[derive(Clone, Debug, Serialize)]
struct UserPostsResponse {
    posts: Vec<Post>,
}

async fn get_user_posts(
    GetUserPostsPath { id }: GetUserPostsPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<UserPostsResponse>> {
    let posts = db
        .fetch_user_posts(id, user.user_id())
        .await?
        .ok_or(ServerError::UserNotFound(id))?;

    Ok(Json(UserPostsResponse { posts }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/posts/{id}/caption", rejection(ServerError))]
struct UpdateCaptionPath {
    id: Id<PostMarker>,
}

#[derive(Clone, Debug, Deserialize)]
struct UpdateCaptionRequest {
    caption: Caption,
}

async fn update_caption(
    UpdateCaptionPath { id }: UpdateCaptionPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(request): Json<UpdateCaptionRequest>,
) -> Result<Json<PostWithOwnership>> {
    let post = db
        .update_caption(id, user.user_id(), &request.caption)
        .await?;

    Ok(Json(post))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/posts/{id}", rejection(ServerError))]
struct DeletePostPath {
    id: Id<PostMarker>,
}

async fn delete_post(
    DeletePostPath { id }: DeletePostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    db.delete_post(id, user.user_id()).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/posts/{id}/like", rejection(ServerError))]
struct LikePostPath {
    id: Id<PostMarker>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize)]
struct LikeCountResponse {
    likes_count: usize,
}

async fn like_post(
    LikePostPath { id }: LikePostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<LikeCountResponse>> {
    let likes_count = db.like_post(id, user.user_id()).await?;

    Ok(Json(LikeCountResponse { likes_count }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/posts/{id}/unlike", rejection(ServerError))]
struct UnlikePostPath {
    id: Id<PostMarker>,
}

async fn unlike_post(
    UnlikePostPath { id }: UnlikePostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<LikeCountResponse>> {
    let likes_count = db.unlike_post(id, user.user_id()).await?;

    Ok(Json(LikeCountResponse { likes_count }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/posts/{id}/comment", rejection(ServerError))]
struct AddCommentPath {
    id: Id<PostMarker>,
}

#[derive(Clone, Debug, Deserialize)]
struct AddCommentRequest {
    text: CommentText,
}

async fn add_comment(
    AddCommentPath { id }: AddCommentPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(request): Json<AddCommentRequest>,
) -> Result<(StatusCode, Json<Comment>)> {
    let comment = db.add_comment(id, user.user_id(), &request.text).await?;

    Ok((StatusCode::CREATED, Json(comment)))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/posts/{id}/comments", rejection(ServerError))]
struct GetCommentsPath {
    id: Id<PostMarker>,
}

#[derive(Clone, Debug, Serialize)]
struct CommentsResponse {
    comments: Vec<CommentWithPermissions>,
}

async fn get_comments(
    GetCommentsPath { id }: GetCommentsPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<CommentsResponse>> {
    let comments = db
        .fetch_comments(id, user.user_id())
        .await?
        .ok_or(ServerError::PostNotFound(id))?;

    Ok(Json(CommentsResponse { comments }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/posts/comments/{id}", rejection(ServerError))]
struct DeleteCommentPath {
    id: Id<CommentMarker>,
}

async fn delete_comment(
    DeleteCommentPath { id }: DeleteCommentPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    db.delete_comment(id, user.user_id()).await?;

    Ok(StatusCode::NO_CONTENT)
}
