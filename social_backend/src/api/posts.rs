use super::{ApiResult, AppState, MessageResponse};
use crate::app::NewPost;
use crate::responses::{PendingPostResponse, PostResponse, PostStateResponse, Responses};
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(crate) struct ListPostsParams {
    #[serde(default)]
    author: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PostOutcomeResponse {
    msg: &'static str,
    post: PostStateResponse,
}

pub(crate) async fn list_posts(
    State(state): State<AppState>,
    Query(params): Query<ListPostsParams>,
) -> ApiResult<Vec<PostResponse>> {
    state.run(|app| {
        let author = params.author.as_deref().filter(|author| !author.is_empty());
        Responses::new(&app.users).posts(app.list_posts(author)?)
    })
}

pub(crate) async fn list_pending_posts(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Vec<PendingPostResponse>> {
    state.run_as(&headers, |app, user| {
        Responses::new(&app.users).pending_posts(app.pending_posts(user)?)
    })
}

pub(crate) async fn list_accessible_posts(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Vec<PostResponse>> {
    state.run_as(&headers, |app, user| {
        Responses::new(&app.users).posts(app.accessible_posts(user)?)
    })
}

pub(crate) async fn create_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<NewPost>,
) -> ApiResult<PostOutcomeResponse> {
    state.run_as(&headers, |app, user| {
        let outcome = app.create_post(user, body)?;
        Ok(PostOutcomeResponse {
            msg: outcome.msg,
            post: Responses::new(&app.users).post_state(outcome.state)?,
        })
    })
}

pub(crate) async fn approve_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<PostOutcomeResponse> {
    state.run_as(&headers, |app, user| {
        let outcome = app.approve_post(user, &id)?;
        Ok(PostOutcomeResponse {
            msg: outcome.msg,
            post: Responses::new(&app.users).post_state(outcome.state)?,
        })
    })
}

pub(crate) async fn reject_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<MessageResponse> {
    state.run_as(&headers, |app, user| {
        app.reject_post(user, &id).map(MessageResponse::new)
    })
}

pub(crate) async fn delete_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<MessageResponse> {
    tracing::info!(post_id = %id, "delete post requested");
    state.run_as(&headers, |app, user| {
        app.delete_post(user, &id).map(MessageResponse::new)
    })
}
