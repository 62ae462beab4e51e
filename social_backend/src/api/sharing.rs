use super::{ApiResult, AppState, MessageResponse};
use crate::responses::{Responses, SharingResponse};
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct MemberRequest {
    user: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListRequest {
    list: String,
}

pub(crate) async fn list_owned(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(scope): Path<String>,
) -> ApiResult<Vec<SharingResponse>> {
    state.run_as(&headers, |app, user| {
        Responses::new(&app.users).sharing(app.owned_sharing(user, &scope)?)
    })
}

pub(crate) async fn request_access(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<String>,
) -> ApiResult<MessageResponse> {
    state.run_as(&headers, |app, user| {
        app.request_post_access(user, &post_id).map(MessageResponse::new)
    })
}

pub(crate) async fn add_member(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<String>,
    Json(body): Json<MemberRequest>,
) -> ApiResult<MessageResponse> {
    state.run_as(&headers, |app, owner| {
        app.grant_post_access(owner, &post_id, &body.user)
            .map(MessageResponse::new)
    })
}

pub(crate) async fn remove_member(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<String>,
    Json(body): Json<MemberRequest>,
) -> ApiResult<MessageResponse> {
    state.run_as(&headers, |app, owner| {
        app.revoke_post_access(owner, &post_id, &body.user)
            .map(MessageResponse::new)
    })
}

pub(crate) async fn add_list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<String>,
    Json(body): Json<ListRequest>,
) -> ApiResult<MessageResponse> {
    state.run_as(&headers, |app, owner| {
        app.grant_post_list(owner, &post_id, &body.list)
            .map(MessageResponse::new)
    })
}

pub(crate) async fn remove_list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<String>,
    Json(body): Json<ListRequest>,
) -> ApiResult<MessageResponse> {
    state.run_as(&headers, |app, owner| {
        app.revoke_post_list(owner, &post_id, &body.list)
            .map(MessageResponse::new)
    })
}
