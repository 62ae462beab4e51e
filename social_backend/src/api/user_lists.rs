use super::{ApiResult, AppState, MessageResponse};
use crate::responses::{Responses, UserListResponse};
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(crate) struct CreateListRequest {
    name: String,
    /// Usernames.
    #[serde(default)]
    members: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RenameListRequest {
    name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListMemberRequest {
    user: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreatedList {
    msg: &'static str,
    list: UserListResponse,
}

pub(crate) async fn list_user_lists(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Vec<UserListResponse>> {
    state.run_as(&headers, |app, user| {
        Responses::new(&app.users).lists(app.lists_owned_by(user)?)
    })
}

pub(crate) async fn create_user_list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateListRequest>,
) -> ApiResult<CreatedList> {
    state.run_as(&headers, |app, user| {
        let list = app.create_list(user, &body.name, &body.members)?;
        Ok(CreatedList {
            msg: "List successfully created!",
            list: Responses::new(&app.users).list(list)?,
        })
    })
}

pub(crate) async fn rename_user_list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<RenameListRequest>,
) -> ApiResult<MessageResponse> {
    state.run_as(&headers, |app, user| {
        app.rename_list(user, &id, &body.name).map(MessageResponse::new)
    })
}

pub(crate) async fn delete_user_list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<MessageResponse> {
    state.run_as(&headers, |app, user| {
        app.delete_list(user, &id).map(MessageResponse::new)
    })
}

pub(crate) async fn add_member(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ListMemberRequest>,
) -> ApiResult<MessageResponse> {
    state.run_as(&headers, |app, user| {
        app.add_list_member(user, &id, &body.user)
            .map(MessageResponse::new)
    })
}

pub(crate) async fn remove_member(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ListMemberRequest>,
) -> ApiResult<MessageResponse> {
    state.run_as(&headers, |app, user| {
        app.remove_list_member(user, &id, &body.user)
            .map(MessageResponse::new)
    })
}
