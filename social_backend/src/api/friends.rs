use super::{ApiResult, AppState, MessageResponse};
use crate::responses::{FriendRequestResponse, Responses};
use axum::extract::{Path, State};
use axum::http::HeaderMap;

pub(crate) async fn list_friends(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Vec<String>> {
    state.run_as(&headers, |app, user| {
        Responses::new(&app.users).usernames(&app.friends_of(user)?)
    })
}

pub(crate) async fn remove_friend(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(friend): Path<String>,
) -> ApiResult<MessageResponse> {
    state.run_as(&headers, |app, user| {
        app.remove_friend(user, &friend).map(MessageResponse::new)
    })
}

pub(crate) async fn list_requests(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Vec<FriendRequestResponse>> {
    state.run_as(&headers, |app, user| {
        Responses::new(&app.users).friend_requests(app.friend_requests(user)?)
    })
}

pub(crate) async fn send_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(to): Path<String>,
) -> ApiResult<MessageResponse> {
    state.run_as(&headers, |app, user| {
        app.send_friend_request(user, &to).map(MessageResponse::new)
    })
}

pub(crate) async fn remove_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(to): Path<String>,
) -> ApiResult<MessageResponse> {
    state.run_as(&headers, |app, user| {
        app.remove_friend_request(user, &to).map(MessageResponse::new)
    })
}

pub(crate) async fn accept_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(from): Path<String>,
) -> ApiResult<MessageResponse> {
    state.run_as(&headers, |app, user| {
        app.accept_friend_request(user, &from).map(MessageResponse::new)
    })
}

pub(crate) async fn reject_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(from): Path<String>,
) -> ApiResult<MessageResponse> {
    state.run_as(&headers, |app, user| {
        app.reject_friend_request(user, &from).map(MessageResponse::new)
    })
}
