use super::{ApiError, ApiResult, AppState, MessageResponse};
use crate::identity::{UserUpdate, UserView};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderName};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(crate) struct Credentials {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct UserResponse {
    msg: &'static str,
    user: UserView,
}

type CookieResponse<T> = Result<([(HeaderName, String); 1], Json<T>), ApiError>;

pub(crate) async fn get_session_user(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<UserView> {
    state.run_as(&headers, |app, user| app.users.get_by_id(user))
}

pub(crate) async fn list_users(State(state): State<AppState>) -> ApiResult<Vec<UserView>> {
    state.run(|app| app.users.list())
}

pub(crate) async fn get_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<UserView> {
    state.run(|app| app.users.get_by_username(&username))
}

pub(crate) async fn create_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Credentials>,
) -> ApiResult<UserResponse> {
    let token = state.session_token(&headers);
    state.run(|app| {
        let user = app.register(token.as_deref(), &body.username, &body.password)?;
        Ok(UserResponse {
            msg: "Created user successfully!",
            user,
        })
    })
}

pub(crate) async fn update_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(update): Json<UserUpdate>,
) -> ApiResult<UserResponse> {
    state.run_as(&headers, |app, user| {
        let user = app.update_user(user, update)?;
        Ok(UserResponse {
            msg: "Updated user successfully!",
            user,
        })
    })
}

pub(crate) async fn delete_user(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> CookieResponse<MessageResponse> {
    let body = state.run_as(&headers, |app, user| {
        app.delete_user(user)?;
        Ok(MessageResponse::new("Deleted user!"))
    })?;
    Ok((state.clear_session_cookie(), body))
}

pub(crate) async fn log_in(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Credentials>,
) -> CookieResponse<MessageResponse> {
    let existing = state.session_token(&headers);
    let Json(token) = state.run(|app| app.login(existing.as_deref(), &body.username, &body.password))?;
    Ok((state.session_cookie(&token), Json(MessageResponse::new("Logged in!"))))
}

pub(crate) async fn log_out(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> CookieResponse<MessageResponse> {
    let token = state.session_token(&headers);
    let body = state.run(|app| {
        app.logout(token.as_deref())?;
        Ok(MessageResponse::new("Logged out!"))
    })?;
    Ok((state.clear_session_cookie(), body))
}
