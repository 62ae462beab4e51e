use super::{ApiResult, AppState, MessageResponse};
use crate::app::NewComment;
use crate::responses::{CommentResponse, Responses};
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub(crate) struct CreatedComment {
    msg: &'static str,
    comment: CommentResponse,
}

pub(crate) async fn list_comments(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<String>,
) -> ApiResult<Vec<CommentResponse>> {
    state.run_as(&headers, |app, user| {
        Responses::new(&app.users).comments(app.comments_for_post(user, &post_id)?)
    })
}

pub(crate) async fn create_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<String>,
    Json(body): Json<NewComment>,
) -> ApiResult<CreatedComment> {
    state.run_as(&headers, |app, user| {
        let comment = app.create_comment(user, &post_id, body)?;
        Ok(CreatedComment {
            msg: "Comment successfully created!",
            comment: Responses::new(&app.users).comment(comment)?,
        })
    })
}

pub(crate) async fn delete_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<MessageResponse> {
    state.run_as(&headers, |app, user| {
        app.delete_comment(user, &id).map(MessageResponse::new)
    })
}
