mod comments;
mod friends;
mod posts;
mod sharing;
mod user_lists;
mod users;

use crate::app::SocialApp;
use crate::config::SocialConfig;
use crate::errors::{ErrorKind, SocialError, SocialResult};
use crate::identity::UserService;
use anyhow::Result;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::extract::State;
use axum::routing::{delete, get, patch, post, put};
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: SocialConfig,
    pub app: Arc<SocialApp>,
}

impl AppState {
    pub fn new(config: SocialConfig, app: SocialApp) -> Self {
        Self {
            config,
            app: Arc::new(app),
        }
    }

    /// Runs one route flow and renders any failure for the client.
    pub(crate) fn run<T, F>(&self, flow: F) -> ApiResult<T>
    where
        F: FnOnce(&SocialApp) -> SocialResult<T>,
    {
        flow(self.app.as_ref())
            .map(Json)
            .map_err(|err| ApiError::render(err, &self.app.users))
    }

    /// Like [`AppState::run`] for flows that need the logged-in user.
    pub(crate) fn run_as<T, F>(&self, headers: &HeaderMap, flow: F) -> ApiResult<T>
    where
        F: FnOnce(&SocialApp, &str) -> SocialResult<T>,
    {
        let token = self.session_token(headers);
        self.run(|app| {
            let user = app.current_user(token.as_deref())?;
            flow(app, user.as_str())
        })
    }

    pub(crate) fn session_token(&self, headers: &HeaderMap) -> Option<String> {
        read_cookie(headers, &self.config.session.cookie_name)
    }

    pub(crate) fn session_cookie(&self, token: &str) -> [(HeaderName, String); 1] {
        let mut cookie = format!(
            "{}={token}; Path=/; HttpOnly; SameSite=Lax",
            self.config.session.cookie_name
        );
        if self.config.session.secure_cookies {
            cookie.push_str("; Secure");
        }
        [(SET_COOKIE, cookie)]
    }

    pub(crate) fn clear_session_cookie(&self) -> [(HeaderName, String); 1] {
        [(
            SET_COOKIE,
            format!(
                "{}=; Path=/; HttpOnly; Max-Age=0",
                self.config.session.cookie_name
            ),
        )]
    }
}

fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

pub(crate) type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// Maps the error kind to a status and renders user ids as usernames.
    fn render(err: SocialError, users: &UserService) -> Self {
        let status = match err.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::NotAllowed => StatusCode::FORBIDDEN,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::Internal => {
                tracing::error!(error = ?err, "internal server error");
                return Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: "internal server error".into(),
                };
            }
        };
        let message = err.render_with(|id| {
            users
                .usernames_for(&[id.to_string()])
                .ok()
                .and_then(|mut names| names.remove(id))
        });
        tracing::debug!(status = %status, message = %message, "request rejected");
        Self { status, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { message: self.message })).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    message: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct MessageResponse {
    pub msg: &'static str,
}

impl MessageResponse {
    pub(crate) fn new(msg: &'static str) -> Self {
        Self { msg }
    }
}

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
    version: &'static str,
    api_port: u16,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        api_port: state.config.api_port,
    })
}

/// Every route, mounted under `/api`.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health_handler))
        .route("/session", get(users::get_session_user))
        .route(
            "/users",
            get(users::list_users)
                .post(users::create_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route("/users/:username", get(users::get_user))
        .route("/login", post(users::log_in))
        .route("/logout", post(users::log_out))
        .route("/posts", get(posts::list_posts).post(posts::create_post))
        .route("/posts/:id", delete(posts::delete_post))
        .route("/posts/:id/approve", put(posts::approve_post))
        .route("/posts/:id/reject", put(posts::reject_post))
        .route(
            "/posts/:id/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route("/pendingPosts", get(posts::list_pending_posts))
        .route("/accessiblePosts", get(posts::list_accessible_posts))
        .route("/comments/:id", delete(comments::delete_comment))
        .route("/sharing/:scope", get(sharing::list_owned))
        .route("/sharing/posts/:id/requests", post(sharing::request_access))
        .route(
            "/sharing/posts/:id/members",
            post(sharing::add_member).delete(sharing::remove_member),
        )
        .route(
            "/sharing/posts/:id/lists",
            post(sharing::add_list).delete(sharing::remove_list),
        )
        .route(
            "/userLists",
            get(user_lists::list_user_lists).post(user_lists::create_user_list),
        )
        .route(
            "/userLists/:id",
            patch(user_lists::rename_user_list).delete(user_lists::delete_user_list),
        )
        .route(
            "/userLists/:id/members",
            post(user_lists::add_member).delete(user_lists::remove_member),
        )
        .route("/friends", get(friends::list_friends))
        .route("/friends/:friend", delete(friends::remove_friend))
        .route("/friend/requests", get(friends::list_requests))
        .route(
            "/friend/requests/:to",
            post(friends::send_request).delete(friends::remove_request),
        )
        .route("/friend/accept/:from", put(friends::accept_request))
        .route("/friend/reject/:from", put(friends::reject_request));

    Router::new()
        .nest("/api", api)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Tries to bind to the given port, or finds the next available port
async fn find_available_port(start_port: u16) -> Result<(TcpListener, u16)> {
    const MAX_PORT_ATTEMPTS: u16 = 100;

    for offset in 0..MAX_PORT_ATTEMPTS {
        let port = start_port.saturating_add(offset);
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        match TcpListener::bind(addr).await {
            Ok(listener) => return Ok((listener, port)),
            Err(e) => {
                if offset == 0 {
                    tracing::debug!(port, error = %e, "port in use, trying next port");
                }
            }
        }
    }

    anyhow::bail!(
        "could not find available port in range {}-{}",
        start_port,
        start_port.saturating_add(MAX_PORT_ATTEMPTS - 1)
    )
}

pub async fn serve_http(config: SocialConfig, app: SocialApp) -> Result<()> {
    let requested_port = config.api_port;
    let router = router(AppState::new(config, app));

    let (listener, actual_port) = find_available_port(requested_port).await?;
    let addr = SocketAddr::from(([0, 0, 0, 0], actual_port));
    if actual_port != requested_port {
        tracing::warn!(
            requested_port,
            actual_port,
            "configured port was in use, bound to next available port"
        );
    }

    tracing::info!(?addr, "HTTP server listening");
    axum::serve(listener, router.into_make_service()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn session_cookie_is_found_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; sid=abc123; lang=en"));
        assert_eq!(read_cookie(&headers, "sid").as_deref(), Some("abc123"));
        assert_eq!(read_cookie(&headers, "missing"), None);

        headers.insert(COOKIE, HeaderValue::from_static("sid="));
        assert_eq!(read_cookie(&headers, "sid"), None);
    }
}
