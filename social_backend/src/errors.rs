//! Error taxonomy shared by every service.
//!
//! Each variant carries the raw ids involved. The `Display` impl prints them
//! verbatim; [`SocialError::render_with`] substitutes usernames for user ids
//! before a message leaves the HTTP layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SocialError {
    #[error("Post {0} does not exist!")]
    PostNotFound(String),

    #[error("{user} is not an author of post {post}!")]
    PostAuthorMismatch { user: String, post: String },

    #[error("{user} is not an approver of post {post}!")]
    ApprovalNotRequired { post: String, user: String },

    #[error("Shared resource {0} does not exist!")]
    SharedResourceNotFound(String),

    #[error("Can not request access to resource {0}!")]
    RequestAccessNotAllowed(String),

    #[error("User {user} already has access to resource {record}!")]
    AccessAlreadyGranted { record: String, user: String },

    #[error("User {user} already requested access to resource {record}!")]
    RequestAlreadyExists { record: String, user: String },

    #[error("User {user} does not have access to resource {record}!")]
    AccessDoesNotExist { record: String, user: String },

    #[error("{user} is not an owner of shared resource {record}!")]
    ResourceOwnerMismatch { user: String, record: String },

    #[error("User {0} does not exist!")]
    UserNotFound(String),

    #[error("User with username {0} already exists!")]
    UsernameTaken(String),

    #[error("Username or password is incorrect.")]
    InvalidCredentials,

    #[error("You must be logged in!")]
    NotLoggedIn,

    #[error("You must be logged out!")]
    AlreadyLoggedIn,

    #[error("Comment {0} does not exist!")]
    CommentNotFound(String),

    #[error("{user} is not the author of comment {comment}!")]
    CommentAuthorMismatch { user: String, comment: String },

    #[error("User list {0} does not exist!")]
    UserListNotFound(String),

    #[error("{user} is not the owner of user list {list}!")]
    UserListOwnerMismatch { user: String, list: String },

    #[error("Friend request from {from} to {to} already exists!")]
    FriendRequestAlreadyExists { from: String, to: String },

    #[error("Friend request from {from} to {to} does not exist!")]
    FriendRequestNotFound { from: String, to: String },

    #[error("{0} and {1} are already friends!")]
    AlreadyFriends(String, String),

    #[error("{0} and {1} are not friends!")]
    FriendNotFound(String, String),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Coarse classification used to pick a transport status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    /// Caller is not the author/owner/approver the operation needs.
    NotAllowed,
    /// Request conflicts with current state (already granted, already requested, ...).
    Conflict,
    Unauthenticated,
    BadRequest,
    Internal,
}

/// One substitution slot in a rendered message.
#[derive(Debug, Clone, Copy)]
pub enum MessageArg<'a> {
    /// A user id; rendered through the handle resolver.
    User(&'a str),
    /// Any other id; rendered as-is.
    Raw(&'a str),
}

pub type SocialResult<T> = Result<T, SocialError>;

impl SocialError {
    pub fn kind(&self) -> ErrorKind {
        use SocialError::*;
        match self {
            PostNotFound(_)
            | SharedResourceNotFound(_)
            | UserNotFound(_)
            | CommentNotFound(_)
            | UserListNotFound(_)
            | FriendRequestNotFound { .. }
            | FriendNotFound(..) => ErrorKind::NotFound,
            PostAuthorMismatch { .. }
            | ApprovalNotRequired { .. }
            | RequestAccessNotAllowed(_)
            | ResourceOwnerMismatch { .. }
            | CommentAuthorMismatch { .. }
            | UserListOwnerMismatch { .. }
            | AccessDoesNotExist { .. } => ErrorKind::NotAllowed,
            AccessAlreadyGranted { .. }
            | RequestAlreadyExists { .. }
            | UsernameTaken(_)
            | FriendRequestAlreadyExists { .. }
            | AlreadyFriends(..) => ErrorKind::Conflict,
            InvalidCredentials | NotLoggedIn | AlreadyLoggedIn => ErrorKind::Unauthenticated,
            BadRequest(_) => ErrorKind::BadRequest,
            Store(_) => ErrorKind::Internal,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        SocialError::BadRequest(message.into())
    }

    /// Message template and its arguments; `None` when the message carries
    /// no ids worth translating.
    fn template(&self) -> Option<(&'static str, Vec<MessageArg<'_>>)> {
        use MessageArg::{Raw, User};
        use SocialError::*;
        let parts = match self {
            PostAuthorMismatch { user, post } => {
                ("{0} is not an author of post {1}!", vec![User(user), Raw(post)])
            }
            ApprovalNotRequired { post, user } => {
                ("{0} is not an approver of post {1}!", vec![User(user), Raw(post)])
            }
            AccessAlreadyGranted { record, user } => (
                "User {0} already has access to resource {1}!",
                vec![User(user), Raw(record)],
            ),
            RequestAlreadyExists { record, user } => (
                "User {0} already requested access to resource {1}!",
                vec![User(user), Raw(record)],
            ),
            AccessDoesNotExist { record, user } => (
                "User {0} does not have access to resource {1}!",
                vec![User(user), Raw(record)],
            ),
            ResourceOwnerMismatch { user, record } => (
                "{0} is not an owner of shared resource {1}!",
                vec![User(user), Raw(record)],
            ),
            UserNotFound(user) => ("User {0} does not exist!", vec![Raw(user)]),
            CommentAuthorMismatch { user, comment } => (
                "{0} is not the author of comment {1}!",
                vec![User(user), Raw(comment)],
            ),
            UserListOwnerMismatch { user, list } => (
                "{0} is not the owner of user list {1}!",
                vec![User(user), Raw(list)],
            ),
            FriendRequestAlreadyExists { from, to } => (
                "Friend request from {0} to {1} already exists!",
                vec![User(from), User(to)],
            ),
            FriendRequestNotFound { from, to } => (
                "Friend request from {0} to {1} does not exist!",
                vec![User(from), User(to)],
            ),
            AlreadyFriends(a, b) => ("{0} and {1} are already friends!", vec![User(a), User(b)]),
            FriendNotFound(a, b) => ("{0} and {1} are not friends!", vec![User(a), User(b)]),
            _ => return None,
        };
        Some(parts)
    }

    /// Renders the message, passing user ids through `resolve`. Ids the
    /// resolver does not know are left as-is.
    pub fn render_with<F>(&self, resolve: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some((template, args)) = self.template() else {
            return self.to_string();
        };
        let mut message = template.to_string();
        for (index, arg) in args.iter().enumerate() {
            let value = match arg {
                MessageArg::User(id) => resolve(id).unwrap_or_else(|| id.to_string()),
                MessageArg::Raw(id) => id.to_string(),
            };
            message = message.replace(&format!("{{{index}}}"), &value);
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(id: &str) -> Option<String> {
        match id {
            "u-alice" => Some("alice".into()),
            "u-bob" => Some("bob".into()),
            _ => None,
        }
    }

    #[test]
    fn render_substitutes_usernames_for_user_ids() {
        let err = SocialError::AccessAlreadyGranted {
            record: "rec-1".into(),
            user: "u-alice".into(),
        };
        assert_eq!(
            err.render_with(resolver),
            "User alice already has access to resource rec-1!"
        );
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn render_leaves_unknown_ids_untouched() {
        let err = SocialError::FriendNotFound("u-bob".into(), "u-ghost".into());
        assert_eq!(err.render_with(resolver), "bob and u-ghost are not friends!");
    }

    #[test]
    fn render_matches_display_when_resolver_is_identity() {
        let err = SocialError::ApprovalNotRequired {
            post: "p-1".into(),
            user: "u-1".into(),
        };
        assert_eq!(err.render_with(|id| Some(id.to_string())), err.to_string());
    }

    #[test]
    fn errors_without_ids_render_their_display() {
        let err = SocialError::PostNotFound("p-9".into());
        assert_eq!(err.render_with(resolver), "Post p-9 does not exist!");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(SocialError::NotLoggedIn.kind(), ErrorKind::Unauthenticated);
    }
}
