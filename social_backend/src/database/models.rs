use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub token: String,
    pub user_id: String,
    pub created_at: String,
}

/// Shared body of pending and published posts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostBody {
    /// Ordered, duplicate-free.
    pub authors: Vec<String>,
    pub content: String,
    /// JSON-encoded rendering options, opaque to the backend.
    pub options: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingPostRecord {
    pub id: String,
    pub body: PostBody,
    pub requires_approval: BTreeSet<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: String,
    pub body: PostBody,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharingRecord {
    pub id: String,
    pub scope: String,
    pub resource: String,
    pub owners: BTreeSet<String>,
    pub allow_requests: bool,
    pub requested_access: BTreeSet<String>,
    pub with_access: BTreeSet<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: String,
    pub author: String,
    pub content: String,
    pub target: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserListRecord {
    pub id: String,
    pub owner: String,
    pub name: String,
    pub members: BTreeSet<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendRequestRecord {
    pub id: String,
    pub from_user: String,
    pub to_user: String,
    pub status: String,
    pub created_at: String,
}
