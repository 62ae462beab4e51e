mod comments;
mod friends;
mod pending_posts;
mod posts;
mod sessions;
mod sharing;
mod user_lists;
mod users;

use super::models::{
    CommentRecord, FriendRequestRecord, PendingPostRecord, PostRecord, SessionRecord,
    SharingRecord, UserListRecord, UserRecord,
};
use anyhow::Result;
use rusqlite::{params_from_iter, Connection};
use std::collections::{BTreeSet, HashMap};

// Set mutations (`add_*`, `remove_*`, `grant`, `revoke`, ...) report how many
// rows they changed. Zero means the membership was already in the requested
// state, which callers use as their only race-safe signal.

pub trait UserRepository {
    fn create(&self, record: &UserRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<UserRecord>>;
    fn get_by_username(&self, username: &str) -> Result<Option<UserRecord>>;
    fn list(&self) -> Result<Vec<UserRecord>>;
    fn set_username(&self, id: &str, username: &str, updated_at: &str) -> Result<usize>;
    fn set_password(&self, id: &str, hash: &str, updated_at: &str) -> Result<usize>;
    fn delete(&self, id: &str) -> Result<usize>;
    /// id -> username for every id that exists.
    fn usernames_for(&self, ids: &[String]) -> Result<HashMap<String, String>>;
}

pub trait SessionRepository {
    fn create(&self, record: &SessionRecord) -> Result<()>;
    fn get(&self, token: &str) -> Result<Option<SessionRecord>>;
    fn delete(&self, token: &str) -> Result<usize>;
    fn delete_for_user(&self, user_id: &str) -> Result<usize>;
}

pub trait PendingPostRepository {
    fn create(&self, record: &PendingPostRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<PendingPostRecord>>;
    fn list_for_author(&self, user_id: &str) -> Result<Vec<PendingPostRecord>>;
    fn remove_approver(&self, post_id: &str, user_id: &str) -> Result<usize>;
    /// Deletes the pending post and inserts `published` in one transaction.
    fn publish(&self, pending_id: &str, published: &PostRecord) -> Result<()>;
    fn delete(&self, id: &str) -> Result<usize>;
}

pub trait PostRepository {
    fn get(&self, id: &str) -> Result<Option<PostRecord>>;
    /// Newest first, optionally restricted to one author.
    fn list(&self, author: Option<&str>) -> Result<Vec<PostRecord>>;
    fn list_by_ids(&self, ids: &[String]) -> Result<Vec<PostRecord>>;
    fn remove_author(&self, post_id: &str, user_id: &str) -> Result<usize>;
    fn delete(&self, id: &str) -> Result<usize>;
}

pub trait SharingRepository {
    fn create(&self, record: &SharingRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<SharingRecord>>;
    fn get_by_resource(&self, resource_id: &str) -> Result<Option<SharingRecord>>;
    fn list(&self) -> Result<Vec<SharingRecord>>;
    /// Records whose grantees intersect `targets`.
    fn list_accessible(&self, targets: &[String]) -> Result<Vec<SharingRecord>>;
    fn list_owned(&self, user_id: &str) -> Result<Vec<SharingRecord>>;
    fn set_resource(&self, old_resource: &str, new_resource: &str) -> Result<usize>;
    fn delete_by_resource(&self, resource_id: &str) -> Result<usize>;
    fn add_request(&self, record_id: &str, user_id: &str) -> Result<usize>;
    /// Drops any pending request and adds the grantee, in one transaction.
    fn grant(&self, record_id: &str, grantee: &str) -> Result<usize>;
    fn revoke(&self, record_id: &str, grantee: &str) -> Result<usize>;
    /// Strips `user_id` from owners, grantees and requests of every record.
    fn remove_member_everywhere(&self, user_id: &str) -> Result<usize>;
    /// Deletes records left without any owner; returns their resource ids.
    fn delete_ownerless(&self) -> Result<Vec<String>>;
}

pub trait CommentRepository {
    fn create(&self, record: &CommentRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<CommentRecord>>;
    fn list_for_target(&self, target: &str) -> Result<Vec<CommentRecord>>;
    fn list_for_author(&self, author: &str) -> Result<Vec<CommentRecord>>;
    /// Points every comment on `old_target` at `new_target`.
    fn set_target(&self, old_target: &str, new_target: &str) -> Result<usize>;
    fn delete(&self, id: &str) -> Result<usize>;
}

pub trait UserListRepository {
    fn create(&self, record: &UserListRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<UserListRecord>>;
    fn list_owned(&self, owner: &str) -> Result<Vec<UserListRecord>>;
    fn ids_containing(&self, user_id: &str) -> Result<Vec<String>>;
    fn rename(&self, id: &str, name: &str, updated_at: &str) -> Result<usize>;
    fn add_member(&self, id: &str, user_id: &str) -> Result<usize>;
    fn remove_member(&self, id: &str, user_id: &str) -> Result<usize>;
    fn delete(&self, id: &str) -> Result<usize>;
    fn remove_user_everywhere(&self, user_id: &str) -> Result<usize>;
}

pub trait FriendRepository {
    fn add_friendship(&self, a: &str, b: &str, created_at: &str) -> Result<usize>;
    fn remove_friendship(&self, a: &str, b: &str) -> Result<usize>;
    fn are_friends(&self, a: &str, b: &str) -> Result<bool>;
    fn friends_of(&self, user_id: &str) -> Result<Vec<String>>;
    fn create_request(&self, record: &FriendRequestRecord) -> Result<()>;
    fn has_pending_request(&self, from: &str, to: &str) -> Result<bool>;
    /// Removes the pending request from `from` to `to`, if any.
    fn take_pending_request(&self, from: &str, to: &str) -> Result<usize>;
    fn requests_for(&self, user_id: &str) -> Result<Vec<FriendRequestRecord>>;
    fn remove_user(&self, user_id: &str) -> Result<usize>;
}

pub struct SqliteRepositories<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRepositories<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn users(&self) -> impl UserRepository + '_ {
        users::SqliteUserRepository { conn: self.conn }
    }

    pub fn sessions(&self) -> impl SessionRepository + '_ {
        sessions::SqliteSessionRepository { conn: self.conn }
    }

    pub fn pending_posts(&self) -> impl PendingPostRepository + '_ {
        pending_posts::SqlitePendingPostRepository { conn: self.conn }
    }

    pub fn posts(&self) -> impl PostRepository + '_ {
        posts::SqlitePostRepository { conn: self.conn }
    }

    /// Sharing records of one scope ("posts", "comments", ...).
    pub fn sharing<'a>(&'a self, scope: &'a str) -> impl SharingRepository + 'a {
        sharing::SqliteSharingRepository {
            conn: self.conn,
            scope,
        }
    }

    pub fn comments(&self) -> impl CommentRepository + '_ {
        comments::SqliteCommentRepository { conn: self.conn }
    }

    pub fn user_lists(&self) -> impl UserListRepository + '_ {
        user_lists::SqliteUserListRepository { conn: self.conn }
    }

    pub fn friends(&self) -> impl FriendRepository + '_ {
        friends::SqliteFriendRepository { conn: self.conn }
    }

    pub fn conn(&self) -> &'conn Connection {
        self.conn
    }
}

/// Collects a single-column membership query into a set.
pub(super) fn load_set(conn: &Connection, sql: &str, key: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([key], |row| row.get::<_, String>(0))?;
    let mut members = BTreeSet::new();
    for row in rows {
        members.insert(row?);
    }
    Ok(members)
}

/// Collects an ordered single-column query.
pub(super) fn load_list(conn: &Connection, sql: &str, key: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([key], |row| row.get::<_, String>(0))?;
    let mut items = Vec::new();
    for row in rows {
        items.push(row?);
    }
    Ok(items)
}

/// `?1, ?2, ...` placeholders offset by `start`.
pub(super) fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Runs an id-returning query with positional `params`.
pub(super) fn query_ids(conn: &Connection, sql: &str, params: &[String]) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params_from_iter(params.iter()), |row| row.get::<_, String>(0))?;
    let mut ids = Vec::new();
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}
