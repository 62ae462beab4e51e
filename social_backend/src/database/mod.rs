pub mod models;
pub mod repositories;

use crate::config::SocialPaths;
use anyhow::{anyhow, Result};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

pub(crate) const MIGRATIONS: &str = r#"
    PRAGMA journal_mode = WAL;
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS sessions (
        token TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS pending_posts (
        id TEXT PRIMARY KEY,
        content TEXT NOT NULL,
        options TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS pending_post_authors (
        post_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        position INTEGER NOT NULL,
        PRIMARY KEY (post_id, user_id),
        FOREIGN KEY (post_id) REFERENCES pending_posts(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS pending_post_approvals (
        post_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        PRIMARY KEY (post_id, user_id),
        FOREIGN KEY (post_id) REFERENCES pending_posts(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS posts (
        id TEXT PRIMARY KEY,
        content TEXT NOT NULL,
        options TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS post_authors (
        post_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        position INTEGER NOT NULL,
        PRIMARY KEY (post_id, user_id),
        FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS sharing_records (
        id TEXT PRIMARY KEY,
        scope TEXT NOT NULL,
        resource_id TEXT NOT NULL,
        allow_requests INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS sharing_owners (
        record_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        PRIMARY KEY (record_id, user_id),
        FOREIGN KEY (record_id) REFERENCES sharing_records(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS sharing_access (
        record_id TEXT NOT NULL,
        grantee TEXT NOT NULL,
        PRIMARY KEY (record_id, grantee),
        FOREIGN KEY (record_id) REFERENCES sharing_records(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS sharing_requests (
        record_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        PRIMARY KEY (record_id, user_id),
        FOREIGN KEY (record_id) REFERENCES sharing_records(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS comments (
        id TEXT PRIMARY KEY,
        author TEXT NOT NULL,
        content TEXT NOT NULL,
        target TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS user_lists (
        id TEXT PRIMARY KEY,
        owner TEXT NOT NULL,
        name TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS user_list_members (
        list_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        PRIMARY KEY (list_id, user_id),
        FOREIGN KEY (list_id) REFERENCES user_lists(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS friendships (
        user1 TEXT NOT NULL,
        user2 TEXT NOT NULL,
        created_at TEXT NOT NULL,
        PRIMARY KEY (user1, user2)
    );

    CREATE TABLE IF NOT EXISTS friend_requests (
        id TEXT PRIMARY KEY,
        from_user TEXT NOT NULL,
        to_user TEXT NOT NULL,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_pending_post_authors_user ON pending_post_authors(user_id);
    CREATE INDEX IF NOT EXISTS idx_post_authors_user ON post_authors(user_id);
    CREATE INDEX IF NOT EXISTS idx_sharing_resource ON sharing_records(scope, resource_id);
    CREATE INDEX IF NOT EXISTS idx_sharing_access_grantee ON sharing_access(grantee);
    CREATE INDEX IF NOT EXISTS idx_sharing_owners_user ON sharing_owners(user_id);
    CREATE INDEX IF NOT EXISTS idx_comments_target ON comments(target);
    CREATE INDEX IF NOT EXISTS idx_user_list_members_user ON user_list_members(user_id);
    CREATE INDEX IF NOT EXISTS idx_friend_requests_pair ON friend_requests(from_user, to_user, status);
"#;

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    newly_created: bool,
}

impl Database {
    pub fn connect(paths: &SocialPaths) -> Result<Self> {
        let newly_created = !paths.db_path.exists();
        let conn = Connection::open(&paths.db_path)?;
        Ok(Self::from_connection(conn, newly_created))
    }

    pub fn from_connection(conn: Connection, newly_created: bool) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            newly_created,
        }
    }

    /// Fresh in-memory database with migrations applied.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let database = Self::from_connection(conn, true);
        database.ensure_migrations()?;
        Ok(database)
    }

    pub fn ensure_migrations(&self) -> Result<bool> {
        self.with_conn(|conn| {
            conn.execute_batch(MIGRATIONS)?;
            Ok(())
        })?;
        Ok(self.newly_created)
    }

    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) -> Result<()> {
        self.with_conn(|conn| Ok(conn.execute_batch(sql)?))
    }

    /// Runs `f` with repository access while holding the connection lock.
    /// Everything inside one call is serialized against other callers.
    pub fn with_repositories<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(repositories::SqliteRepositories<'_>) -> Result<T, E>,
        E: From<anyhow::Error>,
    {
        let guard = self
            .conn
            .lock()
            .map_err(|_| E::from(anyhow!("database mutex poisoned")))?;
        f(repositories::SqliteRepositories::new(&guard))
    }

    fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let guard = self
            .conn
            .lock()
            .map_err(|_| anyhow!("database mutex poisoned"))?;
        f(&guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let database = Database::open_in_memory().expect("in-memory db");
        assert!(database.ensure_migrations().expect("second run"));
    }

    #[test]
    fn connect_reports_new_database() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = SocialPaths::from_base_dir(dir.path()).unwrap();
        std::fs::create_dir_all(&paths.data_dir).unwrap();
        let first = Database::connect(&paths).unwrap();
        assert!(first.ensure_migrations().unwrap());
        drop(first);
        let second = Database::connect(&paths).unwrap();
        assert!(!second.ensure_migrations().unwrap());
    }
}
