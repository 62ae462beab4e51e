use super::load_list;
use crate::database::models::FriendRequestRecord;
use anyhow::Result;
use rusqlite::{params, Connection};

pub(super) struct SqliteFriendRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

/// Friendships are stored once per pair, smaller id first.
fn ordered<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl<'conn> super::FriendRepository for SqliteFriendRepository<'conn> {
    fn add_friendship(&self, a: &str, b: &str, created_at: &str) -> Result<usize> {
        let (user1, user2) = ordered(a, b);
        Ok(self.conn.execute(
            "INSERT OR IGNORE INTO friendships (user1, user2, created_at) VALUES (?1, ?2, ?3)",
            params![user1, user2, created_at],
        )?)
    }

    fn remove_friendship(&self, a: &str, b: &str) -> Result<usize> {
        let (user1, user2) = ordered(a, b);
        Ok(self.conn.execute(
            "DELETE FROM friendships WHERE user1 = ?1 AND user2 = ?2",
            params![user1, user2],
        )?)
    }

    fn are_friends(&self, a: &str, b: &str) -> Result<bool> {
        let (user1, user2) = ordered(a, b);
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM friendships WHERE user1 = ?1 AND user2 = ?2",
            params![user1, user2],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn friends_of(&self, user_id: &str) -> Result<Vec<String>> {
        load_list(
            self.conn,
            r#"
            SELECT CASE WHEN user1 = ?1 THEN user2 ELSE user1 END
            FROM friendships
            WHERE user1 = ?1 OR user2 = ?1
            ORDER BY created_at ASC
            "#,
            user_id,
        )
    }

    fn create_request(&self, record: &FriendRequestRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO friend_requests (id, from_user, to_user, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                record.id,
                record.from_user,
                record.to_user,
                record.status,
                record.created_at
            ],
        )?;
        Ok(())
    }

    fn has_pending_request(&self, from: &str, to: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            r#"
            SELECT COUNT(*) FROM friend_requests
            WHERE from_user = ?1 AND to_user = ?2 AND status = 'pending'
            "#,
            params![from, to],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn take_pending_request(&self, from: &str, to: &str) -> Result<usize> {
        Ok(self.conn.execute(
            r#"
            DELETE FROM friend_requests
            WHERE from_user = ?1 AND to_user = ?2 AND status = 'pending'
            "#,
            params![from, to],
        )?)
    }

    fn requests_for(&self, user_id: &str) -> Result<Vec<FriendRequestRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, from_user, to_user, status, created_at
            FROM friend_requests
            WHERE from_user = ?1 OR to_user = ?1
            ORDER BY datetime(created_at) DESC
            "#,
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(FriendRequestRecord {
                id: row.get(0)?,
                from_user: row.get(1)?,
                to_user: row.get(2)?,
                status: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;
        let mut requests = Vec::new();
        for row in rows {
            requests.push(row?);
        }
        Ok(requests)
    }

    fn remove_user(&self, user_id: &str) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let friendships = tx.execute(
            "DELETE FROM friendships WHERE user1 = ?1 OR user2 = ?1",
            params![user_id],
        )?;
        let requests = tx.execute(
            "DELETE FROM friend_requests WHERE from_user = ?1 OR to_user = ?1",
            params![user_id],
        )?;
        tx.commit()?;
        Ok(friendships + requests)
    }
}
