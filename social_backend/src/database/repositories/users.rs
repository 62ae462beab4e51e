use super::placeholders;
use crate::database::models::UserRecord;
use anyhow::Result;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashMap;

pub(super) struct SqliteUserRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

impl<'conn> super::UserRepository for SqliteUserRepository<'conn> {
    fn create(&self, record: &UserRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO users (id, username, password_hash, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                record.id,
                record.username,
                record.password_hash,
                record.created_at,
                record.updated_at
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<UserRecord>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT id, username, password_hash, created_at, updated_at
                FROM users
                WHERE id = ?1
                "#,
                params![id],
                map_user,
            )
            .optional()?)
    }

    fn get_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT id, username, password_hash, created_at, updated_at
                FROM users
                WHERE username = ?1
                "#,
                params![username],
                map_user,
            )
            .optional()?)
    }

    fn list(&self) -> Result<Vec<UserRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, username, password_hash, created_at, updated_at
            FROM users
            ORDER BY username ASC
            "#,
        )?;
        let rows = stmt.query_map([], map_user)?;
        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    fn set_username(&self, id: &str, username: &str, updated_at: &str) -> Result<usize> {
        Ok(self.conn.execute(
            "UPDATE users SET username = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, username, updated_at],
        )?)
    }

    fn set_password(&self, id: &str, hash: &str, updated_at: &str) -> Result<usize> {
        Ok(self.conn.execute(
            "UPDATE users SET password_hash = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, hash, updated_at],
        )?)
    }

    fn delete(&self, id: &str) -> Result<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM users WHERE id = ?1", params![id])?)
    }

    fn usernames_for(&self, ids: &[String]) -> Result<HashMap<String, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!(
            "SELECT id, username FROM users WHERE id IN ({})",
            placeholders(1, ids.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(ids.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut names = HashMap::new();
        for row in rows {
            let (id, username) = row?;
            names.insert(id, username);
        }
        Ok(names)
    }
}
