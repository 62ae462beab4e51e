use super::{load_list, load_set};
use crate::database::models::UserListRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteUserListRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

struct ListRow {
    id: String,
    owner: String,
    name: String,
    created_at: String,
    updated_at: String,
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<ListRow> {
    Ok(ListRow {
        id: row.get(0)?,
        owner: row.get(1)?,
        name: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

impl<'conn> SqliteUserListRepository<'conn> {
    fn hydrate(&self, row: ListRow) -> Result<UserListRecord> {
        let members = load_set(
            self.conn,
            "SELECT user_id FROM user_list_members WHERE list_id = ?1",
            &row.id,
        )?;
        Ok(UserListRecord {
            id: row.id,
            owner: row.owner,
            name: row.name,
            members,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl<'conn> super::UserListRepository for SqliteUserListRepository<'conn> {
    fn create(&self, record: &UserListRecord) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            r#"
            INSERT INTO user_lists (id, owner, name, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                record.id,
                record.owner,
                record.name,
                record.created_at,
                record.updated_at
            ],
        )?;
        {
            let mut members = tx.prepare(
                "INSERT OR IGNORE INTO user_list_members (list_id, user_id) VALUES (?1, ?2)",
            )?;
            for member in &record.members {
                members.execute(params![record.id, member])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<UserListRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, owner, name, created_at, updated_at FROM user_lists WHERE id = ?1",
                params![id],
                map_row,
            )
            .optional()?;
        row.map(|row| self.hydrate(row)).transpose()
    }

    fn list_owned(&self, owner: &str) -> Result<Vec<UserListRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, owner, name, created_at, updated_at
            FROM user_lists
            WHERE owner = ?1
            ORDER BY name ASC
            "#,
        )?;
        let rows = stmt.query_map(params![owner], map_row)?;
        let mut lists = Vec::new();
        for row in rows {
            lists.push(self.hydrate(row?)?);
        }
        Ok(lists)
    }

    fn ids_containing(&self, user_id: &str) -> Result<Vec<String>> {
        load_list(
            self.conn,
            "SELECT list_id FROM user_list_members WHERE user_id = ?1 ORDER BY list_id ASC",
            user_id,
        )
    }

    fn rename(&self, id: &str, name: &str, updated_at: &str) -> Result<usize> {
        Ok(self.conn.execute(
            "UPDATE user_lists SET name = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, name, updated_at],
        )?)
    }

    fn add_member(&self, id: &str, user_id: &str) -> Result<usize> {
        Ok(self.conn.execute(
            "INSERT OR IGNORE INTO user_list_members (list_id, user_id) VALUES (?1, ?2)",
            params![id, user_id],
        )?)
    }

    fn remove_member(&self, id: &str, user_id: &str) -> Result<usize> {
        Ok(self.conn.execute(
            "DELETE FROM user_list_members WHERE list_id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?)
    }

    fn delete(&self, id: &str) -> Result<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM user_lists WHERE id = ?1", params![id])?)
    }

    fn remove_user_everywhere(&self, user_id: &str) -> Result<usize> {
        Ok(self.conn.execute(
            "DELETE FROM user_list_members WHERE user_id = ?1",
            params![user_id],
        )?)
    }
}
