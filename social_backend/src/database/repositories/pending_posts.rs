use super::{load_list, load_set};
use crate::database::models::{PendingPostRecord, PostBody, PostRecord};
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

pub(super) struct SqlitePendingPostRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

struct PendingRow {
    id: String,
    content: String,
    options: Option<String>,
    created_at: String,
    updated_at: String,
}

impl<'conn> SqlitePendingPostRepository<'conn> {
    fn hydrate(&self, row: PendingRow) -> Result<PendingPostRecord> {
        let authors = load_list(
            self.conn,
            "SELECT user_id FROM pending_post_authors WHERE post_id = ?1 ORDER BY position ASC",
            &row.id,
        )?;
        let requires_approval = load_set(
            self.conn,
            "SELECT user_id FROM pending_post_approvals WHERE post_id = ?1",
            &row.id,
        )?;
        Ok(PendingPostRecord {
            id: row.id,
            body: PostBody {
                authors,
                content: row.content,
                options: row.options,
            },
            requires_approval,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl<'conn> super::PendingPostRepository for SqlitePendingPostRepository<'conn> {
    fn create(&self, record: &PendingPostRecord) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            r#"
            INSERT INTO pending_posts (id, content, options, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                record.id,
                record.body.content,
                record.body.options,
                record.created_at,
                record.updated_at
            ],
        )?;
        {
            let mut authors = tx.prepare(
                "INSERT OR IGNORE INTO pending_post_authors (post_id, user_id, position) VALUES (?1, ?2, ?3)",
            )?;
            for (position, author) in record.body.authors.iter().enumerate() {
                authors.execute(params![record.id, author, position as i64])?;
            }
            let mut approvals = tx.prepare(
                "INSERT OR IGNORE INTO pending_post_approvals (post_id, user_id) VALUES (?1, ?2)",
            )?;
            for user in &record.requires_approval {
                approvals.execute(params![record.id, user])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<PendingPostRecord>> {
        let row = self
            .conn
            .query_row(
                r#"
                SELECT id, content, options, created_at, updated_at
                FROM pending_posts
                WHERE id = ?1
                "#,
                params![id],
                |row| {
                    Ok(PendingRow {
                        id: row.get(0)?,
                        content: row.get(1)?,
                        options: row.get(2)?,
                        created_at: row.get(3)?,
                        updated_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        row.map(|row| self.hydrate(row)).transpose()
    }

    fn list_for_author(&self, user_id: &str) -> Result<Vec<PendingPostRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT p.id, p.content, p.options, p.created_at, p.updated_at
            FROM pending_posts p
            INNER JOIN pending_post_authors a ON a.post_id = p.id
            WHERE a.user_id = ?1
            ORDER BY datetime(p.updated_at) DESC
            "#,
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(PendingRow {
                id: row.get(0)?,
                content: row.get(1)?,
                options: row.get(2)?,
                created_at: row.get(3)?,
                updated_at: row.get(4)?,
            })
        })?;
        let mut posts = Vec::new();
        for row in rows {
            posts.push(self.hydrate(row?)?);
        }
        Ok(posts)
    }

    fn remove_approver(&self, post_id: &str, user_id: &str) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM pending_post_approvals WHERE post_id = ?1 AND user_id = ?2",
            params![post_id, user_id],
        )?;
        if removed > 0 {
            self.conn.execute(
                "UPDATE pending_posts SET updated_at = ?2 WHERE id = ?1",
                params![post_id, crate::utils::now_utc_iso()],
            )?;
        }
        Ok(removed)
    }

    fn publish(&self, pending_id: &str, published: &PostRecord) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM pending_posts WHERE id = ?1", params![pending_id])?;
        tx.execute(
            r#"
            INSERT INTO posts (id, content, options, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                published.id,
                published.body.content,
                published.body.options,
                published.created_at,
                published.updated_at
            ],
        )?;
        {
            let mut authors = tx.prepare(
                "INSERT OR IGNORE INTO post_authors (post_id, user_id, position) VALUES (?1, ?2, ?3)",
            )?;
            for (position, author) in published.body.authors.iter().enumerate() {
                authors.execute(params![published.id, author, position as i64])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM pending_posts WHERE id = ?1", params![id])?)
    }
}
