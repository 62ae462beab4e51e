use crate::database::models::CommentRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteCommentRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn map_comment(row: &Row<'_>) -> rusqlite::Result<CommentRecord> {
    Ok(CommentRecord {
        id: row.get(0)?,
        author: row.get(1)?,
        content: row.get(2)?,
        target: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

impl<'conn> SqliteCommentRepository<'conn> {
    fn collect(&self, sql: &str, key: &str) -> Result<Vec<CommentRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params![key], map_comment)?;
        let mut comments = Vec::new();
        for row in rows {
            comments.push(row?);
        }
        Ok(comments)
    }
}

impl<'conn> super::CommentRepository for SqliteCommentRepository<'conn> {
    fn create(&self, record: &CommentRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO comments (id, author, content, target, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                record.id,
                record.author,
                record.content,
                record.target,
                record.created_at,
                record.updated_at
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<CommentRecord>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT id, author, content, target, created_at, updated_at
                FROM comments
                WHERE id = ?1
                "#,
                params![id],
                map_comment,
            )
            .optional()?)
    }

    fn list_for_target(&self, target: &str) -> Result<Vec<CommentRecord>> {
        self.collect(
            r#"
            SELECT id, author, content, target, created_at, updated_at
            FROM comments
            WHERE target = ?1
            ORDER BY datetime(updated_at) DESC
            "#,
            target,
        )
    }

    fn list_for_author(&self, author: &str) -> Result<Vec<CommentRecord>> {
        self.collect(
            r#"
            SELECT id, author, content, target, created_at, updated_at
            FROM comments
            WHERE author = ?1
            ORDER BY datetime(updated_at) DESC
            "#,
            author,
        )
    }

    fn set_target(&self, old_target: &str, new_target: &str) -> Result<usize> {
        Ok(self.conn.execute(
            "UPDATE comments SET target = ?2 WHERE target = ?1",
            params![old_target, new_target],
        )?)
    }

    fn delete(&self, id: &str) -> Result<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM comments WHERE id = ?1", params![id])?)
    }
}
