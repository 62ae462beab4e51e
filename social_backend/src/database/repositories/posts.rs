use super::{load_list, placeholders};
use crate::database::models::{PostBody, PostRecord};
use anyhow::Result;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

pub(super) struct SqlitePostRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

struct PostRow {
    id: String,
    content: String,
    options: Option<String>,
    created_at: String,
    updated_at: String,
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        content: row.get(1)?,
        options: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

impl<'conn> SqlitePostRepository<'conn> {
    fn hydrate(&self, row: PostRow) -> Result<PostRecord> {
        let authors = load_list(
            self.conn,
            "SELECT user_id FROM post_authors WHERE post_id = ?1 ORDER BY position ASC",
            &row.id,
        )?;
        Ok(PostRecord {
            id: row.id,
            body: PostBody {
                authors,
                content: row.content,
                options: row.options,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    fn collect(&self, sql: &str, params: &[String]) -> Result<Vec<PostRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), map_row)?;
        let mut posts = Vec::new();
        for row in rows {
            posts.push(self.hydrate(row?)?);
        }
        Ok(posts)
    }
}

impl<'conn> super::PostRepository for SqlitePostRepository<'conn> {
    fn get(&self, id: &str) -> Result<Option<PostRecord>> {
        let row = self
            .conn
            .query_row(
                r#"
                SELECT id, content, options, created_at, updated_at
                FROM posts
                WHERE id = ?1
                "#,
                params![id],
                map_row,
            )
            .optional()?;
        row.map(|row| self.hydrate(row)).transpose()
    }

    fn list(&self, author: Option<&str>) -> Result<Vec<PostRecord>> {
        match author {
            Some(author) => self.collect(
                r#"
                SELECT p.id, p.content, p.options, p.created_at, p.updated_at
                FROM posts p
                INNER JOIN post_authors a ON a.post_id = p.id
                WHERE a.user_id = ?1
                ORDER BY datetime(p.updated_at) DESC
                "#,
                &[author.to_string()],
            ),
            None => self.collect(
                r#"
                SELECT id, content, options, created_at, updated_at
                FROM posts
                ORDER BY datetime(updated_at) DESC
                "#,
                &[],
            ),
        }
    }

    fn list_by_ids(&self, ids: &[String]) -> Result<Vec<PostRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            r#"
            SELECT id, content, options, created_at, updated_at
            FROM posts
            WHERE id IN ({})
            ORDER BY datetime(updated_at) DESC
            "#,
            placeholders(1, ids.len())
        );
        self.collect(&sql, ids)
    }

    fn remove_author(&self, post_id: &str, user_id: &str) -> Result<usize> {
        Ok(self.conn.execute(
            "DELETE FROM post_authors WHERE post_id = ?1 AND user_id = ?2",
            params![post_id, user_id],
        )?)
    }

    fn delete(&self, id: &str) -> Result<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM posts WHERE id = ?1", params![id])?)
    }
}
