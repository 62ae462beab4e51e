use super::{load_set, placeholders, query_ids};
use crate::database::models::SharingRecord;
use crate::utils::now_utc_iso;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteSharingRepository<'a> {
    pub(super) conn: &'a Connection,
    pub(super) scope: &'a str,
}

struct SharingRow {
    id: String,
    scope: String,
    resource: String,
    allow_requests: bool,
    created_at: String,
    updated_at: String,
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<SharingRow> {
    Ok(SharingRow {
        id: row.get(0)?,
        scope: row.get(1)?,
        resource: row.get(2)?,
        allow_requests: row.get::<_, i64>(3)? != 0,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

const SELECT_RECORD: &str =
    "SELECT r.id, r.scope, r.resource_id, r.allow_requests, r.created_at, r.updated_at FROM sharing_records r";

impl<'a> SqliteSharingRepository<'a> {
    fn hydrate(&self, row: SharingRow) -> Result<SharingRecord> {
        let owners = load_set(
            self.conn,
            "SELECT user_id FROM sharing_owners WHERE record_id = ?1",
            &row.id,
        )?;
        let with_access = load_set(
            self.conn,
            "SELECT grantee FROM sharing_access WHERE record_id = ?1",
            &row.id,
        )?;
        let requested_access = load_set(
            self.conn,
            "SELECT user_id FROM sharing_requests WHERE record_id = ?1",
            &row.id,
        )?;
        Ok(SharingRecord {
            id: row.id,
            scope: row.scope,
            resource: row.resource,
            owners,
            allow_requests: row.allow_requests,
            requested_access,
            with_access,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    /// `params[0]` must be the scope; the rest fill the remaining slots.
    fn collect(&self, sql: &str, params: &[String]) -> Result<Vec<SharingRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(params.iter()), map_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(self.hydrate(row?)?);
        }
        Ok(records)
    }

    fn touch(&self, record_id: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE sharing_records SET updated_at = ?2 WHERE id = ?1",
            params![record_id, now_utc_iso()],
        )?;
        Ok(())
    }
}

impl<'a> super::SharingRepository for SqliteSharingRepository<'a> {
    fn create(&self, record: &SharingRecord) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            r#"
            INSERT INTO sharing_records (id, scope, resource_id, allow_requests, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                record.id,
                self.scope,
                record.resource,
                record.allow_requests as i64,
                record.created_at,
                record.updated_at
            ],
        )?;
        {
            let mut owners = tx.prepare(
                "INSERT OR IGNORE INTO sharing_owners (record_id, user_id) VALUES (?1, ?2)",
            )?;
            for owner in &record.owners {
                owners.execute(params![record.id, owner])?;
            }
            let mut access = tx.prepare(
                "INSERT OR IGNORE INTO sharing_access (record_id, grantee) VALUES (?1, ?2)",
            )?;
            for grantee in &record.with_access {
                access.execute(params![record.id, grantee])?;
            }
            let mut requests = tx.prepare(
                "INSERT OR IGNORE INTO sharing_requests (record_id, user_id) VALUES (?1, ?2)",
            )?;
            for user in &record.requested_access {
                requests.execute(params![record.id, user])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<SharingRecord>> {
        let sql = format!("{SELECT_RECORD} WHERE r.scope = ?1 AND r.id = ?2");
        let row = self
            .conn
            .query_row(&sql, params![self.scope, id], map_row)
            .optional()?;
        row.map(|row| self.hydrate(row)).transpose()
    }

    fn get_by_resource(&self, resource_id: &str) -> Result<Option<SharingRecord>> {
        let sql = format!(
            "{SELECT_RECORD} WHERE r.scope = ?1 AND r.resource_id = ?2 ORDER BY r.created_at ASC LIMIT 1"
        );
        let row = self
            .conn
            .query_row(&sql, params![self.scope, resource_id], map_row)
            .optional()?;
        row.map(|row| self.hydrate(row)).transpose()
    }

    fn list(&self) -> Result<Vec<SharingRecord>> {
        let sql = format!("{SELECT_RECORD} WHERE r.scope = ?1 ORDER BY datetime(r.updated_at) DESC");
        self.collect(&sql, &[self.scope.to_string()])
    }

    fn list_accessible(&self, targets: &[String]) -> Result<Vec<SharingRecord>> {
        if targets.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            r#"
            {SELECT_RECORD}
            WHERE r.scope = ?1 AND EXISTS (
                SELECT 1 FROM sharing_access a
                WHERE a.record_id = r.id AND a.grantee IN ({})
            )
            ORDER BY datetime(r.updated_at) DESC
            "#,
            placeholders(2, targets.len())
        );
        let mut params = Vec::with_capacity(targets.len() + 1);
        params.push(self.scope.to_string());
        params.extend(targets.iter().cloned());
        self.collect(&sql, &params)
    }

    fn list_owned(&self, user_id: &str) -> Result<Vec<SharingRecord>> {
        let sql = format!(
            r#"
            {SELECT_RECORD}
            INNER JOIN sharing_owners o ON o.record_id = r.id
            WHERE r.scope = ?1 AND o.user_id = ?2
            ORDER BY datetime(r.updated_at) DESC
            "#
        );
        self.collect(&sql, &[self.scope.to_string(), user_id.to_string()])
    }

    fn set_resource(&self, old_resource: &str, new_resource: &str) -> Result<usize> {
        Ok(self.conn.execute(
            r#"
            UPDATE sharing_records
            SET resource_id = ?3, updated_at = ?4
            WHERE scope = ?1 AND resource_id = ?2
            "#,
            params![self.scope, old_resource, new_resource, now_utc_iso()],
        )?)
    }

    fn delete_by_resource(&self, resource_id: &str) -> Result<usize> {
        Ok(self.conn.execute(
            "DELETE FROM sharing_records WHERE scope = ?1 AND resource_id = ?2",
            params![self.scope, resource_id],
        )?)
    }

    fn add_request(&self, record_id: &str, user_id: &str) -> Result<usize> {
        let added = self.conn.execute(
            "INSERT OR IGNORE INTO sharing_requests (record_id, user_id) VALUES (?1, ?2)",
            params![record_id, user_id],
        )?;
        if added > 0 {
            self.touch(record_id)?;
        }
        Ok(added)
    }

    fn grant(&self, record_id: &str, grantee: &str) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM sharing_requests WHERE record_id = ?1 AND user_id = ?2",
            params![record_id, grantee],
        )?;
        let added = tx.execute(
            "INSERT OR IGNORE INTO sharing_access (record_id, grantee) VALUES (?1, ?2)",
            params![record_id, grantee],
        )?;
        tx.commit()?;
        if added > 0 {
            self.touch(record_id)?;
        }
        Ok(added)
    }

    fn revoke(&self, record_id: &str, grantee: &str) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM sharing_access WHERE record_id = ?1 AND grantee = ?2",
            params![record_id, grantee],
        )?;
        if removed > 0 {
            self.touch(record_id)?;
        }
        Ok(removed)
    }

    fn remove_member_everywhere(&self, user_id: &str) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut removed = 0;
        for table_sql in [
            "DELETE FROM sharing_owners WHERE user_id = ?2 AND record_id IN (SELECT id FROM sharing_records WHERE scope = ?1)",
            "DELETE FROM sharing_access WHERE grantee = ?2 AND record_id IN (SELECT id FROM sharing_records WHERE scope = ?1)",
            "DELETE FROM sharing_requests WHERE user_id = ?2 AND record_id IN (SELECT id FROM sharing_records WHERE scope = ?1)",
        ] {
            removed += tx.execute(table_sql, params![self.scope, user_id])?;
        }
        tx.commit()?;
        Ok(removed)
    }

    fn delete_ownerless(&self) -> Result<Vec<String>> {
        let orphans = query_ids(
            self.conn,
            r#"
            SELECT resource_id FROM sharing_records r
            WHERE r.scope = ?1
              AND NOT EXISTS (SELECT 1 FROM sharing_owners o WHERE o.record_id = r.id)
            "#,
            &[self.scope.to_string()],
        )?;
        self.conn.execute(
            r#"
            DELETE FROM sharing_records
            WHERE scope = ?1
              AND NOT EXISTS (SELECT 1 FROM sharing_owners o WHERE o.record_id = sharing_records.id)
            "#,
            params![self.scope],
        )?;
        Ok(orphans)
    }
}
