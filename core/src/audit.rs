use crate::model::{AuditEntry, SkipReason};
use anyhow::Result;
use rusqlite::{params, Connection};
use serde_json::json;
use time::OffsetDateTime;

fn now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

fn insert(
    conn: &Connection,
    owner_id: i64,
    actor_id: i64,
    asset_count: usize,
    details: &serde_json::Value,
) -> Result<()> {
    conn.execute(
        "INSERT INTO audit_log (owner_id, actor_id, asset_count, details, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            owner_id,
            actor_id,
            asset_count as i64,
            details.to_string(),
            now()
        ],
    )?;
    Ok(())
}

/// One owner-level summary entry per deletion attempt.
pub fn record_deletion(
    conn: &Connection,
    owner_id: i64,
    actor_id: i64,
    asset_count: usize,
    deleted: usize,
    skipped: usize,
    owner_title: &str,
    owner_type: &str,
) -> Result<()> {
    insert(
        conn,
        owner_id,
        actor_id,
        asset_count,
        &json!({
            "action": "deleted",
            "owner_title": owner_title,
            "owner_type": owner_type,
            "deleted": deleted,
            "skipped": skipped,
        }),
    )
}

/// One entry per individually skipped asset, with its reason tag.
pub fn record_skip(
    conn: &Connection,
    owner_id: i64,
    actor_id: i64,
    asset_id: i64,
    asset_url: Option<&str>,
    reason: SkipReason,
) -> Result<()> {
    insert(
        conn,
        owner_id,
        actor_id,
        0,
        &json!({
            "action": "skipped",
            "asset_id": asset_id,
            "asset_url": asset_url,
            "reason": reason.as_str(),
        }),
    )
}

/// Age-based retention: drop entries older than `days`. Returns the
/// number purged.
pub fn purge_older_than(conn: &Connection, days: u64) -> Result<usize> {
    let cutoff = now() - (days as i64) * 86_400;
    let n = conn.execute("DELETE FROM audit_log WHERE created_at < ?1", [cutoff])?;
    Ok(n)
}

pub fn list(conn: &Connection, limit: usize) -> Result<Vec<AuditEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, owner_id, actor_id, asset_count, details, created_at
         FROM audit_log ORDER BY created_at DESC, id DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map([limit as i64], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, i64>(3)?,
            row.get::<_, Option<String>>(4)?,
            row.get::<_, i64>(5)?,
        ))
    })?;
    let mut entries = Vec::new();
    for row in rows {
        let (id, owner_id, actor_id, asset_count, details, created_at) = row?;
        let details = details
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or(serde_json::Value::Null);
        entries.push(AuditEntry {
            id,
            owner_id,
            actor_id,
            asset_count,
            details,
            created_at,
        });
    }
    Ok(entries)
}

/// Drop the whole log table. Uninstall only.
pub fn drop_all(conn: &Connection) -> Result<()> {
    conn.execute_batch("DROP TABLE IF EXISTS audit_log")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn backdate(conn: &Connection, id: i64, days: i64) {
        conn.execute(
            "UPDATE audit_log SET created_at = ?1 WHERE id = ?2",
            params![now() - days * 86_400, id],
        )
        .unwrap();
    }

    #[test]
    fn records_and_lists_newest_first() {
        let conn = db::init_db(":memory:").unwrap();
        record_deletion(&conn, 1, 7, 3, 2, 1, "hello", "post").unwrap();
        record_skip(&conn, 1, 7, 5, Some("http://s/u/a.png"), SkipReason::AttachmentInUse)
            .unwrap();
        let entries = list(&conn, 10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].details["action"], "skipped");
        assert_eq!(entries[0].details["reason"], "attachment_in_use");
        assert_eq!(entries[1].asset_count, 3);
    }

    #[test]
    fn retention_purges_only_expired_entries() {
        let conn = db::init_db(":memory:").unwrap();
        record_deletion(&conn, 1, 7, 0, 0, 0, "a", "post").unwrap();
        record_deletion(&conn, 2, 7, 0, 0, 0, "b", "post").unwrap();
        backdate(&conn, 1, 10);
        backdate(&conn, 2, 40);
        assert_eq!(purge_older_than(&conn, 30).unwrap(), 1);
        let entries = list(&conn, 10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].owner_id, 1);
    }
}
