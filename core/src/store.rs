use crate::model::{Asset, Owner};
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

fn row_to_owner(row: &rusqlite::Row<'_>) -> rusqlite::Result<Owner> {
    Ok(Owner {
        id: row.get(0)?,
        parent_id: row.get(1)?,
        owner_type: row.get(2)?,
        status: row.get(3)?,
        title: row.get(4)?,
        body: row.get(5)?,
        excerpt: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn row_to_asset(row: &rusqlite::Row<'_>) -> rusqlite::Result<Asset> {
    Ok(Asset {
        id: row.get(0)?,
        parent_id: row.get(1)?,
        url: row.get(2)?,
        file_path: row.get(3)?,
        mime: row.get(4)?,
        status: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub fn get_owner(conn: &Connection, id: i64) -> Result<Option<Owner>> {
    let mut stmt = conn.prepare(
        "SELECT id, parent_id, owner_type, status, title, body, excerpt, created_at
         FROM owners WHERE id = ?1",
    )?;
    Ok(stmt.query_row([id], row_to_owner).optional()?)
}

pub fn insert_owner(conn: &Connection, owner: &Owner) -> Result<()> {
    conn.execute(
        "INSERT INTO owners (id, parent_id, owner_type, status, title, body, excerpt, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            owner.id,
            owner.parent_id,
            owner.owner_type,
            owner.status,
            owner.title,
            owner.body,
            owner.excerpt,
            owner.created_at
        ],
    )?;
    Ok(())
}

/// Remove an owner record together with its field bag and its
/// representative-image pointer.
pub fn delete_owner(conn: &Connection, id: i64) -> Result<()> {
    conn.execute("DELETE FROM owner_fields WHERE owner_id = ?1", [id])?;
    conn.execute("DELETE FROM featured_images WHERE owner_id = ?1", [id])?;
    conn.execute("DELETE FROM owners WHERE id = ?1", [id])?;
    Ok(())
}

/// Ids of revision children of an owner, autosaves included.
pub fn revisions_of(conn: &Connection, owner_id: i64) -> Result<Vec<i64>> {
    let mut stmt =
        conn.prepare("SELECT id FROM owners WHERE parent_id = ?1 AND owner_type = 'revision'")?;
    let ids = stmt
        .query_map([owner_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;
    Ok(ids)
}

/// All assets parented to an owner, regardless of status. A previously
/// trashed attachment still has to be swept with its parent.
pub fn assets_by_parent(conn: &Connection, owner_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT id FROM assets WHERE parent_id = ?1")?;
    let ids = stmt
        .query_map([owner_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;
    Ok(ids)
}

pub fn get_asset(conn: &Connection, id: i64) -> Result<Option<Asset>> {
    let mut stmt = conn.prepare(
        "SELECT id, parent_id, url, file_path, mime, status, created_at
         FROM assets WHERE id = ?1",
    )?;
    Ok(stmt.query_row([id], row_to_asset).optional()?)
}

pub fn asset_url(conn: &Connection, id: i64) -> Result<Option<String>> {
    let mut stmt = conn.prepare("SELECT url FROM assets WHERE id = ?1")?;
    Ok(stmt.query_row([id], |row| row.get(0)).optional()?)
}

/// Map a full URL back to a stored asset id, if any.
pub fn resolve_asset_by_url(conn: &Connection, url: &str) -> Result<Option<i64>> {
    let mut stmt = conn.prepare("SELECT id FROM assets WHERE url = ?1")?;
    Ok(stmt.query_row([url], |row| row.get(0)).optional()?)
}

pub fn insert_asset(conn: &Connection, asset: &Asset) -> Result<()> {
    conn.execute(
        "INSERT INTO assets (id, parent_id, url, file_path, mime, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            asset.id,
            asset.parent_id,
            asset.url,
            asset.file_path,
            asset.mime,
            asset.status,
            asset.created_at
        ],
    )?;
    Ok(())
}

pub fn delete_asset_record(conn: &Connection, id: i64) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM assets WHERE id = ?1", [id])?;
    Ok(())
}

/// Load the visible structured-field bag for an owner. Values are stored
/// as text; JSON documents come back nested, anything else stays a string
/// scalar. Internal fields (leading underscore) are not part of the bag.
pub fn structured_fields(conn: &Connection, owner_id: i64) -> Result<serde_json::Map<String, Value>> {
    let mut stmt = conn.prepare(
        r"SELECT name, value FROM owner_fields
          WHERE owner_id = ?1 AND name NOT LIKE '\_%' ESCAPE '\'",
    )?;
    let rows = stmt.query_map([owner_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    let mut map = serde_json::Map::new();
    for row in rows {
        let (name, raw) = row?;
        let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
        map.insert(name, value);
    }
    Ok(map)
}

/// Store one structured field. Strings are stored raw so substring scans
/// see the same text the editor saved; everything else is stored as JSON.
pub fn set_field(conn: &Connection, owner_id: i64, name: &str, value: &Value) -> Result<()> {
    let raw = match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other)?,
    };
    conn.execute(
        "INSERT INTO owner_fields (owner_id, name, value) VALUES (?1, ?2, ?3)
         ON CONFLICT(owner_id, name) DO UPDATE SET value = excluded.value",
        params![owner_id, name, raw],
    )?;
    Ok(())
}

pub fn set_featured_image(conn: &Connection, owner_id: i64, asset_id: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO featured_images (owner_id, asset_id) VALUES (?1, ?2)
         ON CONFLICT(owner_id) DO UPDATE SET asset_id = excluded.asset_id",
        params![owner_id, asset_id],
    )?;
    Ok(())
}

pub fn set_term_meta(conn: &Connection, term_id: i64, name: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO term_meta (term_id, name, value) VALUES (?1, ?2, ?3)
         ON CONFLICT(term_id, name) DO UPDATE SET value = excluded.value",
        params![term_id, name, value],
    )?;
    Ok(())
}

pub fn get_setting(conn: &Connection, name: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare("SELECT value FROM settings WHERE name = ?1")?;
    Ok(stmt.query_row([name], |row| row.get(0)).optional()?)
}

pub fn set_setting(conn: &Connection, name: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO settings (name, value) VALUES (?1, ?2)
         ON CONFLICT(name) DO UPDATE SET value = excluded.value",
        params![name, value],
    )?;
    Ok(())
}

pub fn delete_setting(conn: &Connection, name: &str) -> Result<()> {
    conn.execute("DELETE FROM settings WHERE name = ?1", [name])?;
    Ok(())
}

/// Drop field rows whose owner no longer exists.
pub fn delete_orphaned_fields(conn: &Connection) -> Result<usize> {
    let n = conn.execute(
        "DELETE FROM owner_fields WHERE owner_id NOT IN (SELECT id FROM owners)",
        [],
    )?;
    Ok(n)
}
