use crate::store;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Params};

// Queries must project `SELECT 1` so the probe column is always integer.
fn exists<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<bool> {
    let mut stmt = conn.prepare(sql)?;
    let hit: Option<i64> = stmt.query_row(params, |row| row.get(0)).optional()?;
    Ok(hit.is_some())
}

/// Escape a value for use inside a LIKE pattern with ESCAPE '\'.
fn like_pattern(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    format!("%{escaped}%")
}

fn basename(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

/// Whether any live owner other than `excluding_owner_id` still references
/// the asset. Five targeted existence checks, cheapest first, short-circuit
/// on the first hit. The textual checks are substring matches and can
/// over-match (a numeric collision keeps the asset); that is the intended
/// failure direction — when in doubt the file stays.
///
/// An asset whose URL cannot be resolved has nothing to protect and
/// reports unreferenced immediately.
pub fn is_referenced_elsewhere(
    conn: &Connection,
    asset_id: i64,
    excluding_owner_id: i64,
) -> Result<bool> {
    let url = match store::asset_url(conn, asset_id)? {
        Some(url) => url,
        None => return Ok(false),
    };

    // 1. representative image of another live owner
    if exists(
        conn,
        "SELECT 1 FROM featured_images f
         JOIN owners o ON o.id = f.owner_id
         WHERE f.asset_id = ?1
           AND f.owner_id != ?2
           AND o.owner_type != 'revision'
           AND o.status NOT IN ('inherit', 'auto-draft')
         LIMIT 1",
        params![asset_id, excluding_owner_id],
    )? {
        return Ok(true);
    }

    // 2. URL or bare filename inside body/excerpt text; the filename arm
    //    covers relative and CDN-rewritten embeds
    let url_like = like_pattern(&url);
    let name_like = like_pattern(basename(&url));
    if exists(
        conn,
        r"SELECT 1 FROM owners
          WHERE (body LIKE ?1 ESCAPE '\' OR body LIKE ?2 ESCAPE '\'
                 OR excerpt LIKE ?1 ESCAPE '\' OR excerpt LIKE ?2 ESCAPE '\')
            AND id != ?3
            AND owner_type != 'revision'
            AND status NOT IN ('inherit', 'auto-draft')
          LIMIT 1",
        params![url_like, name_like, excluding_owner_id],
    )? {
        return Ok(true);
    }

    // 3. structured fields: raw id, quoted id inside a serialized value,
    //    or the full URL; hidden fields don't count
    let quoted_like = like_pattern(&format!("\"{asset_id}\""));
    if exists(
        conn,
        r"SELECT 1 FROM owner_fields f
          JOIN owners o ON o.id = f.owner_id
          WHERE (f.value = ?1 OR f.value LIKE ?2 ESCAPE '\' OR f.value LIKE ?3 ESCAPE '\')
            AND f.owner_id != ?4
            AND f.name NOT LIKE '\_%' ESCAPE '\'
            AND o.owner_type != 'revision'
            AND o.status NOT IN ('inherit', 'auto-draft')
          LIMIT 1",
        params![asset_id.to_string(), quoted_like, url_like, excluding_owner_id],
    )? {
        return Ok(true);
    }

    // 4. taxonomy term images; owner-agnostic by nature
    if exists(
        conn,
        "SELECT 1 FROM term_meta
         WHERE name IN ('thumbnail_id', 'image') AND value = ?1
         LIMIT 1",
        [asset_id.to_string()],
    )? {
        return Ok(true);
    }

    // 5. site-wide settings (logo, header image), transient entries ignored
    if exists(
        conn,
        "SELECT 1 FROM settings
         WHERE value = ?1 AND name NOT LIKE '%transient%'
         LIMIT 1",
        [asset_id.to_string()],
    )? {
        return Ok(true);
    }

    Ok(false)
}
