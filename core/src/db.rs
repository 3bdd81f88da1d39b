use anyhow::{Context, Result};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::Path;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Open a single connection and run migrations. Used by tests and
/// one-shot CLI commands.
pub fn init_db<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch(SCHEMA).context("creating sweep tables")?;
    Ok(conn)
}

/// Open a pooled store for long-running use (maintenance scheduler).
pub fn open_pool<P: AsRef<Path>>(path: P) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(path.as_ref());
    let pool = Pool::new(manager)?;
    pool.get()?
        .execute_batch(SCHEMA)
        .context("creating sweep tables")?;
    Ok(pool)
}

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS owners (
  id INTEGER PRIMARY KEY,
  parent_id INTEGER REFERENCES owners(id),
  owner_type TEXT NOT NULL DEFAULT 'post',
  status TEXT NOT NULL DEFAULT 'publish',
  title TEXT NOT NULL DEFAULT '',
  body TEXT NOT NULL DEFAULT '',
  excerpt TEXT NOT NULL DEFAULT '',
  created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS owner_fields (
  owner_id INTEGER NOT NULL,
  name TEXT NOT NULL,
  value TEXT NOT NULL,
  PRIMARY KEY (owner_id, name)
);

CREATE TABLE IF NOT EXISTS assets (
  id INTEGER PRIMARY KEY,
  parent_id INTEGER,
  url TEXT NOT NULL,
  file_path TEXT NOT NULL,
  mime TEXT,
  status TEXT NOT NULL DEFAULT 'inherit',
  created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS assets_parent ON assets(parent_id);
CREATE INDEX IF NOT EXISTS assets_url ON assets(url);

CREATE TABLE IF NOT EXISTS featured_images (
  owner_id INTEGER PRIMARY KEY,
  asset_id INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS term_meta (
  term_id INTEGER NOT NULL,
  name TEXT NOT NULL,
  value TEXT NOT NULL,
  PRIMARY KEY (term_id, name)
);

CREATE TABLE IF NOT EXISTS settings (
  name TEXT PRIMARY KEY,
  value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS audit_log (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  owner_id INTEGER NOT NULL,
  actor_id INTEGER NOT NULL,
  asset_count INTEGER NOT NULL DEFAULT 0,
  details TEXT,
  created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS audit_owner ON audit_log(owner_id);
CREATE INDEX IF NOT EXISTS audit_actor ON audit_log(actor_id);
CREATE INDEX IF NOT EXISTS audit_created ON audit_log(created_at);
"#;
