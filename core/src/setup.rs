use crate::db::SCHEMA;
use crate::{audit, store};
use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::info;

pub const SCHEMA_VERSION: &str = "2.0.0";
const VERSION_SETTING: &str = "sweep_schema_version";

/// One-time setup. Table creation failures are fatal and abort
/// initialization; everything later degrades per-item instead.
pub fn activate(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA).context("creating sweep tables")?;
    store::set_setting(conn, VERSION_SETTING, SCHEMA_VERSION)?;
    Ok(())
}

/// Re-run migrations when the stored schema version lags behind.
pub fn version_check(conn: &Connection) -> Result<()> {
    let stored = store::get_setting(conn, VERSION_SETTING)?;
    if stored.as_deref() != Some(SCHEMA_VERSION) {
        conn.execute_batch(SCHEMA).context("upgrading sweep tables")?;
        store::set_setting(conn, VERSION_SETTING, SCHEMA_VERSION)?;
        info!(from = stored.as_deref().unwrap_or("none"), to = SCHEMA_VERSION, "schema upgraded");
    }
    Ok(())
}

/// Full uninstall: remove engine settings and transient entries; the
/// audit log is dropped or retained per the persisted user choice.
pub fn purge_all(conn: &Connection, keep_audit_log: bool) -> Result<()> {
    for name in [VERSION_SETTING, "sweep_delete_on_trash", "sweep_keep_audit_log"] {
        store::delete_setting(conn, name)?;
    }
    conn.execute(
        "DELETE FROM settings WHERE name LIKE 'transient_sweep_%'",
        [],
    )?;
    if !keep_audit_log {
        audit::drop_all(conn)?;
    }
    info!(keep_audit_log, "engine state purged");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn has_audit_table(conn: &Connection) -> bool {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='audit_log'",
            [],
            |row| row.get::<_, i64>(0),
        )
        .unwrap()
            == 1
    }

    #[test]
    fn activate_stores_schema_version() {
        let conn = db::init_db(":memory:").unwrap();
        activate(&conn).unwrap();
        assert_eq!(
            store::get_setting(&conn, VERSION_SETTING).unwrap().as_deref(),
            Some(SCHEMA_VERSION)
        );
    }

    #[test]
    fn version_check_upgrades_stale_schema() {
        let conn = db::init_db(":memory:").unwrap();
        store::set_setting(&conn, VERSION_SETTING, "1.0.0").unwrap();
        version_check(&conn).unwrap();
        assert_eq!(
            store::get_setting(&conn, VERSION_SETTING).unwrap().as_deref(),
            Some(SCHEMA_VERSION)
        );
    }

    #[test]
    fn uninstall_honours_audit_log_choice() {
        let conn = db::init_db(":memory:").unwrap();
        activate(&conn).unwrap();
        store::set_setting(&conn, "transient_sweep_counts", "x").unwrap();
        purge_all(&conn, true).unwrap();
        assert!(has_audit_table(&conn));
        assert!(store::get_setting(&conn, "transient_sweep_counts").unwrap().is_none());
        assert!(store::get_setting(&conn, VERSION_SETTING).unwrap().is_none());

        purge_all(&conn, false).unwrap();
        assert!(!has_audit_table(&conn));
    }
}
