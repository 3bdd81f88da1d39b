use crate::db::DbPool;
use crate::{audit, store};
use anyhow::Result;
use rusqlite::Connection;
use tokio::time::{interval, Duration};
use tracing::{error, info};

/// Outcome of one maintenance pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionReport {
    pub purged_entries: usize,
    pub orphaned_fields: usize,
}

/// Purge audit entries past the retention window and drop field rows
/// whose owner is gone.
pub fn run_retention_sweep(conn: &Connection, retention_days: u64) -> Result<RetentionReport> {
    let purged_entries = audit::purge_older_than(conn, retention_days)?;
    let orphaned_fields = store::delete_orphaned_fields(conn)?;
    info!(purged_entries, orphaned_fields, "retention sweep finished");
    Ok(RetentionReport {
        purged_entries,
        orphaned_fields,
    })
}

/// Run the retention sweep once a day until the task is dropped.
pub fn spawn_daily(pool: DbPool, retention_days: u64) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(Duration::from_secs(86_400));
        loop {
            tick.tick().await;
            match pool.get() {
                Ok(conn) => {
                    if let Err(err) = run_retention_sweep(&conn, retention_days) {
                        error!("retention sweep failed: {err}");
                    }
                }
                Err(err) => error!("store unavailable for maintenance: {err}"),
            }
        }
    })
}
