use crate::config::Config;
use crate::maintenance::{self, RetentionReport};
use crate::model::BulkSummary;
use crate::setup;
use crate::sweep::Sweeper;
use anyhow::Result;
use host_api::{HostEvent, Notification};
use rusqlite::Connection;

/// What a dispatched host event produced.
#[derive(Debug)]
pub enum HookOutcome {
    None,
    Swept(Notification),
    Bulk(BulkSummary),
    Retention(RetentionReport),
}

/// Thin adapter binding host platform events to engine entry points.
/// Explicit registration instead of ambient hook tables: the host
/// constructs one registry per request and dispatches into it.
pub struct HookRegistry<'a> {
    conn: &'a Connection,
    cfg: &'a Config,
    sweeper: &'a Sweeper<'a>,
}

impl<'a> HookRegistry<'a> {
    pub fn new(conn: &'a Connection, cfg: &'a Config, sweeper: &'a Sweeper<'a>) -> Self {
        Self { conn, cfg, sweeper }
    }

    pub fn dispatch(&self, event: &HostEvent) -> Result<HookOutcome> {
        match event {
            HostEvent::BeforePermanentDelete { owner_id } => Ok(self
                .sweeper
                .process_owner_deletion(*owner_id)?
                .map_or(HookOutcome::None, HookOutcome::Swept)),
            HostEvent::Trashed { owner_id } => Ok(self
                .sweeper
                .handle_trashed(*owner_id)?
                .map_or(HookOutcome::None, HookOutcome::Swept)),
            HostEvent::BulkDelete { owner_ids } => Ok(HookOutcome::Bulk(
                self.sweeper.process_bulk_deletion(owner_ids),
            )),
            HostEvent::DailyMaintenance => Ok(HookOutcome::Retention(
                maintenance::run_retention_sweep(self.conn, self.cfg.retention_days)?,
            )),
            HostEvent::Uninstall { keep_audit_log } => {
                setup::purge_all(self.conn, *keep_audit_log)?;
                Ok(HookOutcome::None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Owner;
    use crate::{db, store};
    use host_api::Actor;

    fn test_config(dir: &std::path::Path) -> Config {
        Config {
            data_dir: dir.to_path_buf(),
            upload_dir: dir.join("uploads"),
            upload_base_url: "http://s/uploads".into(),
            delete_on_trash: false,
            keep_audit_log_on_uninstall: false,
            retention_days: 30,
            logging_enabled: false,
        }
    }

    #[test]
    fn dispatches_each_event_kind() {
        let conn = db::init_db(":memory:").unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let cfg = test_config(tmp.path());
        store::insert_owner(
            &conn,
            &Owner {
                id: 1,
                parent_id: None,
                owner_type: "post".into(),
                status: "publish".into(),
                title: "p".into(),
                body: String::new(),
                excerpt: String::new(),
                created_at: 0,
            },
        )
        .unwrap();
        let sweeper = Sweeper::new(&conn, &cfg, Actor::privileged(1));
        let hooks = HookRegistry::new(&conn, &cfg, &sweeper);

        // trash is not opted in, so nothing happens
        let outcome = hooks.dispatch(&HostEvent::Trashed { owner_id: 1 }).unwrap();
        assert!(matches!(outcome, HookOutcome::None));

        let outcome = hooks
            .dispatch(&HostEvent::BeforePermanentDelete { owner_id: 1 })
            .unwrap();
        assert!(matches!(outcome, HookOutcome::Swept(_)));

        let outcome = hooks.dispatch(&HostEvent::DailyMaintenance).unwrap();
        assert!(matches!(outcome, HookOutcome::Retention(_)));

        let outcome = hooks
            .dispatch(&HostEvent::BulkDelete { owner_ids: vec![1] })
            .unwrap();
        match outcome {
            HookOutcome::Bulk(summary) => assert_eq!(summary.deleted, 1),
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}
