use crate::config::Config;
use crate::error::SweepError;
use crate::extract::{self, Candidate};
use crate::model::{Asset, BulkSkip, BulkSkipReason, BulkSummary};
use crate::{audit, files, scan, store};
use anyhow::Result;
use host_api::{Actor, Notification};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::collections::{HashMap, HashSet};
use tracing::{debug, error, info, warn};

/// Observer for post-deletion notices (admin banners, webhooks).
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Default notifier: structured log line per sweep.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, n: &Notification) {
        info!(
            owner_id = n.owner_id,
            assets = n.asset_count,
            deleted = n.deleted,
            skipped = n.skipped,
            "media sweep finished"
        );
    }
}

/// Orchestrates one deletion event: extract candidates, check liveness
/// per asset, delete the unreferenced ones, record the outcome.
///
/// The scan-then-delete sequence takes no lock; a reference written
/// concurrently between scan and delete goes undetected. Accepted race.
pub struct Sweeper<'a> {
    conn: &'a Connection,
    cfg: &'a Config,
    actor: Actor,
    // per-run memoized media counts, invalidated when an owner is swept
    counts: Mutex<HashMap<i64, usize>>,
    notifiers: Vec<Box<dyn Notifier>>,
}

impl<'a> Sweeper<'a> {
    pub fn new(conn: &'a Connection, cfg: &'a Config, actor: Actor) -> Self {
        Self {
            conn,
            cfg,
            actor,
            counts: Mutex::new(HashMap::new()),
            notifiers: vec![Box::new(LogNotifier)],
        }
    }

    pub fn add_notifier(&mut self, notifier: Box<dyn Notifier>) {
        self.notifiers.push(notifier);
    }

    /// Media count for the pre-deletion warning, memoized per owner.
    pub fn get_reference_count(&self, owner_id: i64) -> Result<usize> {
        if let Some(count) = self.counts.lock().get(&owner_id) {
            return Ok(*count);
        }
        let count = extract::count_media(self.conn, owner_id)?;
        self.counts.lock().insert(owner_id, count);
        Ok(count)
    }

    fn invalidate_count(&self, owner_id: i64) {
        self.counts.lock().remove(&owner_id);
    }

    /// Sweep the media of an owner that is being permanently removed.
    /// Revisions and autosaves never cascade; a missing owner is a no-op.
    pub fn process_owner_deletion(&self, owner_id: i64) -> Result<Option<Notification>> {
        let owner = match store::get_owner(self.conn, owner_id)? {
            Some(owner) => owner,
            None => {
                debug!(owner_id, "owner not found, nothing to sweep");
                return Ok(None);
            }
        };
        if owner.is_revision() || owner.is_autosave() {
            return Ok(None);
        }

        let asset_count = self.get_reference_count(owner_id)?;
        let mut candidates: Vec<Candidate> =
            extract::extract(self.conn, &owner)?.into_iter().collect();
        candidates.sort();

        let mut processed: HashSet<i64> = HashSet::new();
        let mut deleted = 0usize;
        let mut skipped = 0usize;

        for candidate in &candidates {
            let asset_id = match candidate {
                Candidate::Attachment(id) | Candidate::Field(id) | Candidate::Shortcode(id) => {
                    Some(*id)
                }
                Candidate::FieldUrl(url) | Candidate::Embedded(url) => {
                    match store::resolve_asset_by_url(self.conn, url)? {
                        Some(id) => Some(id),
                        None => {
                            self.delete_unresolved_url(url);
                            None
                        }
                    }
                }
            };
            let Some(asset_id) = asset_id else { continue };
            if !processed.insert(asset_id) {
                continue;
            }
            let asset = match store::get_asset(self.conn, asset_id)? {
                Some(asset) => asset,
                // gone at scan time, drop the candidate
                None => continue,
            };

            if scan::is_referenced_elsewhere(self.conn, asset_id, owner_id)? {
                skipped += 1;
                if let Err(err) = audit::record_skip(
                    self.conn,
                    owner_id,
                    self.actor.id,
                    asset_id,
                    Some(&asset.url),
                    candidate.skip_reason(),
                ) {
                    error!(asset_id, "recording skip failed: {err}");
                }
            } else {
                match self.delete_asset(&asset) {
                    Ok(()) => deleted += 1,
                    // best effort, continue with the next asset
                    Err(err) => error!(asset_id, "deleting asset failed: {err}"),
                }
            }
        }

        if let Err(err) = audit::record_deletion(
            self.conn,
            owner_id,
            self.actor.id,
            asset_count,
            deleted,
            skipped,
            &owner.title,
            &owner.owner_type,
        ) {
            error!(owner_id, "recording deletion summary failed: {err}");
        }
        self.invalidate_count(owner_id);

        let notification = Notification {
            owner_id,
            asset_count,
            deleted,
            skipped,
        };
        for notifier in &self.notifiers {
            notifier.notify(&notification);
        }
        Ok(Some(notification))
    }

    /// Soft-trash handler: runs the full sweep only when configured to.
    pub fn handle_trashed(&self, owner_id: i64) -> Result<Option<Notification>> {
        if !self.cfg.delete_on_trash {
            return Ok(None);
        }
        self.process_owner_deletion(owner_id)
    }

    /// Delete several owners with their media. Per-owner failures are
    /// recorded and never abort the batch.
    pub fn process_bulk_deletion(&self, owner_ids: &[i64]) -> BulkSummary {
        let mut summary = BulkSummary::default();
        for &owner_id in owner_ids {
            if !self.actor.can_delete_owner(owner_id) {
                summary.skipped += 1;
                summary.skipped_details.push(BulkSkip {
                    id: owner_id,
                    reason: BulkSkipReason::PermissionDenied,
                });
                continue;
            }
            match store::get_owner(self.conn, owner_id) {
                Ok(Some(_)) => {}
                Ok(None) => {
                    summary.skipped += 1;
                    summary.skipped_details.push(BulkSkip {
                        id: owner_id,
                        reason: BulkSkipReason::AlreadyDeleted,
                    });
                    continue;
                }
                Err(err) => {
                    error!(owner_id, "owner lookup failed: {err}");
                    summary.skipped += 1;
                    summary.skipped_details.push(BulkSkip {
                        id: owner_id,
                        reason: BulkSkipReason::DeletionFailed,
                    });
                    continue;
                }
            }
            match self.delete_owner_with_media(owner_id) {
                Ok(()) => summary.deleted += 1,
                Err(err) => {
                    error!(owner_id, "bulk deletion failed: {err}");
                    summary.skipped += 1;
                    summary.skipped_details.push(BulkSkip {
                        id: owner_id,
                        reason: BulkSkipReason::DeletionFailed,
                    });
                }
            }
        }
        summary
    }

    fn delete_owner_with_media(&self, owner_id: i64) -> Result<()> {
        self.process_owner_deletion(owner_id)?;
        self.clean_revisions(owner_id)?;
        store::delete_owner(self.conn, owner_id)?;
        Ok(())
    }

    /// Permanently drop revision children before their parent goes.
    pub fn clean_revisions(&self, owner_id: i64) -> Result<usize> {
        let owner = match store::get_owner(self.conn, owner_id)? {
            Some(owner) => owner,
            None => return Ok(0),
        };
        if !matches!(owner.owner_type.as_str(), "post" | "page") {
            return Ok(0);
        }
        let revisions = store::revisions_of(self.conn, owner_id)?;
        for revision_id in &revisions {
            store::delete_owner(self.conn, *revision_id)?;
        }
        Ok(revisions.len())
    }

    fn delete_asset(&self, asset: &Asset) -> std::result::Result<(), SweepError> {
        let path = std::path::Path::new(&asset.file_path);
        files::delete_file_and_variations(path).map_err(|source| SweepError::FileRemoval {
            path: asset.file_path.clone(),
            source,
        })?;
        store::delete_asset_record(self.conn, asset.id)?;
        debug!(asset_id = asset.id, "asset deleted");
        Ok(())
    }

    /// Fallback for URLs with no backing asset record: map the URL onto
    /// the upload tree and remove the file directly. A URL outside the
    /// tree, or a missing file, drops the candidate without a record.
    fn delete_unresolved_url(&self, url: &str) {
        let Some(path) = files::url_to_upload_path(&self.cfg.upload_dir, &self.cfg.upload_base_url, url)
        else {
            debug!(url, "url outside upload tree, candidate dropped");
            return;
        };
        match files::delete_file_and_variations(&path) {
            Ok(0) => debug!(url, "no file behind url, candidate dropped"),
            Ok(n) => info!(url, files = n, "removed files for unresolved url"),
            Err(err) => warn!(url, "fallback file removal failed: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::model::Owner;
    use std::sync::Arc;

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

    fn seed_owner(conn: &Connection, id: i64, owner_type: &str, title: &str) {
        store::insert_owner(
            conn,
            &Owner {
                id,
                parent_id: None,
                owner_type: owner_type.into(),
                status: "publish".into(),
                title: title.into(),
                body: String::new(),
                excerpt: String::new(),
                created_at: 0,
            },
        )
        .unwrap();
    }

    struct Recorder(Arc<Mutex<Vec<Notification>>>);

    impl Notifier for Recorder {
        fn notify(&self, n: &Notification) {
            self.0.lock().push(n.clone());
        }
    }

    #[test]
    fn revision_sweep_is_a_noop() {
        let conn = db::init_db(":memory:").unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let cfg = test_config(tmp.path());
        seed_owner(&conn, 1, "revision", "rev");
        let sweeper = Sweeper::new(&conn, &cfg, Actor::privileged(1));
        assert!(sweeper.process_owner_deletion(1).unwrap().is_none());
        assert!(audit::list(&conn, 10).unwrap().is_empty());
    }

    #[test]
    fn missing_owner_is_a_noop() {
        let conn = db::init_db(":memory:").unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let cfg = test_config(tmp.path());
        let sweeper = Sweeper::new(&conn, &cfg, Actor::privileged(1));
        assert!(sweeper.process_owner_deletion(99).unwrap().is_none());
    }

    #[test]
    fn trash_is_gated_by_config() {
        let conn = db::init_db(":memory:").unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = test_config(tmp.path());
        seed_owner(&conn, 1, "post", "p");
        {
            let sweeper = Sweeper::new(&conn, &cfg, Actor::privileged(1));
            assert!(sweeper.handle_trashed(1).unwrap().is_none());
            assert!(audit::list(&conn, 10).unwrap().is_empty());
        }
        cfg.delete_on_trash = true;
        let sweeper = Sweeper::new(&conn, &cfg, Actor::privileged(1));
        assert!(sweeper.handle_trashed(1).unwrap().is_some());
        assert_eq!(audit::list(&conn, 10).unwrap().len(), 1);
    }

    #[test]
    fn notifiers_observe_the_summary() {
        let conn = db::init_db(":memory:").unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let cfg = test_config(tmp.path());
        seed_owner(&conn, 1, "post", "p");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut sweeper = Sweeper::new(&conn, &cfg, Actor::privileged(1));
        sweeper.add_notifier(Box::new(Recorder(seen.clone())));
        sweeper.process_owner_deletion(1).unwrap();
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].owner_id, 1);
    }

    #[test]
    fn count_cache_invalidates_after_sweep() {
        let conn = db::init_db(":memory:").unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let cfg = test_config(tmp.path());
        seed_owner(&conn, 1, "post", "p");
        store::set_field(&conn, 1, "hero", &serde_json::json!(42)).unwrap();
        let sweeper = Sweeper::new(&conn, &cfg, Actor::privileged(1));
        assert_eq!(sweeper.get_reference_count(1).unwrap(), 1);
        sweeper.process_owner_deletion(1).unwrap();
        store::delete_owner(&conn, 1).unwrap();
        seed_owner(&conn, 1, "post", "p2");
        assert_eq!(sweeper.get_reference_count(1).unwrap(), 0);
    }

    #[test]
    fn skip_reason_comes_from_earliest_provenance() {
        let conn = db::init_db(":memory:").unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let cfg = test_config(tmp.path());
        // asset 11 is both a parented attachment and a shortcode target
        store::insert_owner(
            &conn,
            &Owner {
                id: 1,
                parent_id: None,
                owner_type: "post".into(),
                status: "publish".into(),
                title: "p".into(),
                body: r#"[gallery ids="11"]"#.into(),
                excerpt: String::new(),
                created_at: 0,
            },
        )
        .unwrap();
        store::insert_asset(
            &conn,
            &Asset {
                id: 11,
                parent_id: Some(1),
                url: "http://s/uploads/shared.png".into(),
                file_path: tmp.path().join("shared.png").to_string_lossy().into_owned(),
                mime: None,
                status: "inherit".into(),
                created_at: 0,
            },
        )
        .unwrap();
        store::insert_owner(
            &conn,
            &Owner {
                id: 2,
                parent_id: None,
                owner_type: "post".into(),
                status: "publish".into(),
                title: "q".into(),
                body: "keeps http://s/uploads/shared.png around".into(),
                excerpt: String::new(),
                created_at: 0,
            },
        )
        .unwrap();

        let sweeper = Sweeper::new(&conn, &cfg, Actor::privileged(1));
        let summary = sweeper.process_owner_deletion(1).unwrap().unwrap();
        assert_eq!(summary.skipped, 1);
        let entries = audit::list(&conn, 10).unwrap();
        let skip = entries
            .iter()
            .find(|e| e.details["action"] == "skipped")
            .unwrap();
        assert_eq!(skip.details["reason"], "attachment_in_use");
    }

    #[test]
    fn clean_revisions_only_touches_post_like_owners() {
        let conn = db::init_db(":memory:").unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let cfg = test_config(tmp.path());
        seed_owner(&conn, 1, "post", "p");
        store::insert_owner(
            &conn,
            &Owner {
                id: 2,
                parent_id: Some(1),
                owner_type: "revision".into(),
                status: "inherit".into(),
                title: "rev".into(),
                body: String::new(),
                excerpt: String::new(),
                created_at: 0,
            },
        )
        .unwrap();
        let sweeper = Sweeper::new(&conn, &cfg, Actor::privileged(1));
        assert_eq!(sweeper.clean_revisions(1).unwrap(), 1);
        assert!(store::get_owner(&conn, 2).unwrap().is_none());
    }
}
