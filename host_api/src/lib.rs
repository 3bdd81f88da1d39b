use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Lifecycle events a host platform raises towards the sweep engine.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    /// An owner is about to be permanently removed.
    BeforePermanentDelete { owner_id: i64 },
    /// An owner was soft-deleted (moved to trash).
    Trashed { owner_id: i64 },
    /// A bulk "delete with media" action was requested.
    BulkDelete { owner_ids: Vec<i64> },
    /// Recurring daily maintenance tick.
    DailyMaintenance,
    /// The engine is being removed from the host entirely.
    Uninstall { keep_audit_log: bool },
}

/// Capabilities the host grants to an acting user.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    DeleteOwners,
    ViewAuditLog,
}

/// The user on whose behalf a deletion runs, with the grants the host
/// resolved for them. `owner_grants` of `None` means every owner is
/// deletable; `Some(set)` restricts deletion to the listed owners.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: i64,
    pub capabilities: HashSet<Capability>,
    #[serde(default)]
    pub owner_grants: Option<HashSet<i64>>,
}

impl Actor {
    pub fn new(id: i64, capabilities: HashSet<Capability>) -> Self {
        Self {
            id,
            capabilities,
            owner_grants: None,
        }
    }

    /// An actor holding every capability, as used by operator tooling.
    pub fn privileged(id: i64) -> Self {
        Self::new(
            id,
            [Capability::DeleteOwners, Capability::ViewAuditLog]
                .into_iter()
                .collect(),
        )
    }

    pub fn can(&self, cap: Capability) -> bool {
        self.capabilities.contains(&cap)
    }

    /// Whether this actor may delete the given owner.
    pub fn can_delete_owner(&self, owner_id: i64) -> bool {
        self.can(Capability::DeleteOwners)
            && self
                .owner_grants
                .as_ref()
                .map_or(true, |grants| grants.contains(&owner_id))
    }
}

/// Summary of one sweep, handed back to the host for admin notices.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Notification {
    pub owner_id: i64,
    pub asset_count: usize,
    pub deleted: usize,
    pub skipped: usize,
}
