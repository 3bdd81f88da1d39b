use serde::{Deserialize, Serialize};

/// Marker the host embeds in the title of autosave revisions.
pub const AUTOSAVE_MARKER: &str = "autosave-v";

/// A content record that may reference media assets.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Owner {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub owner_type: String,
    pub status: String,
    pub title: String,
    pub body: String,
    pub excerpt: String,
    pub created_at: i64,
}

impl Owner {
    pub fn is_revision(&self) -> bool {
        self.owner_type == "revision"
    }

    pub fn is_autosave(&self) -> bool {
        self.is_revision() && self.title.contains(AUTOSAVE_MARKER)
    }
}

/// A stored media file plus its metadata row.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Asset {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub url: String,
    pub file_path: String,
    pub mime: Option<String>,
    pub status: String,
    pub created_at: i64,
}

/// Why an individual asset was left alone during a sweep.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    AttachmentInUse,
    AcfFieldInUse,
    EmbeddedInUse,
    ShortcodeInUse,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::AttachmentInUse => "attachment_in_use",
            SkipReason::AcfFieldInUse => "acf_field_in_use",
            SkipReason::EmbeddedInUse => "embedded_in_use",
            SkipReason::ShortcodeInUse => "shortcode_in_use",
        }
    }
}

/// Why a whole owner was skipped during a bulk deletion.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BulkSkipReason {
    PermissionDenied,
    AlreadyDeleted,
    DeletionFailed,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct BulkSkip {
    pub id: i64,
    pub reason: BulkSkipReason,
}

/// Outcome of `process_bulk_deletion`.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct BulkSummary {
    pub deleted: usize,
    pub skipped: usize,
    pub skipped_details: Vec<BulkSkip>,
}

/// One immutable row of the audit log.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub id: i64,
    pub owner_id: i64,
    pub actor_id: i64,
    pub asset_count: i64,
    pub details: serde_json::Value,
    pub created_at: i64,
}
