use thiserror::Error;

/// Failures the sweep engine distinguishes. Expected conditions
/// (missing candidates, still-live references, per-item permission
/// misses) are recorded as skip outcomes and never surface through here.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("owner {0} not found")]
    OwnerNotFound(i64),
    #[error("store write failed: {0}")]
    StoreWrite(#[from] rusqlite::Error),
    #[error("file removal failed for {path}: {source}")]
    FileRemoval {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
