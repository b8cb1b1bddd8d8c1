use std::future::Future;

use crate::HistoryRecord;

// Mods

pub mod feed;
pub mod memory;
pub mod recorder;
pub mod sqlite;

// Types

pub type Result<VALUE = ()> = std::result::Result<VALUE, Error>;

// Error

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid record id: {0}")]
    InvalidId(
        #[from]
        #[source]
        uuid::Error,
    ),
    #[error("invalid record timestamp: {0}")]
    InvalidTimestamp(i64),
    #[error("task failed: {0}")]
    Join(
        #[from]
        #[source]
        tokio::task::JoinError,
    ),
    #[error("history database lock is poisoned")]
    Poisoned,
    #[error("sqlite error: {0}")]
    Sqlite(
        #[from]
        #[source]
        rusqlite::Error,
    ),
    #[error("unknown record type `{0}`")]
    UnknownKind(String),
}

// Traits

/// Append-only log of history records.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
pub trait HistoryStore: Send + Sync {
    fn append(&self, record: &HistoryRecord) -> impl Future<Output = Result> + Send;

    /// Returns at most `limit` records, newest first.
    fn recent(&self, limit: usize) -> impl Future<Output = Result<Vec<HistoryRecord>>> + Send;
}

// Functions

pub(crate) fn newest_first(records: &mut [HistoryRecord]) {
    records.sort_by(|left, right| right.created_at.cmp(&left.created_at));
}
