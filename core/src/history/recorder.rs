use tokio::task::JoinHandle;
use tracing::{debug, info_span, warn, Instrument};

use crate::HistoryRecord;

use super::{feed::HistoryFeed, HistoryStore};

// Functions

/// Appends a generated password to the feed in a detached task.
///
/// A failed append is logged and dropped. The returned handle only exists
/// for callers (mostly tests) that want to wait for the write.
pub fn record_detached<STORE: HistoryStore + 'static>(
    feed: &HistoryFeed<STORE>,
    password: String,
) -> JoinHandle<()> {
    let feed = feed.clone();
    let record = HistoryRecord::generated(password);
    let span = info_span!("record_history", record.id = %record.id);
    tokio::spawn(
        async move {
            match feed.append(&record).await {
                Ok(()) => debug!("password recorded"),
                Err(err) => warn!("failed to record password: {err}"),
            }
        }
        .instrument(span),
    )
}

// Tests
