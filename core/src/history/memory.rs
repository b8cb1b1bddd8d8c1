use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::HistoryRecord;

use super::{newest_first, HistoryStore, Result};

// InMemoryHistoryStore

/// Process-local store, lost on exit.
#[derive(Debug, Default)]
pub struct InMemoryHistoryStore(RwLock<Vec<HistoryRecord>>);

impl HistoryStore for InMemoryHistoryStore {
    #[instrument(skip(self, record), fields(record.id = %record.id))]
    async fn append(&self, record: &HistoryRecord) -> Result {
        debug!("appending record");
        self.0.write().await.push(record.clone());
        Ok(())
    }

    #[instrument(skip(self))]
    async fn recent(&self, limit: usize) -> Result<Vec<HistoryRecord>> {
        debug!("fetching recent records");
        // reversed first so that ties on timestamp keep the latest append on top
        let mut records: Vec<HistoryRecord> = self.0.read().await.iter().rev().cloned().collect();
        newest_first(&mut records);
        records.truncate(limit);
        Ok(records)
    }
}

// Tests
