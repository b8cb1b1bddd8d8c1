use std::sync::Arc;

use tokio::{select, sync::watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::HistoryRecord;

use super::{HistoryStore, Result};

// HistoryFeed

/// History store paired with a revision counter bumped on every append.
///
/// Clones share the same store and counter.
pub struct HistoryFeed<STORE: HistoryStore> {
    revision: Arc<watch::Sender<u64>>,
    store: Arc<STORE>,
}

impl<STORE: HistoryStore> HistoryFeed<STORE> {
    pub fn new(store: STORE) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            revision: Arc::new(revision),
            store: Arc::new(store),
        }
    }

    #[instrument(skip(self, record), fields(record.id = %record.id))]
    pub async fn append(&self, record: &HistoryRecord) -> Result {
        self.store.append(record).await?;
        self.revision.send_modify(|rev| *rev += 1);
        debug!("history revision bumped");
        Ok(())
    }

    /// Newest-first records, or an empty list if the store can't be read.
    pub async fn recent(&self, limit: usize) -> Vec<HistoryRecord> {
        recent_or_empty(self.store.as_ref(), limit).await
    }

    pub fn subscribe(&self, limit: usize) -> Subscription<STORE> {
        debug!(limit, "new history subscription");
        Subscription {
            limit,
            primed: false,
            revision: self.revision.subscribe(),
            store: self.store.clone(),
            token: CancellationToken::new(),
        }
    }
}

impl<STORE: HistoryStore> Clone for HistoryFeed<STORE> {
    fn clone(&self) -> Self {
        Self {
            revision: self.revision.clone(),
            store: self.store.clone(),
        }
    }
}

// Subscription

/// Live view of the newest records of a feed.
///
/// The first call to [`Subscription::next`] yields the current snapshot, the
/// following ones wait for an append. Appends made while no call is pending
/// are coalesced into one snapshot.
pub struct Subscription<STORE: HistoryStore> {
    limit: usize,
    primed: bool,
    revision: watch::Receiver<u64>,
    store: Arc<STORE>,
    token: CancellationToken,
}

impl<STORE: HistoryStore> Subscription<STORE> {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Token that cancels this subscription from another task.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Returns `None` once the subscription is cancelled or every feed is dropped.
    pub async fn next(&mut self) -> Option<Vec<HistoryRecord>> {
        if self.token.is_cancelled() {
            return None;
        }
        if self.primed {
            let changed = select! {
                _ = self.token.cancelled() => {
                    debug!("history subscription cancelled");
                    false
                }
                res = self.revision.changed() => {
                    if res.is_err() {
                        debug!("history feed closed");
                    }
                    res.is_ok()
                }
            };
            if !changed {
                return None;
            }
        } else {
            self.primed = true;
            self.revision.borrow_and_update();
        }
        Some(recent_or_empty(self.store.as_ref(), self.limit).await)
    }
}

// Functions

async fn recent_or_empty<STORE: HistoryStore>(store: &STORE, limit: usize) -> Vec<HistoryRecord> {
    store.recent(limit).await.unwrap_or_else(|err| {
        warn!("failed to fetch history: {err}");
        vec![]
    })
}

// Tests
