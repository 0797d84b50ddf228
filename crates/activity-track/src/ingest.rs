//! `POST /track`: validate, acknowledge, then persist in the background.

use crate::dead_letter::{DeadLetter, DeadLetterSink};
use crate::event::parse_batch;
use crate::storage::Store;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;
use track_agent::EventRecord;

/// Shared state of the ingestion endpoint
#[derive(Clone)]
pub struct IngestState {
    store: Arc<dyn Store>,
    dead_letter: Arc<DeadLetterSink>,
    pending: Arc<PendingWrites>,
}

impl IngestState {
    pub fn new(store: Arc<dyn Store>, dead_letter: DeadLetterSink) -> Self {
        Self {
            store,
            dead_letter: Arc::new(dead_letter),
            pending: Arc::new(PendingWrites::default()),
        }
    }

    /// Number of acknowledged batches not yet persisted
    pub fn pending(&self) -> usize {
        self.pending.count.load(Ordering::SeqCst)
    }

    /// Wait until every acknowledged batch has been persisted or dead-lettered
    pub async fn drain(&self) {
        self.pending.wait_idle().await;
    }

    /// Hand a validated batch to a blocking task. Returns immediately.
    fn persist(&self, records: Vec<EventRecord>) {
        let guard = self.pending.enter();
        let store = Arc::clone(&self.store);
        let dead_letter = Arc::clone(&self.dead_letter);

        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            if let Err(e) = write_batch(store.as_ref(), &records) {
                tracing::error!(records = records.len(), "failed to persist batch: {e}");
                dead_letter.push(&DeadLetter::new(e, records));
            }
        });
    }
}

/// Single records go through `insert_one`, larger batches through `insert_many`
fn write_batch(store: &dyn Store, records: &[EventRecord]) -> crate::Result<()> {
    match records {
        [] => Ok(()),
        [record] => store.insert_one(record),
        batch => store.insert_many(batch),
    }
}

/// Handler for `POST /track`.
///
/// Invalid bodies get 422 and never touch the store. Valid bodies get 200
/// before persistence runs; a later persistence failure cannot change it.
pub async fn track(State(state): State<IngestState>, body: Bytes) -> StatusCode {
    let records = match parse_batch(&body) {
        Ok(records) => records,
        Err(e) => {
            tracing::debug!(bytes = body.len(), "rejected batch: {e}");
            return StatusCode::UNPROCESSABLE_ENTITY;
        }
    };

    tracing::debug!(records = records.len(), "accepted batch");
    if !records.is_empty() {
        state.persist(records);
    }
    StatusCode::OK
}

/// Counts in-flight persistence tasks so shutdown can wait for them
#[derive(Debug, Default)]
struct PendingWrites {
    count: AtomicUsize,
    idle: Notify,
}

impl PendingWrites {
    fn enter(self: &Arc<Self>) -> PendingGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        PendingGuard(Arc::clone(self))
    }

    async fn wait_idle(&self) {
        loop {
            let idle = self.idle.notified();
            if self.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            idle.await;
        }
    }
}

struct PendingGuard(Arc<PendingWrites>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}
