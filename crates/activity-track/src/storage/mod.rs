mod schema;
pub mod writer;

use crate::error::Result;
use track_agent::EventRecord;

pub use schema::{COLLECTION, get_meta};
pub use writer::{
    EventSummary, SqliteStore, StoredEvent, query_count, query_recent, query_summary,
};

/// Append-only persistence for validated events.
///
/// Implementations must tolerate concurrent callers.
pub trait Store: Send + Sync {
    fn insert_one(&self, record: &EventRecord) -> Result<()>;
    fn insert_many(&self, records: &[EventRecord]) -> Result<()>;
}
