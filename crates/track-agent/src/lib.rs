//! Client-side event buffer for activity-track.
//!
//! This crate batches user-interaction events inside the host application and
//! delivers them to the activity-track ingestion endpoint:
//! - **Buffering**: `track()` appends an [`EventRecord`] without touching the network
//! - **Flushing**: a batch goes out when the buffer reaches the flush threshold,
//!   on every flush tick, and once more on teardown
//! - **Retries**: failed batches stay buffered (at-least-once delivery), with
//!   backoff, a buffer cap and a limit on batches the server keeps rejecting
//!
//! # Usage
//!
//! Add to your `Cargo.toml`:
//! ```toml
//! [dependencies]
//! track-agent = { path = "crates/track-agent" }
//! ```
//!
//! Create one tracker in the composition root and pass clones around:
//! ```rust,ignore
//! let page = Arc::new(StaticPage::new("http://localhost:50000/1.html", "Home"));
//! let tracker = Tracker::start_http(AgentConfig::default(), page)?;
//!
//! tracker.track("click", ["button-a"]);
//!
//! // On teardown
//! tracker.shutdown().await;
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod page;
pub mod record;
pub mod transport;

pub use agent::{FlushOutcome, SkipReason, Tracker, TrackerStats};
pub use config::{AgentConfig, DEFAULT_ENDPOINT};
pub use error::{AgentError, Result, TransportError};
pub use page::{PageContext, StaticPage};
pub use record::EventRecord;
pub use transport::{HttpTransport, Transport};
