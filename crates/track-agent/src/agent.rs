//! Client-side buffer and flush scheduling.
//!
//! A [`Tracker`] accumulates [`EventRecord`]s and ships them in batches.
//! Three independent triggers may start a flush:
//! - the buffer growing past the flush threshold
//! - a recurring tick
//! - [`Tracker::shutdown`], the page-teardown signal
//!
//! At most one flush request is outstanding at any time. Triggers that fire
//! while a request is pending are dropped rather than queued; the records
//! they would have sent stay buffered for the next trigger.

use crate::config::AgentConfig;
use crate::error::{AgentError, Result, TransportError};
use crate::page::PageContext;
use crate::record::EventRecord;
use crate::transport::{HttpTransport, Transport};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// What caused a flush attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Trigger {
    Threshold,
    Tick,
    Shutdown,
}

/// Result of one flush attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The server acknowledged this many records; they left the buffer
    Delivered(usize),
    /// The request failed; the buffer is unchanged
    Failed,
    /// The server kept rejecting the batch; this many records were dropped
    Discarded(usize),
    /// No request was made
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    InFlight,
    Empty,
    Backoff,
    AlreadyShutDown,
}

/// Counters since the tracker started
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerStats {
    pub tracked: u64,
    pub delivered: u64,
    pub failed_flushes: u64,
    pub evicted: u64,
    pub discarded: u64,
}

/// A buffered record tagged with its insertion sequence number
struct Buffered {
    seq: u64,
    record: EventRecord,
}

/// Records sent by one flush, identified by the last sequence number they cover
struct Snapshot {
    last_seq: u64,
    records: Vec<EventRecord>,
}

#[derive(Default)]
struct State {
    buffer: VecDeque<Buffered>,
    next_seq: u64,
    in_flight: bool,
    consecutive_failures: u32,
    consecutive_rejections: u32,
    retry_at: Option<Instant>,
    stats: TrackerStats,
}

struct Inner {
    config: AgentConfig,
    transport: Arc<dyn Transport>,
    page: Arc<dyn PageContext>,
    runtime: Handle,
    state: Mutex<State>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

/// Event buffer with batched delivery.
///
/// Construct one per client context in the composition root and hand out
/// clones; all clones share the same buffer.
#[derive(Clone)]
pub struct Tracker {
    inner: Arc<Inner>,
}

impl Tracker {
    /// Create the tracker and start its recurring flush tick.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        config: AgentConfig,
        transport: Arc<dyn Transport>,
        page: Arc<dyn PageContext>,
    ) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| AgentError::NoRuntime)?;

        let inner = Arc::new(Inner {
            config,
            transport,
            page,
            runtime,
            state: Mutex::new(State::default()),
            ticker: Mutex::new(None),
        });

        let ticker = spawn_ticker(&inner);
        *lock(&inner.ticker) = Some(ticker);

        tracing::debug!(
            threshold = inner.config.flush_threshold,
            interval = ?inner.config.flush_interval,
            "tracker: started"
        );
        Ok(Tracker { inner })
    }

    /// Start a tracker that delivers over HTTP to `config.endpoint`.
    pub fn start_http(config: AgentConfig, page: Arc<dyn PageContext>) -> Result<Self> {
        let transport = HttpTransport::from_config(&config)?;
        Self::start(config, Arc::new(transport), page)
    }

    /// Record an event.
    ///
    /// Captures the page URL, title and timestamp now. Never blocks on the
    /// network and never fails; delivery problems are handled internally.
    pub fn track<I, S>(&self, event: impl Into<String>, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let record = EventRecord::new(
            event,
            tags.into_iter().map(Into::into).collect(),
            self.inner.page.url(),
            self.inner.page.title(),
        );
        if let Err(reason) = record.check() {
            // The server would reject the whole batch forever
            tracing::warn!(event = %record.event, "tracker: ignoring invalid event: {reason}");
            return;
        }

        let crossed = {
            let config = &self.inner.config;
            let mut state = self.inner.state();
            let before = state.buffer.len();

            if before >= config.max_buffered
                && let Some(evicted) = state.buffer.pop_front()
            {
                state.stats.evicted += 1;
                tracing::warn!(
                    event = %evicted.record.event,
                    max = config.max_buffered,
                    "tracker: buffer full, evicting oldest record"
                );
            }

            let seq = state.next_seq;
            state.next_seq += 1;
            state.buffer.push_back(Buffered { seq, record });
            state.stats.tracked += 1;

            before < config.flush_threshold && state.buffer.len() >= config.flush_threshold
        };

        if crossed {
            self.spawn_flush(Trigger::Threshold);
        }
    }

    /// Stop the recurring tick and make one final delivery attempt.
    ///
    /// Only the first call does anything. The final attempt ignores the
    /// retry backoff but still yields to a flush that is already in flight.
    pub async fn shutdown(&self) -> FlushOutcome {
        let ticker = lock(&self.inner.ticker).take();
        let Some(ticker) = ticker else {
            return FlushOutcome::Skipped(SkipReason::AlreadyShutDown);
        };
        ticker.abort();

        tracing::info!(buffered = self.buffered(), "tracker: teardown, final flush");
        flush(&self.inner, Trigger::Shutdown).await
    }

    /// Number of records waiting for delivery
    pub fn buffered(&self) -> usize {
        self.inner.state().buffer.len()
    }

    /// Records waiting for delivery, oldest first
    pub fn pending(&self) -> Vec<EventRecord> {
        self.inner
            .state()
            .buffer
            .iter()
            .map(|b| b.record.clone())
            .collect()
    }

    /// Whether a flush request is outstanding
    pub fn is_flushing(&self) -> bool {
        self.inner.state().in_flight
    }

    pub fn stats(&self) -> TrackerStats {
        self.inner.state().stats
    }

    pub fn config(&self) -> &AgentConfig {
        &self.inner.config
    }

    fn spawn_flush(&self, trigger: Trigger) {
        let inner = Arc::clone(&self.inner);
        self.inner.runtime.spawn(async move {
            flush(&inner, trigger).await;
        });
    }

    #[cfg(test)]
    pub(crate) async fn flush(&self, trigger: Trigger) -> FlushOutcome {
        flush(&self.inner, trigger).await
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }

    /// Claim the in-flight slot and snapshot the buffer
    fn begin_flush(&self, trigger: Trigger) -> std::result::Result<Snapshot, SkipReason> {
        let mut state = self.state();

        if state.in_flight {
            return Err(SkipReason::InFlight);
        }
        if state.buffer.is_empty() {
            return Err(SkipReason::Empty);
        }
        if trigger != Trigger::Shutdown
            && let Some(at) = state.retry_at
            && Instant::now() < at
        {
            return Err(SkipReason::Backoff);
        }

        state.in_flight = true;
        let last_seq = state.buffer.back().map(|b| b.seq).unwrap_or_default();
        let records = state.buffer.iter().map(|b| b.record.clone()).collect();
        Ok(Snapshot { last_seq, records })
    }

    /// Release the in-flight slot and apply the outcome to the buffer
    fn finish_flush(
        &self,
        snapshot: Snapshot,
        result: std::result::Result<(), TransportError>,
    ) -> FlushOutcome {
        let mut state = self.state();
        state.in_flight = false;

        match result {
            Ok(()) => {
                // Only the snapshot leaves; records appended mid-flight stay
                let removed = remove_through(&mut state.buffer, snapshot.last_seq);
                state.stats.delivered += removed as u64;
                state.consecutive_failures = 0;
                state.consecutive_rejections = 0;
                state.retry_at = None;
                tracing::debug!(delivered = removed, "tracker: flush delivered");
                FlushOutcome::Delivered(removed)
            }
            Err(e) => {
                state.stats.failed_flushes += 1;
                state.consecutive_failures += 1;
                if e.is_rejection() {
                    state.consecutive_rejections += 1;
                } else {
                    state.consecutive_rejections = 0;
                }

                let max_rejections = self.config.max_rejections;
                if max_rejections > 0 && state.consecutive_rejections >= max_rejections {
                    let dropped = remove_through(&mut state.buffer, snapshot.last_seq);
                    state.stats.discarded += dropped as u64;
                    state.consecutive_failures = 0;
                    state.consecutive_rejections = 0;
                    state.retry_at = None;
                    tracing::error!(
                        dropped,
                        attempts = max_rejections,
                        "tracker: server keeps rejecting batch, discarding it"
                    );
                    return FlushOutcome::Discarded(dropped);
                }

                let delay = self.config.retry_delay(state.consecutive_failures);
                state.retry_at = (!delay.is_zero()).then(|| Instant::now() + delay);
                tracing::warn!(
                    error = %e,
                    batch = snapshot.records.len(),
                    failures = state.consecutive_failures,
                    retry_in = ?delay,
                    "tracker: flush failed, keeping batch"
                );
                FlushOutcome::Failed
            }
        }
    }
}

/// Drop buffered records up to and including `last_seq`; returns how many went
fn remove_through(buffer: &mut VecDeque<Buffered>, last_seq: u64) -> usize {
    let before = buffer.len();
    buffer.retain(|b| b.seq > last_seq);
    before - buffer.len()
}

/// Releases the in-flight slot if a flush is abandoned before it completes
struct FlightGuard<'a> {
    inner: &'a Inner,
    armed: bool,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.inner.state().in_flight = false;
        }
    }
}

async fn flush(inner: &Inner, trigger: Trigger) -> FlushOutcome {
    let snapshot = match inner.begin_flush(trigger) {
        Ok(snapshot) => snapshot,
        Err(reason) => return FlushOutcome::Skipped(reason),
    };
    let mut guard = FlightGuard { inner, armed: true };

    tracing::debug!(batch = snapshot.records.len(), ?trigger, "tracker: flushing");
    let result = inner.transport.send(&snapshot.records).await;

    guard.armed = false;
    inner.finish_flush(snapshot, result)
}

fn spawn_ticker(inner: &Arc<Inner>) -> JoinHandle<()> {
    let weak: Weak<Inner> = Arc::downgrade(inner);
    let period = inner.config.flush_interval;

    inner.runtime.spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let Some(inner) = weak.upgrade() else {
                break;
            };
            // Detached so that cancelling the tick never cancels a request
            let runtime = inner.runtime.clone();
            runtime.spawn(async move { flush(&inner, Trigger::Tick).await });
        }
    })
}
