//! Batching trace sender.
//!
//! Records submitted to a [`TraceSender`] accumulate in a buffer that is
//! flushed to the batch endpoint when it reaches `batch_size`, or when no new
//! record has arrived for `batch_timeout`. The size trigger always wins: a
//! submit that fills the batch cancels the idle timer and flushes at once.
//!
//! Flushing detaches the live batch and hands it to a spawned delivery task,
//! so callers never wait on the network. Deliveries retry with exponential
//! backoff and are dropped once the retry budget is spent; nothing is
//! persisted.
//!
//! # Usage
//!
//! ```rust,ignore
//! let sender = TraceSender::new(TraceConfig::new(api_key))?;
//!
//! sender.submit(record)?;
//!
//! // During graceful shutdown
//! sender.shutdown().await;
//! ```

use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::config::TraceConfig;
use crate::error::{Result, TraceError};
use crate::retry::{Delivery, RetryPolicy, deliver_with_backoff};
use crate::transport::{HttpTransport, SharedTransport};
use crate::types::TraceRecord;

/// Delivery counters, safe to update from concurrent delivery tasks.
#[derive(Debug, Default)]
pub struct SenderStats {
    submitted: AtomicU64,
    rejected: AtomicU64,
    flushes: AtomicU64,
    attempts: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time copy of [`SenderStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Records accepted by `submit`.
    pub submitted: u64,
    /// Records refused by validation.
    pub rejected: u64,
    /// Batches detached from the buffer.
    pub flushes: u64,
    /// HTTP attempts across all deliveries.
    pub attempts: u64,
    /// Records the backend acknowledged.
    pub delivered: u64,
    /// Records discarded after exhausting retries.
    pub dropped: u64,
}

impl SenderStats {
    fn record_outcome(&self, outcome: &Delivery, records: u64) {
        if outcome.is_delivered() {
            self.delivered.fetch_add(records, Ordering::Relaxed);
        } else {
            self.dropped.fetch_add(records, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// The live batch plus the idle timer guarding it.
#[derive(Default)]
struct Buffer {
    batch: Vec<TraceRecord>,
    idle_timer: Option<JoinHandle<()>>,
    /// Bumped whenever the timer is cancelled or re-armed. A timer only
    /// flushes if its generation is still current when it wakes.
    generation: u64,
}

impl Buffer {
    fn cancel_timer(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if let Some(timer) = self.idle_timer.take() {
            timer.abort();
        }
    }
}

struct SenderInner {
    config: TraceConfig,
    policy: RetryPolicy,
    transport: SharedTransport,
    runtime: Handle,
    buffer: Mutex<Buffer>,
    in_flight: Mutex<Vec<JoinHandle<Delivery>>>,
    stats: SenderStats,
}

/// Buffers trace records and delivers them in batches.
///
/// Cheap to clone; clones share the same buffer. Must be created inside a
/// Tokio runtime, but `submit` and `flush` may be called from any thread.
#[derive(Clone)]
pub struct TraceSender {
    inner: Arc<SenderInner>,
}

impl TraceSender {
    /// Create a sender that posts to the HuggingPlace trace endpoints.
    pub fn new(config: TraceConfig) -> Result<Self> {
        config.validate()?;
        let transport = Arc::new(HttpTransport::new(&config)?);
        Self::with_transport(config, transport)
    }

    /// Create a sender over a custom transport.
    pub fn with_transport(config: TraceConfig, transport: SharedTransport) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(TraceError::Config(
                "Batch size must be at least 1".to_string(),
            ));
        }
        let runtime = Handle::try_current().map_err(|_| {
            TraceError::Config("TraceSender must be created inside a Tokio runtime".to_string())
        })?;

        Ok(Self {
            inner: Arc::new(SenderInner {
                policy: RetryPolicy::new(config.max_retries, config.retry_delay),
                config,
                transport,
                runtime,
                buffer: Mutex::new(Buffer::default()),
                in_flight: Mutex::new(Vec::new()),
                stats: SenderStats::default(),
            }),
        })
    }

    pub fn config(&self) -> &TraceConfig {
        &self.inner.config
    }

    /// Current delivery counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Number of records waiting in the live batch.
    pub fn pending(&self) -> usize {
        self.inner.lock_buffer().batch.len()
    }

    /// Queue a record for delivery.
    ///
    /// Invalid records are rejected without being queued. With batching
    /// disabled the record goes straight to the single-trace endpoint.
    /// Never waits on the network.
    pub fn submit(&self, record: TraceRecord) -> Result<()> {
        if let Err(e) = record.validate() {
            self.inner.stats.rejected.fetch_add(1, Ordering::Relaxed);
            if !self.inner.config.silent {
                tracing::warn!(error = %e, operation = %record.operation, "Rejected trace record");
            }
            return Err(e);
        }
        self.inner.stats.submitted.fetch_add(1, Ordering::Relaxed);

        if !self.inner.config.batching_enabled() {
            let inner = Arc::clone(&self.inner);
            let handle = self
                .inner
                .runtime
                .spawn(async move { inner.send_trace_with_retry(record).await });
            self.inner.track(handle);
            return Ok(());
        }

        let full_batch = {
            let mut buffer = self.inner.lock_buffer();
            buffer.batch.push(record);
            buffer.cancel_timer();

            if buffer.batch.len() >= self.inner.config.batch_size {
                Some(mem::take(&mut buffer.batch))
            } else {
                self.inner.arm_idle_timer(&mut buffer);
                None
            }
        };

        if let Some(batch) = full_batch {
            self.inner.dispatch_batch(batch);
        }
        Ok(())
    }

    /// Detach the live batch and start delivering it.
    ///
    /// Returns the number of records handed off; an empty buffer is a no-op.
    pub fn flush(&self) -> usize {
        let batch = {
            let mut buffer = self.inner.lock_buffer();
            buffer.cancel_timer();
            mem::take(&mut buffer.batch)
        };

        let count = batch.len();
        if count > 0 {
            self.inner.dispatch_batch(batch);
        }
        count
    }

    /// Deliver one record to the single-trace endpoint, retrying failures.
    pub async fn send_trace_with_retry(&self, record: TraceRecord) -> Delivery {
        self.inner.send_trace_with_retry(record).await
    }

    /// Deliver records to the batch endpoint, retrying failures.
    pub async fn send_batch_with_retry(&self, records: Vec<TraceRecord>) -> Delivery {
        self.inner.send_batch_with_retry(records).await
    }

    /// Flush whatever is pending and wait for in-flight deliveries to reach
    /// a terminal state, for at most `shutdown_timeout`.
    ///
    /// Deliveries still running at the deadline are left to finish in the
    /// background. Call this from the host application's graceful-shutdown
    /// path.
    pub async fn shutdown(&self) -> StatsSnapshot {
        let flushed = self.flush();
        let mut handles = mem::take(&mut *self.inner.lock_in_flight());
        let grace = self.inner.config.shutdown_timeout;

        if !self.inner.config.silent {
            tracing::debug!(
                flushed,
                in_flight = handles.len(),
                grace_ms = grace.as_millis() as u64,
                "Draining trace sender"
            );
        }

        let drain = async {
            for handle in handles.iter_mut() {
                if let Err(e) = handle.await {
                    tracing::error!(error = %e, "Trace delivery task failed");
                }
            }
        };
        if tokio::time::timeout(grace, drain).await.is_err() {
            let unfinished = handles.iter().filter(|h| !h.is_finished()).count();
            if !self.inner.config.silent {
                tracing::warn!(
                    unfinished,
                    grace_ms = grace.as_millis() as u64,
                    "Shutdown grace period elapsed with deliveries still in flight"
                );
            }
        }
        self.stats()
    }
}

impl SenderInner {
    fn lock_buffer(&self) -> MutexGuard<'_, Buffer> {
        self.buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, Vec<JoinHandle<Delivery>>> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn track(&self, handle: JoinHandle<Delivery>) {
        let mut in_flight = self.lock_in_flight();
        in_flight.retain(|h| !h.is_finished());
        in_flight.push(handle);
    }

    /// Start a timer that flushes the partial batch after `batch_timeout`.
    fn arm_idle_timer(self: &Arc<Self>, buffer: &mut Buffer) {
        let generation = buffer.generation;
        let inner = Arc::clone(self);
        let timeout = self.config.batch_timeout;

        buffer.idle_timer = Some(self.runtime.spawn(async move {
            tokio::time::sleep(timeout).await;
            inner.flush_on_timeout(generation);
        }));
    }

    fn flush_on_timeout(self: &Arc<Self>, generation: u64) {
        let batch = {
            let mut buffer = self.lock_buffer();
            if buffer.generation != generation {
                return;
            }
            buffer.idle_timer = None;
            mem::take(&mut buffer.batch)
        };

        if !batch.is_empty() {
            if !self.config.silent {
                tracing::debug!(records = batch.len(), "Idle timeout reached, flushing batch");
            }
            self.dispatch_batch(batch);
        }
    }

    fn dispatch_batch(self: &Arc<Self>, batch: Vec<TraceRecord>) {
        self.stats.flushes.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(self);
        let handle = self
            .runtime
            .spawn(async move { inner.send_batch_with_retry(batch).await });
        self.track(handle);
    }

    async fn send_trace_with_retry(&self, record: TraceRecord) -> Delivery {
        let outcome = deliver_with_backoff(self.policy, "trace", self.config.silent, || {
            self.stats.attempts.fetch_add(1, Ordering::Relaxed);
            self.transport.send_trace(&record)
        })
        .await;

        if !self.config.silent {
            if let Delivery::Delivered { response, .. } = &outcome {
                tracing::info!(
                    trace_id = %response.get("traceId").and_then(|v| v.as_str()).unwrap_or(record.trace_id.as_str()),
                    "Trace sent"
                );
            }
        }
        self.stats.record_outcome(&outcome, 1);
        outcome
    }

    async fn send_batch_with_retry(&self, records: Vec<TraceRecord>) -> Delivery {
        let outcome = deliver_with_backoff(self.policy, "batch", self.config.silent, || {
            self.stats.attempts.fetch_add(1, Ordering::Relaxed);
            self.transport.send_batch(&records)
        })
        .await;

        if !self.config.silent {
            if let Delivery::Delivered { response, .. } = &outcome {
                tracing::info!(
                    count = response.get("count").and_then(|v| v.as_u64()).unwrap_or(records.len() as u64),
                    "Trace batch sent"
                );
            }
        }
        self.stats.record_outcome(&outcome, records.len() as u64);
        outcome
    }
}
