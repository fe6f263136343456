use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::entry::{serialize_payload, LogEntry};
use super::sink::AuditSink;
use crate::config::schema::MIN_CAPACITY_BYTES;
use crate::obs::metrics::MediatorMetrics;

/// Bounded attempts with exponential backoff between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (0-based): `base * 2^attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(1u32 << attempt.min(16))
    }
}

pub struct BufferOptions {
    pub capacity: usize,
    pub auto_sync: bool,
    pub retry: RetryPolicy,
    pub sink: Option<Arc<dyn AuditSink>>,
    pub metrics: Option<Arc<MediatorMetrics>>,
}

impl Default for BufferOptions {
    fn default() -> Self {
        Self {
            capacity: 255 * 1024,
            auto_sync: true,
            retry: RetryPolicy::default(),
            sink: None,
            metrics: None,
        }
    }
}

/// Result of a single `push`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushReport {
    pub seq: u64,
    pub byte_size: usize,
    pub evicted: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    InFlight,
    Empty,
    NoSink,
}

/// What a `sync` call did. Transport failures are reported here, never
/// raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    Skipped { reason: SkipReason },
    Flushed { entries: usize, bytes: usize, attempts: u32 },
    Failed { attempts: u32 },
}

#[derive(Default)]
struct BufferState {
    entries: VecDeque<LogEntry>,
    total_bytes: usize,
    next_seq: u64,
}

struct Inner {
    capacity: usize,
    auto_sync: bool,
    retry: RetryPolicy,
    sink: Option<Arc<dyn AuditSink>>,
    metrics: Option<Arc<MediatorMetrics>>,
    state: Mutex<BufferState>,
    syncing: AtomicBool,
    // a spawned sync task has not started yet
    scheduled: AtomicBool,
}

/// Byte-capped FIFO of audit lines with a single-flight remote sync.
///
/// Cheap to clone; clones share the same buffer. `push` and `clear` never
/// wait on the network. Only `sync` suspends, and it never holds the state
/// lock across an await.
#[derive(Clone)]
pub struct AuditLogBuffer {
    inner: Arc<Inner>,
}

impl AuditLogBuffer {
    /// Local-only buffer (no sink).
    pub fn new(capacity: usize) -> Self {
        Self::with_options(BufferOptions {
            capacity,
            ..BufferOptions::default()
        })
    }

    pub fn with_options(opts: BufferOptions) -> Self {
        let capacity = opts.capacity.max(MIN_CAPACITY_BYTES);
        let retry = RetryPolicy {
            max_attempts: opts.retry.max_attempts.max(1),
            ..opts.retry
        };
        Self {
            inner: Arc::new(Inner {
                capacity,
                auto_sync: opts.auto_sync,
                retry,
                sink: opts.sink,
                metrics: opts.metrics,
                state: Mutex::new(BufferState::default()),
                syncing: AtomicBool::new(false),
                scheduled: AtomicBool::new(false),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, BufferState> {
        // A panic while holding the lock cannot break the byte invariant
        // (every mutation updates entries and total together), so recover.
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }
    pub fn has_sink(&self) -> bool {
        self.inner.sink.is_some()
    }
    pub fn len(&self) -> usize {
        self.state().entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.state().entries.is_empty()
    }
    pub fn total_bytes(&self) -> usize {
        self.state().total_bytes
    }
    pub fn is_syncing(&self) -> bool {
        self.inner.syncing.load(Ordering::Acquire)
    }

    /// Copy of the buffered entries, oldest first.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.state().entries.iter().cloned().collect()
    }

    /// Append an entry stamped with the current time.
    pub fn push<T: Serialize + ?Sized>(&self, channel: &str, payload: &T) -> PushReport {
        self.push_at(Utc::now(), channel, payload)
    }

    /// Append an entry with an explicit timestamp.
    pub fn push_at<T: Serialize + ?Sized>(
        &self,
        timestamp: DateTime<Utc>,
        channel: &str,
        payload: &T,
    ) -> PushReport {
        let serialized = serialize_payload(payload);
        let report = {
            let mut st = self.state();
            let seq = st.next_seq;
            st.next_seq += 1;

            let (entry, truncated) =
                LogEntry::build(seq, timestamp, channel, serialized, self.inner.capacity);
            let size = entry.byte_size();

            let mut evicted = 0;
            while st.total_bytes + size > self.inner.capacity {
                match st.entries.pop_front() {
                    Some(old) => {
                        st.total_bytes -= old.byte_size();
                        evicted += 1;
                    }
                    None => break,
                }
            }

            st.total_bytes += size;
            st.entries.push_back(entry);

            if let Some(m) = &self.inner.metrics {
                m.audit_buffer_bytes.set(&[], st.total_bytes as i64);
            }

            PushReport {
                seq,
                byte_size: size,
                evicted,
                truncated,
            }
        };

        if let Some(m) = &self.inner.metrics {
            m.audit_pushes.inc(&[("channel", channel)]);
            if report.evicted > 0 {
                m.audit_evictions.add(&[], report.evicted as u64);
            }
            if report.truncated {
                m.audit_truncations.inc(&[]);
            }
        }
        if report.truncated {
            tracing::debug!(seq = report.seq, bytes = report.byte_size, "audit entry truncated to capacity");
        }
        if report.evicted > 0 {
            tracing::debug!(evicted = report.evicted, "audit entries evicted under capacity pressure");
        }

        if self.inner.auto_sync {
            self.trigger_sync();
        }
        report
    }

    /// Drop every buffered entry. An in-flight sync is unaffected.
    pub fn clear(&self) {
        let mut st = self.state();
        st.entries.clear();
        st.total_bytes = 0;
        if let Some(m) = &self.inner.metrics {
            m.audit_buffer_bytes.set(&[], 0);
        }
    }

    /// Fire-and-forget sync on the current tokio runtime, if any. At most
    /// one spawned task waits to start at a time.
    pub fn trigger_sync(&self) {
        if self.inner.sink.is_none() || self.is_syncing() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        if self
            .inner
            .scheduled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let this = self.clone();
        handle.spawn(async move {
            this.inner.scheduled.store(false, Ordering::Release);
            this.sync().await;
        });
    }

    /// Flush buffered entries to the sink.
    ///
    /// Single-flight: returns at once when a sync is already running, the
    /// buffer is empty, or no sink is configured. On success only the
    /// entries that were sent are removed; entries pushed while the request
    /// was in flight stay for the next sync. On exhaustion the buffer is
    /// left untouched.
    pub async fn sync(&self) -> SyncOutcome {
        let outcome = self.sync_once().await;

        if let Some(m) = &self.inner.metrics {
            let label = match outcome {
                SyncOutcome::Skipped { .. } => "skipped",
                SyncOutcome::Flushed { .. } => "flushed",
                SyncOutcome::Failed { .. } => "failed",
            };
            m.sync_outcomes.inc(&[("outcome", label)]);
        }

        // Entries that arrived mid-flight had their own trigger swallowed.
        if matches!(outcome, SyncOutcome::Flushed { .. }) && self.inner.auto_sync && !self.is_empty() {
            self.trigger_sync();
        }
        outcome
    }

    async fn sync_once(&self) -> SyncOutcome {
        let Some(sink) = self.inner.sink.clone() else {
            return SyncOutcome::Skipped { reason: SkipReason::NoSink };
        };
        let Some(_guard) = SyncGuard::acquire(&self.inner.syncing) else {
            return SyncOutcome::Skipped { reason: SkipReason::InFlight };
        };

        let (body, last_seq, count) = {
            let st = self.state();
            let Some(last) = st.entries.back() else {
                return SyncOutcome::Skipped { reason: SkipReason::Empty };
            };
            let mut body = String::with_capacity(st.total_bytes);
            for e in &st.entries {
                body.push_str(e.line());
            }
            (Bytes::from(body), last.seq(), st.entries.len())
        };

        let retry = self.inner.retry;
        let started = Instant::now();
        for attempt in 0..retry.max_attempts {
            match sink.put(body.clone()).await {
                Ok(()) => {
                    let (removed, bytes) = self.remove_through(last_seq);
                    if let Some(m) = &self.inner.metrics {
                        m.sync_attempts.inc(&[("result", "ok")]);
                        m.sync_duration.observe(&[], started.elapsed());
                    }
                    tracing::debug!(sent = count, removed, bytes, attempt, "audit buffer synced");
                    return SyncOutcome::Flushed {
                        entries: removed,
                        bytes,
                        attempts: attempt + 1,
                    };
                }
                Err(e) => {
                    if let Some(m) = &self.inner.metrics {
                        m.sync_attempts.inc(&[("result", "error")]);
                    }
                    tracing::warn!(attempt, max = retry.max_attempts, error = %e, "audit sync attempt failed");
                    if attempt + 1 < retry.max_attempts {
                        tokio::time::sleep(retry.backoff(attempt)).await;
                    }
                }
            }
        }

        tracing::warn!(entries = count, "audit sync gave up; entries kept for next trigger");
        SyncOutcome::Failed {
            attempts: retry.max_attempts,
        }
    }

    /// Remove entries up to and including `last_seq` that are still buffered.
    fn remove_through(&self, last_seq: u64) -> (usize, usize) {
        let mut st = self.state();
        let mut removed = 0;
        let mut bytes = 0;
        while st.entries.front().is_some_and(|e| e.seq() <= last_seq) {
            if let Some(e) = st.entries.pop_front() {
                bytes += e.byte_size();
                removed += 1;
            }
        }
        st.total_bytes -= bytes;
        if let Some(m) = &self.inner.metrics {
            m.audit_buffer_bytes.set(&[], st.total_bytes as i64);
        }
        (removed, bytes)
    }
}

/// Holds the `syncing` flag; released on every exit path.
struct SyncGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> SyncGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
