//! Shared test sinks.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Notify;

use warden_core::error::{Result, WardenError};
use warden_mediator::audit::AuditSink;

/// Records every body it receives.
#[derive(Default)]
pub struct RecordingSink {
    bodies: Mutex<Vec<Bytes>>,
}

impl RecordingSink {
    pub fn bodies(&self) -> Vec<String> {
        self.bodies
            .lock()
            .unwrap()
            .iter()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .collect()
    }
    pub fn calls(&self) -> usize {
        self.bodies.lock().unwrap().len()
    }
}

#[async_trait]
impl AuditSink for RecordingSink {
    async fn put(&self, body: Bytes) -> Result<()> {
        self.bodies.lock().unwrap().push(body);
        Ok(())
    }
}

/// Fails the first `failures` calls, then succeeds.
pub struct FlakySink {
    failures: usize,
    calls: AtomicUsize,
}

impl FlakySink {
    pub fn new(failures: usize) -> Self {
        Self {
            failures,
            calls: AtomicUsize::new(0),
        }
    }
    pub fn always_failing() -> Self {
        Self::new(usize::MAX)
    }
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuditSink for FlakySink {
    async fn put(&self, _body: Bytes) -> Result<()> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            Err(WardenError::Transport(format!("simulated failure #{n}")))
        } else {
            Ok(())
        }
    }
}

/// Blocks inside `put` until released, so a sync can be held in flight.
#[derive(Default)]
pub struct GatedSink {
    pub entered: Notify,
    pub release: Notify,
    inner: RecordingSink,
}

impl GatedSink {
    pub fn bodies(&self) -> Vec<String> {
        self.inner.bodies()
    }
}

#[async_trait]
impl AuditSink for GatedSink {
    async fn put(&self, body: Bytes) -> Result<()> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.put(body).await
    }
}

pub fn arc<S: AuditSink + 'static>(sink: S) -> (Arc<S>, Arc<dyn AuditSink>) {
    let s = Arc::new(sink);
    let d: Arc<dyn AuditSink> = s.clone();
    (s, d)
}
