//! Audit log buffer, its remote sink, and the tracing mirror.

pub mod buffer;
pub mod entry;
pub mod mirror;
pub mod sink;

use std::sync::Arc;
use std::time::Duration;

use warden_core::error::Result;

pub use buffer::{AuditLogBuffer, BufferOptions, PushReport, RetryPolicy, SkipReason, SyncOutcome};
pub use entry::LogEntry;
pub use mirror::AuditMirrorLayer;
pub use sink::{AuditSink, HttpSink};

use crate::config::AuditSection;
use crate::obs::metrics::MediatorMetrics;

/// Build the process-wide buffer from config.
pub fn buffer_from_config(
    cfg: &AuditSection,
    metrics: Option<Arc<MediatorMetrics>>,
) -> Result<AuditLogBuffer> {
    let mut opts = BufferOptions {
        capacity: cfg.capacity_bytes,
        auto_sync: cfg.auto_sync,
        metrics,
        ..BufferOptions::default()
    };

    if let Some(sink_cfg) = &cfg.sink {
        let sink = HttpSink::from_config(sink_cfg)?;
        tracing::info!(endpoint = %sink.endpoint(), "audit sink configured");
        opts.sink = Some(Arc::new(sink));
        opts.retry = RetryPolicy {
            max_attempts: sink_cfg.max_attempts,
            backoff_base: Duration::from_millis(sink_cfg.backoff_base_ms),
        };
    }

    Ok(AuditLogBuffer::with_options(opts))
}
