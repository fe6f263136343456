//! Shared application state for the warden mediator.
//!
//! Builds exactly one policy engine and one audit buffer and injects both
//! into the mediation facade. Startup errors are returned, not panicked.

use std::sync::Arc;

use warden_core::error::{Result, WardenError};

use crate::audit::{self, AuditLogBuffer};
use crate::config::WardenConfig;
use crate::mediation::Mediator;
use crate::obs::MediatorMetrics;
use crate::policy::PolicyEngine;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    mediator: Mediator,
    metrics: Arc<MediatorMetrics>,
}

impl AppState {
    pub fn new(cfg: WardenConfig) -> Result<Self> {
        let metrics = Arc::new(MediatorMetrics::default());
        let buffer = audit::buffer_from_config(&cfg.audit, Some(Arc::clone(&metrics)))?;
        Self::with_parts(cfg, metrics, buffer)
    }

    /// Build around an existing buffer (the binary creates it first so the
    /// tracing mirror can be installed before rules compile).
    pub fn with_parts(cfg: WardenConfig, metrics: Arc<MediatorMetrics>, audit: AuditLogBuffer) -> Result<Self> {
        let engine = PolicyEngine::compile(&cfg.policy)
            .map_err(|e| WardenError::BadRequest(format!("policy compile failed: {e}")))?;

        tracing::info!(
            rules = engine.rules().len(),
            default = %engine.default_effect(),
            mode = ?cfg.enforcement.mode,
            sink = audit.has_sink(),
            "mediator state ready"
        );

        let mediator = Mediator::new(Arc::new(engine), audit, cfg.enforcement.clone())
            .with_metrics(Arc::clone(&metrics));

        Ok(Self {
            inner: Arc::new(AppStateInner { mediator, metrics }),
        })
    }

    pub fn mediator(&self) -> &Mediator {
        &self.inner.mediator
    }

    pub fn engine(&self) -> &PolicyEngine {
        self.inner.mediator.engine()
    }

    pub fn audit(&self) -> &AuditLogBuffer {
        self.inner.mediator.audit()
    }

    pub fn metrics(&self) -> &MediatorMetrics {
        &self.inner.metrics
    }
}
