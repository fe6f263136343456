//! warden mediator binary.
//!
//! - Loads `warden.yaml` (or the path in `WARDEN_CONFIG`)
//! - Installs logging, plus the audit mirror when configured
//! - Serves the decision API until ctrl-c, then makes one last sync attempt

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use warden_core::error::WardenError;
use warden_mediator::audit::{self, AuditMirrorLayer};
use warden_mediator::obs::MediatorMetrics;
use warden_mediator::{app_state, config, router};

const SHUTDOWN_SYNC_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::var("WARDEN_CONFIG").unwrap_or_else(|_| "warden.yaml".into());
    let cfg = config::load_from_file(&path)?;
    let listen: SocketAddr = cfg
        .server
        .listen
        .parse()
        .map_err(|e| WardenError::BadRequest(format!("server.listen must be a valid SocketAddr: {e}")))?;

    // Buffer first, so the mirror sees rule compilation warnings.
    let metrics = Arc::new(MediatorMetrics::default());
    let buffer = audit::buffer_from_config(&cfg.audit, Some(Arc::clone(&metrics)))?;
    let mirror = cfg
        .audit
        .mirror
        .as_ref()
        .map(|m| AuditMirrorLayer::new(buffer.clone(), m.level.to_level()));

    tracing_subscriber::registry()
        .with(fmt::layer().with_filter(EnvFilter::from_default_env()))
        .with(mirror)
        .init();

    let state = app_state::AppState::with_parts(cfg, metrics, buffer)?;
    let app = router::build_router(state.clone());

    tracing::info!(%listen, config = %path, "warden-mediator starting");
    let listener = tokio::net::TcpListener::bind(listen).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Best effort: an in-flight sync keeps the flag set, so wait for it.
    let audit = state.audit().clone();
    let final_sync = async move {
        while audit.is_syncing() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        audit.sync().await
    };
    match tokio::time::timeout(SHUTDOWN_SYNC_GRACE, final_sync).await {
        Ok(outcome) => tracing::info!(?outcome, "final audit sync"),
        Err(_) => tracing::warn!(
            grace_secs = SHUTDOWN_SYNC_GRACE.as_secs(),
            entries = state.audit().len(),
            "final audit sync timed out; entries dropped"
        ),
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "ctrl-c handler failed");
    }
}
