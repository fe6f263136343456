//! Remote durable sink for audit lines.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};

use warden_core::error::{Result, WardenError};

use crate::config::SinkSection;

/// Full-replace write of the concatenated buffer to durable storage.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Idempotent PUT of `body`. Any error counts as a failed attempt.
    async fn put(&self, body: Bytes) -> Result<()>;
}

/// HTTP PUT sink (WebDAV-style object store).
pub struct HttpSink {
    endpoint: String,
    authorization: Option<String>,
    client: reqwest::Client,
}

impl HttpSink {
    pub fn from_config(cfg: &SinkSection) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| WardenError::Internal(format!("sink http client build failed: {e}")))?;

        let authorization = match (&cfg.auth, &cfg.username) {
            (Some(raw), _) => Some(raw.clone()),
            (None, Some(user)) => Some(basic_auth(user, cfg.password.as_deref().unwrap_or(""))),
            (None, None) => None,
        };

        Ok(Self {
            endpoint: cfg.endpoint.clone(),
            authorization,
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

pub(crate) fn basic_auth(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user}:{password}")))
}

#[async_trait]
impl AuditSink for HttpSink {
    async fn put(&self, body: Bytes) -> Result<()> {
        let mut req = self
            .client
            .put(&self.endpoint)
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body);
        if let Some(auth) = &self.authorization {
            req = req.header(AUTHORIZATION, auth);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| WardenError::Transport(format!("audit sink request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(WardenError::Transport(format!("audit sink returned {status}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_header() {
        assert_eq!(basic_auth("admin", "admin"), "Basic YWRtaW46YWRtaW4=");
    }
}
