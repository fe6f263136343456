//! HTTP handlers for the decision service.
//!
//! - `POST /v1/evaluate`: pure policy decision, no bookkeeping
//! - `POST /v1/mediate`: decision + audit + enforcement (strict blocks -> 403)
//! - `GET|DELETE /v1/audit`: buffer stats / local clear
//! - `POST /v1/audit/sync`: flush now and report the outcome
//! - `GET /metrics`: Prometheus text

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use warden_core::call::{CallDescriptor, CallerIdentity, Effect};
use warden_core::error::WardenError;

use crate::app_state::AppState;
use crate::audit::SyncOutcome;
use crate::mediation::Verdict;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CallRequest {
    pub call: CallDescriptor,
    #[serde(default)]
    pub caller: CallerIdentity,
}

#[derive(Debug, Serialize)]
pub struct EvaluateResponse {
    pub effect: Effect,
    pub rule: String,
    pub default: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuditStats {
    pub entries: usize,
    pub total_bytes: usize,
    pub capacity: usize,
    pub syncing: bool,
}

/// Error wrapper mapping `WardenError` onto HTTP.
pub struct ApiError(pub WardenError);

impl From<WardenError> for ApiError {
    fn from(e: WardenError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            WardenError::BadRequest(_) | WardenError::UnsupportedVersion => StatusCode::BAD_REQUEST,
            WardenError::PolicyViolation(_) => StatusCode::FORBIDDEN,
            WardenError::Transport(_) => StatusCode::BAD_GATEWAY,
            WardenError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let mut body = json!({
            "error": self.0.client_code().as_str(),
            "message": self.0.to_string(),
        });
        if let Some(v) = self.0.violation() {
            body["violation"] = json!({
                "rule": v.rule,
                "caller": v.caller,
                "primitive": v.primitive,
                "reference": v.reference,
            });
        }
        (status, Json(body)).into_response()
    }
}

pub async fn evaluate(State(app): State<AppState>, Json(req): Json<CallRequest>) -> Json<EvaluateResponse> {
    let decision = app.engine().evaluate(&req.call, &req.caller);
    app.metrics().decisions.inc(&[("effect", decision.effect.as_str())]);
    Json(EvaluateResponse {
        effect: decision.effect,
        rule: decision.rule_id().to_string(),
        default: decision.is_default(),
        comment: decision.rule.and_then(|r| r.comment()).map(str::to_string),
    })
}

pub async fn mediate(
    State(app): State<AppState>,
    Json(req): Json<CallRequest>,
) -> Result<Json<Verdict>, ApiError> {
    let verdict = app.mediator().check(&req.call, &req.caller)?;
    Ok(Json(verdict))
}

pub async fn audit_stats(State(app): State<AppState>) -> Json<AuditStats> {
    let audit = app.audit();
    Json(AuditStats {
        entries: audit.len(),
        total_bytes: audit.total_bytes(),
        capacity: audit.capacity(),
        syncing: audit.is_syncing(),
    })
}

pub async fn audit_clear(State(app): State<AppState>) -> StatusCode {
    app.audit().clear();
    tracing::info!("audit buffer cleared");
    StatusCode::NO_CONTENT
}

pub async fn audit_sync(State(app): State<AppState>) -> Json<SyncOutcome> {
    Json(app.audit().sync().await)
}

pub async fn metrics(State(app): State<AppState>) -> impl IntoResponse {
    let rules = app.engine().rules().len() as u64;
    let body = app.metrics().render(&[("warden_policy_rules", rules)]);
    ([("content-type", "text/plain; version=0.0.4")], body)
}
