use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use warden_core::call::{CallDescriptor, CallerIdentity, Effect};
use warden_core::error::{Result, Violation, WardenError};

use crate::audit::AuditLogBuffer;
use crate::config::{EnforcementMode, EnforcementSection};
use crate::obs::MediatorMetrics;
use crate::policy::{Decision, PolicyEngine};

/// Enforced outcome of one mediated call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub effect: Effect,
    /// Matched rule id, or `"default"`.
    pub rule: String,
    /// Whether the real primitive should run.
    pub proceed: bool,
    /// Whether an entry was pushed to the audit buffer.
    pub audited: bool,
}

/// Wires policy evaluation to enforcement and audit bookkeeping.
///
/// Receives the engine and buffer by injection; one instance per process.
pub struct Mediator {
    engine: Arc<PolicyEngine>,
    audit: AuditLogBuffer,
    enforcement: EnforcementSection,
    metrics: Option<Arc<MediatorMetrics>>,
}

impl Mediator {
    pub fn new(engine: Arc<PolicyEngine>, audit: AuditLogBuffer, enforcement: EnforcementSection) -> Self {
        Self {
            engine,
            audit,
            enforcement,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MediatorMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn engine(&self) -> &PolicyEngine {
        &self.engine
    }
    pub fn audit(&self) -> &AuditLogBuffer {
        &self.audit
    }

    /// Evaluate, record, and enforce. Strict-mode blocks come back as
    /// `WardenError::PolicyViolation`; lenient blocks as a non-proceeding
    /// verdict.
    pub fn check(&self, call: &CallDescriptor, caller: &CallerIdentity) -> Result<Verdict> {
        let decision = self.engine.evaluate(call, caller);
        self.enforce(call, caller, decision)
    }

    /// Run `invoke` when the call may proceed. Lenient-mode blocks return
    /// `T::default()` without running it.
    pub fn mediate<T, F>(&self, call: &CallDescriptor, caller: &CallerIdentity, invoke: F) -> Result<T>
    where
        T: Default,
        F: FnOnce() -> T,
    {
        let verdict = self.check(call, caller)?;
        if verdict.proceed {
            Ok(invoke())
        } else {
            Ok(T::default())
        }
    }

    fn enforce(&self, call: &CallDescriptor, caller: &CallerIdentity, decision: Decision<'_>) -> Result<Verdict> {
        let rule = decision.rule_id().to_string();
        if let Some(m) = &self.metrics {
            m.decisions.inc(&[("effect", decision.effect.as_str())]);
        }

        let audited = match decision.effect {
            Effect::Free => false,
            Effect::Audit => {
                self.record("audit", call, caller, &decision);
                true
            }
            Effect::Block => {
                if self.enforcement.audit_all {
                    self.record("block", call, caller, &decision);
                }
                self.enforcement.audit_all
            }
        };

        if decision.effect != Effect::Block {
            return Ok(Verdict {
                effect: decision.effect,
                rule,
                proceed: true,
                audited,
            });
        }

        if let Some(m) = &self.metrics {
            m.violations.inc(&[("mode", self.mode_label())]);
        }

        match self.enforcement.mode {
            EnforcementMode::Strict => {
                let violation = Violation {
                    rule,
                    caller: caller.clone(),
                    primitive: call.primitive.clone(),
                    reference: self.enforcement.reference_doc.clone(),
                };
                tracing::error!(
                    caller = %violation.caller,
                    primitive = %violation.primitive,
                    rule = %violation.rule,
                    "protected primitive call blocked"
                );
                Err(WardenError::PolicyViolation(Box::new(violation)))
            }
            EnforcementMode::Lenient => {
                tracing::warn!(
                    %caller,
                    primitive = %call.primitive,
                    rule = %rule,
                    reference = %self.enforcement.reference_doc,
                    action = "ignore",
                    "protected primitive call suppressed"
                );
                Ok(Verdict {
                    effect: Effect::Block,
                    rule,
                    proceed: false,
                    audited,
                })
            }
        }
    }

    fn record(&self, channel: &str, call: &CallDescriptor, caller: &CallerIdentity, decision: &Decision<'_>) {
        let groups = self.engine.registry().groups_of(&call.primitive);
        let payload = json!({
            "caller": caller,
            "primitive": call.primitive,
            "groups": groups,
            "effect": decision.effect,
            "rule": decision.rule_id(),
            "comment": decision.rule.and_then(|r| r.comment()),
        });
        self.audit.push(channel, &payload);
    }

    fn mode_label(&self) -> &'static str {
        match self.enforcement.mode {
            EnforcementMode::Strict => "strict",
            EnforcementMode::Lenient => "lenient",
        }
    }
}
