#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::cell::Cell;
use std::sync::Arc;

use warden_core::call::{CallDescriptor, CallerIdentity, Effect};
use warden_core::error::WardenError;
use warden_mediator::audit::AuditLogBuffer;
use warden_mediator::config::{self, EnforcementMode, EnforcementSection};
use warden_mediator::mediation::Mediator;
use warden_mediator::policy::PolicyEngine;

const POLICY: &str = r#"
rules:
  - id: core-free
    policy: free
    caller: [{ file_path: "core/*" }]
  - id: console-audit
    policy: audit
    group: [cn]
    comment: "console output is recorded"
  - id: net-block
    policy: block
    group: [nt]
"#;

fn mediator(mode: EnforcementMode, audit_all: bool) -> Mediator {
    let policy = config::policy_from_str(POLICY).unwrap();
    let engine = PolicyEngine::compile(&policy).unwrap();
    let enforcement = EnforcementSection {
        mode,
        audit_all,
        ..EnforcementSection::default()
    };
    Mediator::new(Arc::new(engine), AuditLogBuffer::new(64 * 1024), enforcement)
}

fn plugin() -> CallerIdentity {
    CallerIdentity::from_path("plugins/widget.js").with_class("Widget")
}

#[test]
fn strict_block_raises_violation_with_context() {
    let m = mediator(EnforcementMode::Strict, true);
    let ran = Cell::new(false);

    let err = m
        .mediate(&CallDescriptor::new("fetch"), &plugin(), || ran.set(true))
        .expect_err("fetch must be blocked");
    assert!(!ran.get());

    let v = err.violation().expect("violation details");
    assert_eq!(v.rule, "net-block");
    assert_eq!(v.primitive, "fetch");
    assert_eq!(v.caller, plugin());
    assert_eq!(v.reference, "docs/mediation.md");
    assert_eq!(err.client_code().as_str(), "POLICY_VIOLATION");

    let msg = err.to_string();
    assert!(msg.contains("fetch"));
    assert!(msg.contains("net-block"));
    assert!(msg.contains("docs/mediation.md"));
}

#[test]
fn lenient_block_returns_default_without_invoking() {
    let m = mediator(EnforcementMode::Lenient, true);
    let mut calls = 0;

    let out: Option<u32> = m
        .mediate(&CallDescriptor::new("fetch"), &plugin(), || {
            calls += 1;
            Some(7)
        })
        .unwrap();
    assert_eq!(out, None);
    assert_eq!(calls, 0);

    let verdict = m.check(&CallDescriptor::new("fetch"), &plugin()).unwrap();
    assert_eq!(verdict.effect, Effect::Block);
    assert!(!verdict.proceed);
}

#[test]
fn free_calls_run_and_leave_no_trace() {
    let m = mediator(EnforcementMode::Strict, true);
    let out = m
        .mediate(&CallDescriptor::new("fetch"), &CallerIdentity::from_path("core/net.js"), || 42)
        .unwrap();
    assert_eq!(out, 42);
    assert!(m.audit().is_empty());
}

#[test]
fn audited_calls_run_and_are_recorded() {
    let m = mediator(EnforcementMode::Strict, true);
    let out = m.mediate(&CallDescriptor::new("log"), &plugin(), || "printed").unwrap();
    assert_eq!(out, "printed");

    let entries = m.audit().snapshot();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].channel(), "audit");

    let payload: serde_json::Value = serde_json::from_str(entries[0].payload()).unwrap();
    assert_eq!(payload["primitive"], "log");
    assert_eq!(payload["rule"], "console-audit");
    assert_eq!(payload["effect"], "audit");
    assert_eq!(payload["comment"], "console output is recorded");
    assert_eq!(payload["groups"], serde_json::json!(["cn"]));
    assert_eq!(payload["caller"]["class_name"], "Widget");
}

#[test]
fn blocked_calls_are_recorded_only_with_audit_all() {
    let m = mediator(EnforcementMode::Lenient, true);
    let v = m.check(&CallDescriptor::new("fetch"), &plugin()).unwrap();
    assert!(v.audited);
    assert_eq!(m.audit().snapshot()[0].channel(), "block");

    let m = mediator(EnforcementMode::Lenient, false);
    let v = m.check(&CallDescriptor::new("fetch"), &plugin()).unwrap();
    assert!(!v.audited);
    assert!(m.audit().is_empty());
}

#[test]
fn unmatched_calls_fall_to_default_block() {
    let m = mediator(EnforcementMode::Strict, true);
    let err = m.check(&CallDescriptor::new("eval"), &plugin()).unwrap_err();
    match err {
        WardenError::PolicyViolation(v) => assert_eq!(v.rule, "default"),
        other => panic!("unexpected error: {other:?}"),
    }
}
