#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use warden_core::call::Effect;
use warden_mediator::config::{self, CallerMatcherConfig, EnforcementMode, Operand};

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
policy:
  rules:
    - policy: free
      calller: [{ file_path: "core/*" }] # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.client_code().as_str(), "BAD_REQUEST");
}

#[test]
fn ok_minimal_config() {
    let ok = r#"
version: 1
policy: {}
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.server.listen, "127.0.0.1:8080");
    assert_eq!(cfg.enforcement.mode, EnforcementMode::Strict);
    assert!(cfg.enforcement.audit_all);
    assert_eq!(cfg.audit.capacity_bytes, 255 * 1024);
    assert!(cfg.audit.sink.is_none());
    assert_eq!(cfg.policy.defaults.policy, Effect::Block);
    assert!(cfg.policy.rules.is_empty());
}

#[test]
fn wrong_version_is_rejected() {
    let err = config::load_from_str("version: 2\npolicy: {}\n").expect_err("must fail");
    assert_eq!(err.client_code().as_str(), "UNSUPPORTED_VERSION");
}

#[test]
fn capacity_below_minimum_is_rejected() {
    let bad = "version: 1\naudit: { capacity_bytes: 100 }\npolicy: {}\n";
    assert!(config::load_from_str(bad).is_err());
}

#[test]
fn sink_settings_are_validated() {
    let with_sink = |sink: &str| format!("version: 1\naudit:\n  sink: {sink}\npolicy: {{}}\n");

    let ok = config::load_from_str(&with_sink(
        r#"{ endpoint: "https://dav.example/audit.log", username: admin, password: admin }"#,
    ))
    .expect("must parse");
    let sink = ok.audit.sink.unwrap();
    assert_eq!(sink.max_attempts, 3);
    assert_eq!(sink.backoff_base_ms, 200);
    assert_eq!(sink.timeout_ms, 10_000);

    for bad in [
        r#"{ endpoint: "ftp://dav.example/audit.log" }"#,
        r#"{ endpoint: "https://x/a", auth: "Bearer t", username: admin }"#,
        r#"{ endpoint: "https://x/a", password: secret }"#,
        r#"{ endpoint: "https://x/a", max_attempts: 0 }"#,
        r#"{ endpoint: "https://x/a", timeout_ms: 5 }"#,
    ] {
        let err = config::load_from_str(&with_sink(bad)).expect_err(bad);
        assert_eq!(err.client_code().as_str(), "BAD_REQUEST", "{bad}");
    }
}

#[test]
fn operand_accepts_symbolic_aliases() {
    for (raw, want) in [("AND", Operand::And), ("and", Operand::And), ("\"&&\"", Operand::And), ("OR", Operand::Or), ("\"||\"", Operand::Or)] {
        let yaml = format!("rules:\n  - policy: free\n    operand: {raw}\n");
        let policy = config::policy_from_str(&yaml).expect(raw);
        assert_eq!(policy.rules[0].operand, want, "{raw}");
    }
}

#[test]
fn caller_matcher_needs_exactly_one_key() {
    let bad = "rules:\n  - policy: free\n    caller: [{ file_path: a, class_name: B }]\n";
    assert!(config::policy_from_str(bad).is_err());

    let bad = "rules:\n  - policy: free\n    caller: [{}]\n";
    assert!(config::policy_from_str(bad).is_err());
}

#[test]
fn camel_case_matcher_keys_are_accepted() {
    let yaml = r#"
rules:
  - policy: free
    caller:
      - filePath: "core/*"
      - fileName: "init.js"
      - ClassName: "Boot"
"#;
    let policy = config::policy_from_str(yaml).expect("must parse");
    assert_eq!(
        policy.rules[0].caller,
        vec![
            CallerMatcherConfig::FilePath("core/*".into()),
            CallerMatcherConfig::FileName("init.js".into()),
            CallerMatcherConfig::ClassName("Boot".into()),
        ]
    );
}

#[test]
fn full_config_parses() {
    let yaml = r#"
version: 1
server:
  listen: "0.0.0.0:9090"
enforcement:
  mode: lenient
  audit_all: false
  reference_doc: "https://docs.example/mediation"
audit:
  capacity_bytes: 4096
  auto_sync: false
  mirror: { level: info }
policy:
  defaults: { policy: free }
  mapping:
    io: [readFile]
  rules:
    - id: io-audit
      policy: audit
      group: [io]
      target: [own-subtree]
      comment: "file access"
"#;
    let cfg = config::load_from_str(yaml).expect("must parse");
    assert_eq!(cfg.enforcement.mode, EnforcementMode::Lenient);
    assert!(!cfg.enforcement.audit_all);
    assert!(!cfg.audit.auto_sync);
    assert!(cfg.audit.mirror.is_some());
    assert_eq!(cfg.policy.defaults.policy, Effect::Free);
    assert_eq!(cfg.policy.rules[0].target, vec!["own-subtree".to_string()]);
}

#[test]
fn retry_backoff_budget_is_capped() {
    let with_sink = |sink: &str| format!("version: 1\naudit:\n  sink: {sink}\npolicy: {{}}\n");

    // 60s * (2^9 - 1) would sleep for hours in one sync.
    let err = config::load_from_str(&with_sink(
        r#"{ endpoint: "https://x/a", backoff_base_ms: 60000, max_attempts: 10 }"#,
    ))
    .expect_err("must fail");
    assert_eq!(err.client_code().as_str(), "BAD_REQUEST");
    assert!(err.to_string().contains("backoff"));

    let ok = config::load_from_str(&with_sink(
        r#"{ endpoint: "https://x/a", backoff_base_ms: 200, max_attempts: 10 }"#,
    ))
    .expect("must parse");
    assert_eq!(ok.audit.sink.unwrap().backoff_budget_ms(), 200 * 511);
}
