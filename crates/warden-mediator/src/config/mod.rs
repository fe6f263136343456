//! Mediator config loader (strict parsing).

pub mod schema;

use std::fs;

use warden_core::error::{Result, WardenError};

pub use schema::{
    AuditSection, CallerMatcherConfig, EnforcementMode, EnforcementSection, Operand,
    PolicyConfig, RuleConfig, SinkSection, WardenConfig,
};

pub fn load_from_file(path: &str) -> Result<WardenConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| WardenError::Internal(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<WardenConfig> {
    let cfg: WardenConfig = serde_yaml::from_str(s)
        .map_err(|e| WardenError::BadRequest(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Parse only a policy document (`defaults` / `rules` / `mapping`).
pub fn policy_from_str(s: &str) -> Result<PolicyConfig> {
    let policy: PolicyConfig = serde_yaml::from_str(s)
        .map_err(|e| WardenError::BadRequest(format!("invalid yaml: {e}")))?;
    policy.validate()?;
    Ok(policy)
}
