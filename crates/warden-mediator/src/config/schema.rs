use std::collections::BTreeMap;

use serde::Deserialize;
use warden_core::call::Effect;
use warden_core::error::{Result, WardenError};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WardenConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub enforcement: EnforcementSection,

    #[serde(default)]
    pub audit: AuditSection,

    pub policy: PolicyConfig,
}

impl WardenConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(WardenError::UnsupportedVersion);
        }

        self.audit.validate()?;
        self.policy.validate()?;

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

fn default_listen() -> String {
    "127.0.0.1:8080".into()
}

/// How blocked calls surface to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnforcementMode {
    /// Blocked calls abort with a fatal policy violation (debug builds).
    #[default]
    Strict,
    /// Blocked calls become no-ops and log a warning (production).
    Lenient,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnforcementSection {
    #[serde(default)]
    pub mode: EnforcementMode,

    /// Also push blocked calls into the audit buffer.
    #[serde(default = "default_true")]
    pub audit_all: bool,

    #[serde(default = "default_reference_doc")]
    pub reference_doc: String,
}

impl Default for EnforcementSection {
    fn default() -> Self {
        Self {
            mode: EnforcementMode::default(),
            audit_all: true,
            reference_doc: default_reference_doc(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_reference_doc() -> String {
    "docs/mediation.md".into()
}

/// Smallest accepted buffer capacity; the entry prefix must always fit.
pub const MIN_CAPACITY_BYTES: usize = 256;
const MAX_CAPACITY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditSection {
    #[serde(default = "default_capacity_bytes")]
    pub capacity_bytes: usize,

    /// Trigger a background sync after every push.
    #[serde(default = "default_true")]
    pub auto_sync: bool,

    #[serde(default)]
    pub sink: Option<SinkSection>,

    #[serde(default)]
    pub mirror: Option<MirrorSection>,
}

impl Default for AuditSection {
    fn default() -> Self {
        Self {
            capacity_bytes: default_capacity_bytes(),
            auto_sync: true,
            sink: None,
            mirror: None,
        }
    }
}

impl AuditSection {
    pub fn validate(&self) -> Result<()> {
        if !(MIN_CAPACITY_BYTES..=MAX_CAPACITY_BYTES).contains(&self.capacity_bytes) {
            return Err(WardenError::BadRequest(format!(
                "audit.capacity_bytes must be between {MIN_CAPACITY_BYTES} and {MAX_CAPACITY_BYTES}"
            )));
        }
        if let Some(sink) = &self.sink {
            sink.validate()?;
        }
        Ok(())
    }
}

fn default_capacity_bytes() -> usize {
    255 * 1024
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SinkSection {
    pub endpoint: String,

    /// Literal `Authorization` header value.
    #[serde(default)]
    pub auth: Option<String>,

    /// HTTP Basic credentials; mutually exclusive with `auth`.
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

impl SinkSection {
    pub fn validate(&self) -> Result<()> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(WardenError::BadRequest(
                "audit.sink.endpoint must be an http(s) URL".into(),
            ));
        }
        if self.auth.is_some() && self.username.is_some() {
            return Err(WardenError::BadRequest(
                "audit.sink.auth and audit.sink.username are mutually exclusive".into(),
            ));
        }
        if self.password.is_some() && self.username.is_none() {
            return Err(WardenError::BadRequest(
                "audit.sink.password requires audit.sink.username".into(),
            ));
        }
        if !(100..=120_000).contains(&self.timeout_ms) {
            return Err(WardenError::BadRequest(
                "audit.sink.timeout_ms must be between 100 and 120000".into(),
            ));
        }
        if !(1..=10).contains(&self.max_attempts) {
            return Err(WardenError::BadRequest(
                "audit.sink.max_attempts must be between 1 and 10".into(),
            ));
        }
        if self.backoff_base_ms > 60_000 {
            return Err(WardenError::BadRequest(
                "audit.sink.backoff_base_ms must be at most 60000".into(),
            ));
        }
        if self.backoff_budget_ms() > MAX_BACKOFF_BUDGET_MS {
            return Err(WardenError::BadRequest(format!(
                "audit.sink backoff sleeps {} ms per sync (max {MAX_BACKOFF_BUDGET_MS}); lower max_attempts or backoff_base_ms",
                self.backoff_budget_ms()
            )));
        }
        Ok(())
    }

    /// Total sleep of one exhausted sync: `base * (2^(attempts-1) - 1)`.
    pub fn backoff_budget_ms(&self) -> u64 {
        let doublings = self.max_attempts.saturating_sub(1).min(16);
        self.backoff_base_ms.saturating_mul((1u64 << doublings) - 1)
    }
}

/// Upper bound on the summed retry sleeps of one sync session.
pub const MAX_BACKOFF_BUDGET_MS: u64 = 5 * 60 * 1000;

fn default_timeout_ms() -> u64 {
    10_000
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_base_ms() -> u64 {
    200
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MirrorLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl MirrorLevel {
    pub fn to_level(self) -> tracing::Level {
        match self {
            MirrorLevel::Error => tracing::Level::ERROR,
            MirrorLevel::Warn => tracing::Level::WARN,
            MirrorLevel::Info => tracing::Level::INFO,
            MirrorLevel::Debug => tracing::Level::DEBUG,
            MirrorLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Streams the process's own log events into the audit buffer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MirrorSection {
    #[serde(default)]
    pub level: MirrorLevel,
}

// --------------------
// Policy rules
// --------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    #[serde(default)]
    pub defaults: PolicyDefaults,

    #[serde(default)]
    pub rules: Vec<RuleConfig>,

    /// Group tag -> primitive names. Built-in groups apply when omitted.
    #[serde(default)]
    pub mapping: Option<BTreeMap<String, Vec<String>>>,
}

impl PolicyConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(mapping) = &self.mapping {
            for (tag, prims) in mapping {
                if tag.is_empty() {
                    return Err(WardenError::BadRequest("policy.mapping has an empty group tag".into()));
                }
                if prims.iter().any(String::is_empty) {
                    return Err(WardenError::BadRequest(format!(
                        "policy.mapping.{tag} contains an empty primitive name"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyDefaults {
    #[serde(default = "default_policy")]
    pub policy: Effect,
}

impl Default for PolicyDefaults {
    fn default() -> Self {
        Self {
            policy: default_policy(),
        }
    }
}

fn default_policy() -> Effect {
    Effect::Block
}

/// How multiple caller matchers combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum Operand {
    #[default]
    #[serde(rename = "AND", alias = "and", alias = "&&")]
    And,
    #[serde(rename = "OR", alias = "or", alias = "||")]
    Or,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    #[serde(default)]
    pub id: Option<String>,

    pub policy: Effect,

    #[serde(default)]
    pub operand: Operand,

    #[serde(default)]
    pub group: Option<Vec<String>>,

    #[serde(default)]
    pub method: Option<Vec<String>>,

    #[serde(default)]
    pub caller: Vec<CallerMatcherConfig>,

    /// Scope tags the call context must satisfy (all of them).
    #[serde(default)]
    pub target: Vec<String>,

    #[serde(default)]
    pub comment: Option<String>,
}

/// One caller matcher. Written in YAML as a single-key map, e.g.
/// `{ file_path: "core/*" }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawCallerMatcher")]
pub enum CallerMatcherConfig {
    FilePath(String),
    FileName(String),
    ClassName(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCallerMatcher {
    #[serde(default, alias = "filePath")]
    file_path: Option<String>,
    #[serde(default, alias = "fileName")]
    file_name: Option<String>,
    #[serde(default, alias = "className", alias = "ClassName")]
    class_name: Option<String>,
}

impl TryFrom<RawCallerMatcher> for CallerMatcherConfig {
    type Error = String;

    fn try_from(raw: RawCallerMatcher) -> std::result::Result<Self, Self::Error> {
        match (raw.file_path, raw.file_name, raw.class_name) {
            (Some(p), None, None) => Ok(CallerMatcherConfig::FilePath(p)),
            (None, Some(n), None) => Ok(CallerMatcherConfig::FileName(n)),
            (None, None, Some(c)) => Ok(CallerMatcherConfig::ClassName(c)),
            _ => Err("caller matcher must set exactly one of file_path, file_name, class_name".into()),
        }
    }
}
