//! Call descriptors and caller identities.
//!
//! Both values are produced by the interception layer for every mediated
//! call. Identity is pre-resolved at the call site (module/class tags
//! assigned at registration time); nothing here inspects stack traces.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Resolved origin of a mediated call. Every field is best-effort.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CallerIdentity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
}

impl CallerIdentity {
    /// Identity with only a file path. The file name is derived from the
    /// last path segment.
    pub fn from_path(path: impl Into<String>) -> Self {
        let path = path.into();
        let file_name = path
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        Self {
            file_path: Some(path),
            file_name,
            class_name: None,
        }
    }

    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    /// True when the provider resolved nothing at all.
    pub fn is_unresolved(&self) -> bool {
        self.file_path.is_none() && self.file_name.is_none() && self.class_name.is_none()
    }
}

impl fmt::Display for CallerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unresolved() {
            return f.write_str("<unknown>");
        }
        let where_ = self
            .file_path
            .as_deref()
            .or(self.file_name.as_deref())
            .unwrap_or("?");
        match &self.class_name {
            Some(class) => write!(f, "{class}@{where_}"),
            None => f.write_str(where_),
        }
    }
}

/// A single intercepted call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CallDescriptor {
    /// Concrete primitive name (e.g. `addEventListener`).
    pub primitive: String,
    /// Scope tags the call context reports as satisfied, e.g. the event
    /// target lies inside the caller's own confined subtree.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub targets: BTreeSet<String>,
}

impl CallDescriptor {
    pub fn new(primitive: impl Into<String>) -> Self {
        Self {
            primitive: primitive.into(),
            targets: BTreeSet::new(),
        }
    }

    pub fn with_target(mut self, tag: impl Into<String>) -> Self {
        self.targets.insert(tag.into());
        self
    }

    pub fn has_target(&self, tag: &str) -> bool {
        self.targets.contains(tag)
    }
}

/// Effect of a policy decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    /// Proceed unmodified, no log.
    Free,
    /// Proceed and record an audit entry.
    Audit,
    /// Suppress the call.
    Block,
}

impl Effect {
    pub fn as_str(self) -> &'static str {
        match self {
            Effect::Free => "free",
            Effect::Audit => "audit",
            Effect::Block => "block",
        }
    }

    pub fn proceeds(self) -> bool {
        !matches!(self, Effect::Block)
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_path_derives_file_name() {
        let id = CallerIdentity::from_path("plugins/x.js");
        assert_eq!(id.file_name.as_deref(), Some("x.js"));
        assert_eq!(id.to_string(), "plugins/x.js");
    }

    #[test]
    fn display_unresolved() {
        assert_eq!(CallerIdentity::default().to_string(), "<unknown>");
        let id = CallerIdentity::default().with_class("CCompInstance");
        assert_eq!(id.to_string(), "CCompInstance@?");
    }
}
