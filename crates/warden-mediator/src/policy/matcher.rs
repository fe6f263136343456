//! Caller matcher compilation and matching utilities.
//!
//! Supports simple wildcard globs (`core/*`, `*.js`) with an optional
//! leading `!` negation for path and file-name matchers.

use warden_core::call::CallerIdentity;
use warden_core::error::{Result, WardenError};

use crate::config::schema::CallerMatcherConfig;

/// Compiled `*` wildcard pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Glob {
    negated: bool,
    // literal pieces between `*`s; len == stars + 1
    parts: Vec<String>,
}

impl Glob {
    pub fn compile(raw: &str) -> Result<Self> {
        let (negated, body) = match raw.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        if body.is_empty() {
            return Err(WardenError::BadRequest(format!(
                "invalid caller glob: {raw:?} (empty pattern)"
            )));
        }
        Ok(Self {
            negated,
            parts: body.split('*').map(str::to_string).collect(),
        })
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Match against a resolved value. Negation inverts the wildcard result.
    pub fn matches(&self, value: &str) -> bool {
        wildcard_match(&self.parts, value) != self.negated
    }
}

fn wildcard_match(parts: &[String], value: &str) -> bool {
    // No star: exact comparison.
    let (first, rest) = match parts.split_first() {
        Some(x) => x,
        None => return value.is_empty(),
    };
    if rest.is_empty() {
        return value == first;
    }
    let Some(tail) = value.strip_prefix(first.as_str()) else {
        return false;
    };

    let (last, middle) = match rest.split_last() {
        Some(x) => x,
        None => return true,
    };
    // Pin the suffix first so the middle pieces cannot consume it.
    let Some(mut tail) = tail.strip_suffix(last.as_str()) else {
        return false;
    };
    for part in middle {
        match tail.find(part.as_str()) {
            Some(idx) => tail = &tail[idx + part.len()..],
            None => return false,
        }
    }
    true
}

/// Compiled caller matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallerMatcher {
    FilePath(Glob),
    FileName(Glob),
    ClassName(String),
}

impl CallerMatcher {
    /// Unresolved identity fields never match, negated globs included.
    pub fn matches(&self, caller: &CallerIdentity) -> bool {
        match self {
            CallerMatcher::FilePath(g) => caller.file_path.as_deref().is_some_and(|p| g.matches(p)),
            CallerMatcher::FileName(g) => caller.file_name.as_deref().is_some_and(|n| g.matches(n)),
            CallerMatcher::ClassName(c) => caller.class_name.as_deref() == Some(c.as_str()),
        }
    }
}

pub fn compile_matchers(raw: &[CallerMatcherConfig]) -> Result<Vec<CallerMatcher>> {
    let mut out = Vec::with_capacity(raw.len());
    for m in raw {
        let compiled = match m {
            CallerMatcherConfig::FilePath(p) => CallerMatcher::FilePath(Glob::compile(p)?),
            CallerMatcherConfig::FileName(n) => CallerMatcher::FileName(Glob::compile(n)?),
            CallerMatcherConfig::ClassName(c) => {
                if c.is_empty() {
                    return Err(WardenError::BadRequest("class_name matcher must not be empty".into()));
                }
                CallerMatcher::ClassName(c.clone())
            }
        };
        out.push(compiled);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glob(s: &str) -> Glob {
        Glob::compile(s).unwrap_or_else(|e| panic!("{e}"))
    }

    #[test]
    fn prefix_glob() {
        let g = glob("core/*");
        assert!(g.matches("core/init.js"));
        assert!(g.matches("core/a/b.js"));
        assert!(g.matches("core/"));
        assert!(!g.matches("plugins/core/x.js"));
        assert!(!g.matches("cor"));
    }

    #[test]
    fn exact_and_star() {
        assert!(glob("CBoot.js").matches("CBoot.js"));
        assert!(!glob("CBoot.js").matches("CBoot.jsx"));
        assert!(glob("*").matches(""));
        assert!(glob("*").matches("anything"));
        assert!(glob("*.js").matches("x.js"));
        assert!(!glob("*.js").matches("x.ts"));
    }

    #[test]
    fn middle_stars() {
        let g = glob("v-*/components/*.js");
        assert!(g.matches("v-088/components/button.js"));
        assert!(!g.matches("v-088/widgets/button.js"));
        // overlapping prefix/suffix must not double-count
        assert!(!glob("ab*ba").matches("aba"));
        assert!(glob("ab*ba").matches("abba"));
    }

    #[test]
    fn negation() {
        let g = glob("!core/*");
        assert!(g.is_negated());
        assert!(!g.matches("core/init.js"));
        assert!(g.matches("plugins/x.js"));
    }

    #[test]
    fn rejects_empty() {
        assert!(Glob::compile("").is_err());
        assert!(Glob::compile("!").is_err());
    }

    #[test]
    fn unresolved_fields_never_match() {
        let m = CallerMatcher::FilePath(glob("!core/*"));
        assert!(!m.matches(&CallerIdentity::default()));
        let m = CallerMatcher::ClassName("CCompInstance".into());
        assert!(!m.matches(&CallerIdentity::from_path("core/a.js")));
    }
}
