use std::collections::HashSet;

use warden_core::call::{CallDescriptor, CallerIdentity, Effect};
use warden_core::error::{Result, WardenError};
use warden_core::groups::GroupRegistry;

use crate::config::schema::{Operand, PolicyConfig, RuleConfig};

use super::matcher::{compile_matchers, CallerMatcher};

/// Compiled, immutable policy rule.
#[derive(Debug, Clone)]
pub struct PolicyRule {
    id: String,
    policy: Effect,
    operand: Operand,
    groups: Option<Vec<String>>,
    methods: Option<Vec<String>>,
    caller: Vec<CallerMatcher>,
    target: Vec<String>,
    comment: Option<String>,
}

impl PolicyRule {
    fn compile(index: usize, raw: &RuleConfig, registry: &GroupRegistry) -> Result<Self> {
        let id = raw.id.clone().unwrap_or_else(|| format!("rule-{index}"));

        if let Some(groups) = &raw.group {
            for tag in groups {
                if !registry.contains_group(tag) {
                    return Err(WardenError::BadRequest(format!(
                        "rule {id} references unknown group: {tag}"
                    )));
                }
            }
        }
        if let Some(methods) = &raw.method {
            for m in methods {
                if !registry.is_known_primitive(m) {
                    tracing::warn!(rule=%id, method=%m, "rule names a method outside every group");
                }
            }
        }

        let caller = compile_matchers(&raw.caller)
            .map_err(|e| WardenError::BadRequest(format!("rule {id}: {e}")))?;

        Ok(Self {
            id,
            policy: raw.policy,
            operand: raw.operand,
            groups: raw.group.clone(),
            methods: raw.method.clone(),
            caller,
            target: raw.target.clone(),
            comment: raw.comment.clone(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn policy(&self) -> Effect {
        self.policy
    }
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Group/method filter. The two filters are additive: a method hit OR a
    /// group hit admits the call. No filter admits every primitive.
    pub fn admits_primitive(&self, primitive: &str, call_groups: &[String]) -> bool {
        if self.groups.is_none() && self.methods.is_none() {
            return true;
        }
        let by_method = self
            .methods
            .as_ref()
            .is_some_and(|ms| ms.iter().any(|m| m == primitive));
        let by_group = self
            .groups
            .as_ref()
            .is_some_and(|gs| gs.iter().any(|g| call_groups.contains(g)));
        by_method || by_group
    }

    /// Empty matcher list matches every caller.
    pub fn admits_caller(&self, caller: &CallerIdentity) -> bool {
        match self.operand {
            Operand::Or if !self.caller.is_empty() => self.caller.iter().any(|m| m.matches(caller)),
            _ => self.caller.iter().all(|m| m.matches(caller)),
        }
    }

    pub fn admits_target(&self, target: &dyn Fn(&str) -> bool) -> bool {
        self.target.iter().all(|tag| target(tag))
    }
}

/// Output of evaluation. `rule == None` means the default applied.
#[derive(Debug, Clone, Copy)]
pub struct Decision<'a> {
    pub effect: Effect,
    pub rule: Option<&'a PolicyRule>,
}

impl<'a> Decision<'a> {
    /// Matched rule id, or `"default"`.
    pub fn rule_id(&self) -> &'a str {
        self.rule.map(PolicyRule::id).unwrap_or("default")
    }

    pub fn is_default(&self) -> bool {
        self.rule.is_none()
    }
}

impl PartialEq for Decision<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.effect == other.effect && self.rule_id() == other.rule_id()
    }
}

/// Process-wide policy state: ordered rules, default effect, group registry.
/// Construct once at startup, then share via Arc.
#[derive(Debug)]
pub struct PolicyEngine {
    rules: Vec<PolicyRule>,
    default_effect: Effect,
    registry: GroupRegistry,
}

impl PolicyEngine {
    pub fn compile(cfg: &PolicyConfig) -> Result<Self> {
        let registry = match &cfg.mapping {
            Some(m) => GroupRegistry::new(m.clone()),
            None => GroupRegistry::builtin(),
        };

        let mut rules = Vec::with_capacity(cfg.rules.len());
        let mut seen = HashSet::new();
        for (i, raw) in cfg.rules.iter().enumerate() {
            let rule = PolicyRule::compile(i, raw, &registry)?;
            if !seen.insert(rule.id.clone()) {
                return Err(WardenError::BadRequest(format!("duplicate rule id: {}", rule.id)));
            }
            rules.push(rule);
        }

        tracing::debug!(rules = rules.len(), default = %cfg.defaults.policy, "policy engine compiled");

        Ok(Self {
            rules,
            default_effect: cfg.defaults.policy,
            registry,
        })
    }

    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }
    pub fn default_effect(&self) -> Effect {
        self.default_effect
    }
    pub fn registry(&self) -> &GroupRegistry {
        &self.registry
    }

    /// Evaluate with the call's reported target scopes as the target predicate.
    pub fn evaluate(&self, call: &CallDescriptor, caller: &CallerIdentity) -> Decision<'_> {
        self.evaluate_with(call, caller, &|tag| call.has_target(tag))
    }

    /// First matching rule wins; no match yields the configured default.
    pub fn evaluate_with(
        &self,
        call: &CallDescriptor,
        caller: &CallerIdentity,
        target: &dyn Fn(&str) -> bool,
    ) -> Decision<'_> {
        let groups = self.registry.groups_of(&call.primitive);

        let matched = self.rules.iter().find(|r| {
            r.admits_primitive(&call.primitive, groups)
                && r.admits_caller(caller)
                && r.admits_target(target)
        });

        match matched {
            Some(rule) => Decision {
                effect: rule.policy,
                rule: Some(rule),
            },
            None => Decision {
                effect: self.default_effect,
                rule: None,
            },
        }
    }
}
