//! Policy layer (caller matchers, ordered rules, effect resolution).
//!
//! Compiles the rule configuration into an immutable engine that the
//! mediation facade and the HTTP surface evaluate at runtime.

pub mod engine;
pub mod matcher;

pub use engine::{Decision, PolicyEngine, PolicyRule};
pub use matcher::{CallerMatcher, Glob};
