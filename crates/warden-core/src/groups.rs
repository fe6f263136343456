//! Method group registry: short group tags -> concrete primitive names.

use std::collections::{BTreeMap, HashMap};

/// Static mapping from group tag to the primitives it covers, with a reverse
/// index so a primitive resolves to its groups in one lookup.
///
/// A primitive may belong to several groups; `groups_of` returns them in tag
/// order.
#[derive(Debug, Clone, Default)]
pub struct GroupRegistry {
    groups: BTreeMap<String, Vec<String>>,
    by_primitive: HashMap<String, Vec<String>>,
}

impl GroupRegistry {
    pub fn new(mapping: BTreeMap<String, Vec<String>>) -> Self {
        let mut by_primitive: HashMap<String, Vec<String>> = HashMap::new();
        for (tag, prims) in &mapping {
            for p in prims {
                let tags = by_primitive.entry(p.clone()).or_default();
                if !tags.contains(tag) {
                    tags.push(tag.clone());
                }
            }
        }
        Self {
            groups: mapping,
            by_primitive,
        }
    }

    /// Default primitive groups for a browser-like host.
    pub fn builtin() -> Self {
        const BUILTIN: &[(&str, &[&str])] = &[
            ("ev", &["addEventListener", "removeEventListener", "dispatchEvent", "CustomEvent"]),
            ("dm", &["createElement", "appendChild", "querySelector", "innerHTML"]),
            ("tm", &["setInterval", "setTimeout", "requestAnimationFrame"]),
            ("cn", &["log", "warn", "error", "info", "clear"]),
            ("nt", &["fetch", "XMLHttpRequest", "localStorage", "indexedDB"]),
            ("st", &["sys.stat"]),
            ("nv", &["userAgent", "geolocation"]),
            ("md", &["getUserMedia", "enumerateDevices", "log.stream"]),
        ];

        let mapping = BUILTIN
            .iter()
            .map(|(tag, prims)| {
                (
                    tag.to_string(),
                    prims.iter().map(|p| p.to_string()).collect(),
                )
            })
            .collect();
        Self::new(mapping)
    }

    /// Groups covering `primitive` (possibly none).
    pub fn groups_of(&self, primitive: &str) -> &[String] {
        self.by_primitive
            .get(primitive)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Primitives covered by `tag`.
    pub fn primitives(&self, tag: &str) -> &[String] {
        self.groups.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_group(&self, tag: &str) -> bool {
        self.groups.contains_key(tag)
    }

    pub fn is_known_primitive(&self, primitive: &str) -> bool {
        self.by_primitive.contains_key(primitive)
    }
}
