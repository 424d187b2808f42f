//! Subtype checks supplied by the embedding environment.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

/// Answers "is `subtype` assignable to `supertype`?" for type names.
///
/// Used to answer `is_instance_of` for pending names without
/// materializing the bean.
pub trait TypeHierarchy: Send + Sync + fmt::Debug {
    /// `module` is the bean source's owning module, when known.
    fn is_subtype(&self, module: Option<&str>, subtype: &str, supertype: &str) -> bool;
}

/// A fixed table of direct supertypes, searched transitively.
#[derive(Debug, Default, Clone)]
pub struct StaticTypeHierarchy {
    supertypes: HashMap<String, Vec<String>>,
}

impl StaticTypeHierarchy {
    /// Creates an empty hierarchy in which only identical names match.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `subtype` directly extends `supertype`.
    #[must_use]
    pub fn with_supertype(mut self, subtype: impl Into<String>, supertype: impl Into<String>) -> Self {
        self.supertypes
            .entry(subtype.into())
            .or_default()
            .push(supertype.into());
        self
    }
}

impl TypeHierarchy for StaticTypeHierarchy {
    fn is_subtype(&self, _module: Option<&str>, subtype: &str, supertype: &str) -> bool {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([subtype]);
        while let Some(current) = queue.pop_front() {
            if current == supertype {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(parents) = self.supertypes.get(current) {
                queue.extend(parents.iter().map(String::as_str));
            }
        }
        false
    }
}
