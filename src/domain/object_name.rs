//! Hierarchical object names and name patterns.
//!
//! An [`ObjectName`] has the canonical form `domain:key=value[,key=value]*`.
//! Key properties are unordered: `a:x=1,y=2` and `a:y=2,x=1` are the same
//! name. A name becomes a *pattern* when its domain contains `*` or `?`, or
//! when its property list carries a trailing `*` (any further properties
//! allowed).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Characters that may never appear in a key or a value.
const RESERVED: [char; 5] = [':', '=', ',', '*', '?'];

/// Errors raised while parsing an [`ObjectName`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ObjectNameError {
    /// The string has no `:` between domain and key properties.
    #[error("object name {0:?} has no domain separator")]
    MissingDomainSeparator(String),

    /// The domain part is empty or contains a reserved character.
    #[error("invalid domain {0:?}")]
    InvalidDomain(String),

    /// The name has no key properties and is not a property pattern.
    #[error("object name {0:?} has no key properties")]
    EmptyKeyProperties(String),

    /// A key property is not of the form `key=value`.
    #[error("malformed key property {0:?}")]
    MalformedProperty(String),

    /// The same key appears twice.
    #[error("duplicate key {0:?}")]
    DuplicateKey(String),
}

/// Unique key identifying a registrable management object.
///
/// Used as the map key in [`super::DeferredRegistry`] and in every
/// [`crate::registry::ObjectRegistry`] operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectName {
    domain: String,
    properties: BTreeMap<String, String>,
    property_pattern: bool,
}

impl ObjectName {
    /// Parses a name from its string form.
    ///
    /// # Errors
    ///
    /// Returns an [`ObjectNameError`] describing the first syntax problem.
    pub fn parse(input: &str) -> Result<Self, ObjectNameError> {
        let (domain, props) = input
            .split_once(':')
            .ok_or_else(|| ObjectNameError::MissingDomainSeparator(input.to_string()))?;

        if domain.is_empty() || domain.contains(['=', ',', ':']) {
            return Err(ObjectNameError::InvalidDomain(domain.to_string()));
        }

        let mut properties = BTreeMap::new();
        let mut property_pattern = false;
        for part in props.split(',').filter(|p| !p.is_empty()) {
            if part == "*" {
                property_pattern = true;
                continue;
            }
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| ObjectNameError::MalformedProperty(part.to_string()))?;
            if key.is_empty()
                || value.is_empty()
                || key.contains(RESERVED)
                || value.contains(RESERVED)
                || value.contains('"')
            {
                return Err(ObjectNameError::MalformedProperty(part.to_string()));
            }
            if properties
                .insert(key.to_string(), value.to_string())
                .is_some()
            {
                return Err(ObjectNameError::DuplicateKey(key.to_string()));
            }
        }

        if properties.is_empty() && !property_pattern {
            return Err(ObjectNameError::EmptyKeyProperties(input.to_string()));
        }

        Ok(Self {
            domain: domain.to_string(),
            properties,
            property_pattern,
        })
    }

    /// The pattern `*:*`, matching every name.
    #[must_use]
    pub fn wildcard() -> Self {
        Self {
            domain: "*".to_string(),
            properties: BTreeMap::new(),
            property_pattern: true,
        }
    }

    /// Returns the domain component.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Returns the value of a key property, if present.
    #[must_use]
    pub fn key_property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Returns all key properties in canonical (sorted) order.
    #[must_use]
    pub fn key_properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Returns `true` if the domain contains wildcards.
    #[must_use]
    pub fn is_domain_pattern(&self) -> bool {
        self.domain.contains(['*', '?'])
    }

    /// Returns `true` if the property list ends with `*`.
    #[must_use]
    pub const fn is_property_pattern(&self) -> bool {
        self.property_pattern
    }

    /// Returns `true` if this name is a pattern of either kind.
    #[must_use]
    pub fn is_pattern(&self) -> bool {
        self.is_domain_pattern() || self.property_pattern
    }

    /// Returns `true` if this name is selected by `pattern`.
    ///
    /// A non-pattern `pattern` selects only a name equal to it.
    #[must_use]
    pub fn matches(&self, pattern: &Self) -> bool {
        if !wildcard_match(&pattern.domain, &self.domain) {
            return false;
        }
        if pattern.property_pattern {
            pattern
                .properties
                .iter()
                .all(|(k, v)| self.properties.get(k) == Some(v))
        } else {
            pattern.properties == self.properties
        }
    }

    /// Returns the canonical string form.
    #[must_use]
    pub fn canonical_name(&self) -> String {
        self.to_string()
    }
}

/// Glob match supporting `*` (any run) and `?` (one character).
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        match p.get(pi) {
            Some('*') => {
                backtrack = Some((pi, ti));
                pi += 1;
            }
            Some(&c) if c == '?' || t.get(ti) == Some(&c) => {
                pi += 1;
                ti += 1;
            }
            _ => match backtrack {
                Some((star, start)) => {
                    pi = star + 1;
                    ti = start + 1;
                    backtrack = Some((star, start + 1));
                }
                None => return false,
            },
        }
    }
    p.iter().skip(pi).all(|&c| c == '*')
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.domain)?;
        let mut first = true;
        for (key, value) in &self.properties {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{key}={value}")?;
            first = false;
        }
        if self.property_pattern {
            f.write_str(if first { "*" } else { ",*" })?;
        }
        Ok(())
    }
}

impl FromStr for ObjectName {
    type Err = ObjectNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ObjectName {
    type Error = ObjectNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ObjectName> for String {
    fn from(name: ObjectName) -> Self {
        name.to_string()
    }
}
