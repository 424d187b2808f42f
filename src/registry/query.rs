//! Query predicates evaluated against registered names.

use std::fmt;

use serde_json::Value;

use super::ObjectRegistry;
use crate::domain::ObjectName;
use crate::error::RegistryError;

/// Failure while evaluating a query against one name.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The registry could not serve a lookup the predicate needed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The predicate could not interpret a value.
    #[error("query evaluation failed: {0}")]
    Evaluation(String),
}

/// A predicate over registered names.
///
/// `registry` is the registry the query was issued against, so
/// attribute-based predicates can read the candidate bean.
pub trait QueryExp: Send + Sync + fmt::Debug {
    /// Returns whether `name` is accepted.
    ///
    /// # Errors
    ///
    /// Any error excludes the candidate from the result.
    fn apply(&self, name: &ObjectName, registry: &dyn ObjectRegistry) -> Result<bool, QueryError>;
}

/// Accepts beans whose attribute equals a given value.
#[derive(Debug, Clone)]
pub struct AttributeEquals {
    attribute: String,
    value: Value,
}

impl AttributeEquals {
    /// Creates the predicate `attribute == value`.
    #[must_use]
    pub fn new(attribute: impl Into<String>, value: Value) -> Self {
        Self {
            attribute: attribute.into(),
            value,
        }
    }
}

impl QueryExp for AttributeEquals {
    fn apply(&self, name: &ObjectName, registry: &dyn ObjectRegistry) -> Result<bool, QueryError> {
        Ok(registry.get_attribute(name, &self.attribute)? == self.value)
    }
}

/// Accepts names whose key property is present and satisfies a glob.
#[derive(Debug, Clone)]
pub struct KeyPropertyMatches {
    key: String,
    glob: String,
}

impl KeyPropertyMatches {
    /// Creates the predicate; the glob supports `*` only as a prefix or
    /// suffix wildcard.
    #[must_use]
    pub fn new(key: impl Into<String>, glob: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            glob: glob.into(),
        }
    }
}

impl QueryExp for KeyPropertyMatches {
    fn apply(&self, name: &ObjectName, _registry: &dyn ObjectRegistry) -> Result<bool, QueryError> {
        let Some(value) = name.key_property(&self.key) else {
            return Ok(false);
        };
        let matched = match (self.glob.strip_prefix('*'), self.glob.strip_suffix('*')) {
            (Some(_), Some(_)) if self.glob.len() >= 2 => {
                value.contains(self.glob.trim_matches('*'))
            }
            (Some(suffix), _) => value.ends_with(suffix),
            (_, Some(prefix)) => value.starts_with(prefix),
            (None, None) => value == self.glob,
        };
        Ok(matched)
    }
}

/// Returns `true` if `name` is selected by `pattern` and accepted by
/// `query`, evaluating the query against `registry`.
///
/// A query error excludes the name.
pub fn selects(
    name: &ObjectName,
    pattern: Option<&ObjectName>,
    query: Option<&dyn QueryExp>,
    registry: &dyn ObjectRegistry,
) -> bool {
    if let Some(pattern) = pattern
        && !name.matches(pattern)
    {
        return false;
    }
    match query {
        None => true,
        Some(query) => match query.apply(name, registry) {
            Ok(accepted) => accepted,
            Err(err) => {
                tracing::debug!(%name, error = %err, "query failed on candidate, excluding");
                false
            }
        },
    }
}
