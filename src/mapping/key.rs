//! Deduplication keys built from an entity's key property values
//!
//! Two freshly materialized rows describe the same logical entity when their
//! key property values are equal, so `EntityKey` compares values and never the
//! objects they were read from.

use sea_query::Value;

/// Ordered key property values of one entity instance
///
/// Equality and hashing are those of `sea_query::Value`: timestamps with a time
/// zone compare by instant, and floats compare as ordered floats, so `NaN`
/// equals `NaN` and `0.0` equals `-0.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    values: Vec<Value>,
}

impl EntityKey {
    /// Create a key from ordered key property values
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// The key property values, in mapping order
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Number of key properties in this key
    pub fn arity(&self) -> usize {
        self.values.len()
    }
}

impl From<Vec<Value>> for EntityKey {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}
