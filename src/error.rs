//! Materialization error types
//!
//! Every variant is a contract violation between the declared mappings and the
//! rows actually fed to the builder. None of them are transient, so nothing in
//! the crate retries on them.

use crate::mapping::EntityType;

/// Errors raised while turning joined rows into an entity graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterializeError {
    /// An entity type was registered that was not declared when the builder was created
    UnknownEntity { entity: EntityType },
    /// More registrations in one row than declared occurrence slots
    SlotOverflow { capacity: usize },
    /// A row was ended with the wrong number of registrations
    RowShape { expected: usize, registered: usize },
    /// A type-erased instance did not hold the type an accessor expected
    TypeMismatch { expected: EntityType, found: EntityType },
    /// A mapping was built without key properties
    MissingKey { entity: EntityType },
}

impl std::fmt::Display for MaterializeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaterializeError::UnknownEntity { entity } => {
                write!(f, "Configuration error: entity {entity} is not part of this query's mappings")
            }
            MaterializeError::SlotOverflow { capacity } => {
                write!(
                    f,
                    "Invalid operation: more than {capacity} instances registered for a single row"
                )
            }
            MaterializeError::RowShape {
                expected,
                registered,
            } => write!(
                f,
                "Row shape error: expected {expected} registered instances, got {registered}"
            ),
            MaterializeError::TypeMismatch { expected, found } => {
                write!(f, "Type mismatch: expected an instance of {expected}, found {found}")
            }
            MaterializeError::MissingKey { entity } => {
                write!(f, "Configuration error: entity {entity} has no key properties")
            }
        }
    }
}

impl std::error::Error for MaterializeError {}

#[cfg(test)]
mod tests {
    use super::*;

    struct Order;

    #[test]
    fn test_unknown_entity_display() {
        let err = MaterializeError::UnknownEntity {
            entity: EntityType::of::<Order>(),
        };
        let display = err.to_string();
        assert!(display.contains("Configuration error"));
        assert!(display.contains("Order"));
    }

    #[test]
    fn test_row_shape_display() {
        let err = MaterializeError::RowShape {
            expected: 3,
            registered: 2,
        };
        let display = err.to_string();
        assert!(display.contains("Row shape error"));
        assert!(display.contains("expected 3"));
        assert!(display.contains("got 2"));
    }

    #[test]
    fn test_slot_overflow_display() {
        let err = MaterializeError::SlotOverflow { capacity: 2 };
        assert!(err.to_string().contains("more than 2"));
    }
}
