//! Graph materialization over joined rows
//!
//! [`RelationshipInstanceBuilder`] is the low-level, per-query engine: register
//! one instance per lane, end the row, repeat. [`materialize`] and
//! [`GraphStream`] drive it over tuples of entities.

mod builder;
mod container;
mod identity;
mod row;
mod stream;

pub use builder::{MaterializeStats, RelationshipInstanceBuilder};
pub use container::EntityInstanceContainer;
pub use identity::{InstanceIdentity, SlotIdentity};
pub use row::JoinedRow;
pub use stream::{materialize, GraphStream};
