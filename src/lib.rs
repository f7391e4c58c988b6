//! # Lifeline
//!
//! Entity graph materialization for joined queries over `may_postgres`.
//!
//! A joined SQL query repeats the parent's columns on every child row. Lifeline
//! collapses those repeats into one canonical object per entity key, creates
//! collection navigation properties on first sight, and links each row's
//! entities to each other as declared by their [`EntityMapping`]s. Outer join
//! misses (`None` lanes) are skipped.
//!
//! ```
//! use lifeline::mapping::{EntityMapping, Shared};
//! use lifeline::{materialize, MaterializeConfig};
//! use std::rc::Weak;
//! use std::cell::RefCell;
//!
//! #[derive(Default)]
//! struct Order { id: i32, line_items: Vec<Shared<LineItem>> }
//! #[derive(Default)]
//! struct LineItem { id: i32, order: Option<Weak<RefCell<Order>>> }
//!
//! let orders = EntityMapping::builder::<Order>("orders")
//!     .key(|o: &Order| vec![o.id.into()])
//!     .has_many(|o: &mut Order| &mut o.line_items)
//!     .build()?;
//! let line_items = EntityMapping::builder::<LineItem>("line_items")
//!     .key(|li: &LineItem| vec![li.id.into()])
//!     .belongs_to(|li: &mut LineItem| &mut li.order)
//!     .build()?;
//!
//! let rows = vec![
//!     (Some(Order { id: 1, ..Default::default() }), Some(LineItem { id: 10, ..Default::default() })),
//!     (Some(Order { id: 1, ..Default::default() }), Some(LineItem { id: 11, ..Default::default() })),
//! ];
//! let orders = materialize([orders, line_items], rows, &MaterializeConfig::default())?;
//!
//! assert_eq!(orders.len(), 1);
//! assert_eq!(orders[0].borrow().line_items.len(), 2);
//! # Ok::<(), lifeline::MaterializeError>(())
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod mapping;
pub mod materialize;
pub mod metrics;
pub mod query;

pub use config::{EdgePolicy, MaterializeConfig};
pub use error::MaterializeError;
pub use executor::{LifeError, LifeExecutor, MayPostgresExecutor};
pub use mapping::{shared, EntityMapping, Shared};
pub use materialize::{materialize, GraphStream, RelationshipInstanceBuilder};
pub use query::{query_graph, FromJoinedRow};
