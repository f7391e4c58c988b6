//! Relationship-aware instance builder
//!
//! Turns the flat rows of a joined result set back into a graph of distinct
//! entities. Every row registers one instance per participating entity
//! occurrence, in a fixed order, then ends the row:
//!
//! 1. `register` resolves each instance against the entities already seen,
//!    collapsing duplicates onto the first (canonical) instance.
//! 2. `end_row` binds every pair of lanes in which at least one side became
//!    canonical on this row, in both directions; only the direction with a
//!    mapped relationship takes effect.
//!
//! A builder lives for exactly one query execution and is not shared.
//!
//! # Example
//!
//! ```
//! use lifeline::mapping::{shared, EntityMapping, Shared};
//! use lifeline::materialize::RelationshipInstanceBuilder;
//! use std::cell::RefCell;
//! use std::rc::Weak;
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
//! let items = EntityMapping::builder::<LineItem>("line_items")
//!     .key(|li: &LineItem| vec![li.id.into()])
//!     .belongs_to(|li: &mut LineItem| &mut li.order)
//!     .build()?;
//!
//! let mut builder = RelationshipInstanceBuilder::new([orders, items]);
//! let mut roots = Vec::new();
//! for (order_id, item_id) in [(1, 10), (1, 11)] {
//!     let root = builder.register(Some(shared(Order { id: order_id, ..Default::default() })))?;
//!     builder.register(Some(shared(LineItem { id: item_id, ..Default::default() })))?;
//!     builder.end_row()?;
//!     if !root.is_duplicate() {
//!         roots.extend(root.into_unique_instance());
//!     }
//! }
//!
//! assert_eq!(roots.len(), 1);
//! assert_eq!(roots[0].borrow().line_items.len(), 2);
//! # Ok::<(), lifeline::MaterializeError>(())
//! ```

use crate::config::{EdgePolicy, MaterializeConfig};
use crate::error::MaterializeError;
use crate::mapping::{EntityMapping, EntityType, ErasedInstance, Shared};
use crate::materialize::container::EntityInstanceContainer;
use crate::materialize::identity::{InstanceIdentity, SlotIdentity};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;

/// Counters collected over one query's row stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterializeStats {
    /// Rows ended
    pub rows: u64,
    /// Instances registered, including absent lanes
    pub registrations: u64,
    /// Present instances collapsed onto an already known entity
    pub duplicates: u64,
    /// Lanes without an instance (outer join misses)
    pub absent: u64,
    /// Navigation properties assigned or appended
    pub binds: u64,
    /// Appends skipped because the child was already in the owner's collection
    pub suppressed_edges: u64,
    /// Lane pairs bound in neither direction because no relationship is mapped
    pub skipped_binds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BindOutcome {
    Bound,
    Suppressed,
    Unrelated,
    Absent,
}

/// Builds a deduplicated, linked entity graph from joined result rows
#[derive(Debug)]
pub struct RelationshipInstanceBuilder {
    containers: Vec<EntityInstanceContainer>,
    container_index: HashMap<EntityType, usize>,
    occurrences: usize,
    row: Vec<SlotIdentity>,
    rejected_in_row: usize,
    edge_policy: EdgePolicy,
    log_skipped_binds: bool,
    bound_edges: HashSet<(usize, usize)>,
    stats: MaterializeStats,
}

impl RelationshipInstanceBuilder {
    /// Create a builder for rows carrying one instance per mapping, in mapping order
    pub fn new(mappings: impl IntoIterator<Item = Arc<EntityMapping>>) -> Self {
        Self::with_config(mappings, &MaterializeConfig::default())
    }

    /// Create a builder with explicit materialization settings
    ///
    /// Containers are keyed by entity type. A type listed more than once gets a
    /// single container but still counts one occurrence slot per listing. Only
    /// the first mapping of such a type is used: keys and relationships of the
    /// later listings are ignored, even when they are distinct mappings.
    pub fn with_config(
        mappings: impl IntoIterator<Item = Arc<EntityMapping>>,
        config: &MaterializeConfig,
    ) -> Self {
        let mut containers: Vec<EntityInstanceContainer> = Vec::new();
        let mut container_index: HashMap<EntityType, usize> = HashMap::new();
        let mut occurrences = 0;

        for mapping in mappings {
            occurrences += 1;
            let entity_type = mapping.entity_type();
            if let Some(&index) = container_index.get(&entity_type) {
                let first = &containers[index];
                if !Arc::ptr_eq(first.mapping(), &mapping) {
                    log::warn!(
                        "{entity_type} listed more than once with a different mapping, \
                         only its first mapping is used"
                    );
                } else {
                    log::debug!("{entity_type} listed more than once, sharing its container");
                }
                continue;
            }
            container_index.insert(entity_type, containers.len());
            containers.push(EntityInstanceContainer::new(mapping));
        }

        Self {
            containers,
            container_index,
            occurrences,
            row: Vec::with_capacity(occurrences),
            rejected_in_row: 0,
            edge_policy: config.edge_policy,
            log_skipped_binds: config.log_skipped_binds,
            bound_edges: HashSet::new(),
            stats: MaterializeStats::default(),
        }
    }

    /// Number of instances every row must register
    pub fn occurrences(&self) -> usize {
        self.occurrences
    }

    /// Instances registered since the last `end_row`
    pub fn registered_in_row(&self) -> usize {
        self.row.len()
    }

    pub fn stats(&self) -> MaterializeStats {
        self.stats
    }

    /// The container holding canonical instances of `entity_type`
    pub fn container(&self, entity_type: EntityType) -> Option<&EntityInstanceContainer> {
        self.container_index
            .get(&entity_type)
            .map(|&index| &self.containers[index])
    }

    /// Register this row's instance of `T`; `None` marks an outer join miss
    ///
    /// # Errors
    ///
    /// - `MaterializeError::UnknownEntity` if `T` was not declared at construction
    /// - `MaterializeError::SlotOverflow` if the row already holds every declared occurrence
    pub fn register<T: 'static>(
        &mut self,
        instance: Option<Shared<T>>,
    ) -> Result<InstanceIdentity<T>, MaterializeError> {
        self.register_erased(EntityType::of::<T>(), instance.map(ErasedInstance::new))?
            .typed::<T>()
    }

    /// Type-erased form of [`register`](Self::register)
    ///
    /// # Errors
    ///
    /// Same as `register`, plus `MaterializeError::TypeMismatch` if `instance`
    /// is not an `entity_type`.
    pub fn register_erased(
        &mut self,
        entity_type: EntityType,
        instance: Option<ErasedInstance>,
    ) -> Result<&SlotIdentity, MaterializeError> {
        let index = *self
            .container_index
            .get(&entity_type)
            .ok_or(MaterializeError::UnknownEntity {
                entity: entity_type,
            })?;
        if self.row.len() >= self.occurrences {
            self.rejected_in_row += 1;
            return Err(MaterializeError::SlotOverflow {
                capacity: self.occurrences,
            });
        }
        if let Some(found) = instance.as_ref().map(ErasedInstance::entity_type) {
            if found != entity_type {
                return Err(MaterializeError::TypeMismatch {
                    expected: entity_type,
                    found,
                });
            }
        }

        let slot = self.containers[index].resolve(instance)?;

        self.stats.registrations += 1;
        if slot.unique_instance().is_none() {
            self.stats.absent += 1;
        } else if slot.is_duplicate() {
            self.stats.duplicates += 1;
        }

        self.row.push(slot);
        Ok(&self.row[self.row.len() - 1])
    }

    /// Finish the current row and wire its instances together
    ///
    /// # Errors
    ///
    /// - `MaterializeError::RowShape` if the row does not hold exactly
    ///   [`occurrences`](Self::occurrences) registrations, counting those
    ///   rejected with `SlotOverflow`
    /// - `MaterializeError::TypeMismatch` if a mapping accessor does not match its entity
    pub fn end_row(&mut self) -> Result<(), MaterializeError> {
        let registered = self.row.len() + self.rejected_in_row;
        if registered != self.occurrences {
            return Err(MaterializeError::RowShape {
                expected: self.occurrences,
                registered,
            });
        }

        let mut row = std::mem::take(&mut self.row);
        for i in 0..row.len() {
            for j in (i + 1)..row.len() {
                let (a, b) = (&row[i], &row[j]);
                if a.is_duplicate() && b.is_duplicate() {
                    continue;
                }

                let forward = self.bind(a, b)?;
                let backward = self.bind(b, a)?;
                if forward == BindOutcome::Unrelated && backward == BindOutcome::Unrelated {
                    self.stats.skipped_binds += 1;
                    if self.log_skipped_binds {
                        log::trace!(
                            "no relationship between {} and {}, skipping bind",
                            a.mapping().entity_type(),
                            b.mapping().entity_type()
                        );
                    }
                }
            }
        }

        row.clear();
        self.row = row;
        self.stats.rows += 1;
        Ok(())
    }

    /// Consume the builder once the row stream is exhausted
    pub fn finish(self) -> MaterializeStats {
        let stats = self.stats;
        log::debug!(
            "materialized {} rows: {} registrations, {} duplicates, {} absent, {} binds",
            stats.rows,
            stats.registrations,
            stats.duplicates,
            stats.absent,
            stats.binds
        );
        #[cfg(feature = "metrics")]
        METRICS.record_materialization(&stats);
        stats
    }

    fn bind(
        &mut self,
        main: &SlotIdentity,
        child: &SlotIdentity,
    ) -> Result<BindOutcome, MaterializeError> {
        let (Some(main_instance), Some(child_instance)) =
            (main.unique_instance(), child.unique_instance())
        else {
            return Ok(BindOutcome::Absent);
        };
        let related = child.mapping().entity_type();

        if let Some(rel) = main.mapping().child_parent(related) {
            rel.bind(main_instance, child_instance)?;
            self.stats.binds += 1;
            return Ok(BindOutcome::Bound);
        }

        if let Some(rel) = main.mapping().parent_child(related) {
            if self.edge_policy == EdgePolicy::Distinct
                && !self
                    .bound_edges
                    .insert((main_instance.addr(), child_instance.addr()))
            {
                self.stats.suppressed_edges += 1;
                return Ok(BindOutcome::Suppressed);
            }
            rel.bind(main_instance, child_instance)?;
            self.stats.binds += 1;
            return Ok(BindOutcome::Bound);
        }

        Ok(BindOutcome::Unrelated)
    }
}
