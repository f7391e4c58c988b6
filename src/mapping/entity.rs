//! Entity mappings consumed by the materializer
//!
//! An `EntityMapping` is the read-only description of one entity type as far as
//! graph materialization cares: how to compute its deduplication key and which
//! relationships it owns. Relationships are split the same way the owning side
//! sees them:
//!
//! - `parent_child`: the related entity is a child collection of this one (has_many)
//! - `child_parent`: the related entity is a single reference (belongs_to, has_one)

use crate::error::MaterializeError;
use crate::mapping::key::EntityKey;
use crate::mapping::navigation::{ChildCollection, ErasedInstance, ParentReference};
use crate::mapping::relationship::Relationship;
use sea_query::Value;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

/// Logical entity kind, identified by the Rust model type
#[derive(Clone, Copy)]
pub struct EntityType {
    id: TypeId,
    name: &'static str,
}

impl EntityType {
    /// The entity type for model `T`
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Fully qualified name of the model type
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for EntityType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EntityType {}

impl std::hash::Hash for EntityType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Debug for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

type KeyFn = Arc<dyn Fn(&ErasedInstance) -> Result<EntityKey, MaterializeError> + Send + Sync>;

/// Declarative mapping for one entity type
///
/// # Example
///
/// ```
/// use lifeline::mapping::{EntityMapping, Shared};
///
/// struct Order { id: i32, line_items: Vec<Shared<LineItem>> }
/// struct LineItem { id: i32, order_id: i32 }
///
/// let orders = EntityMapping::builder::<Order>("orders")
///     .key(|o: &Order| vec![o.id.into()])
///     .has_many(|o: &mut Order| &mut o.line_items)
///     .build()
///     .unwrap();
///
/// assert_eq!(orders.table_name(), "orders");
/// assert_eq!(orders.parent_child_relationships().count(), 1);
/// ```
#[derive(Clone)]
pub struct EntityMapping {
    entity_type: EntityType,
    table_name: String,
    key: KeyFn,
    parent_child: HashMap<EntityType, Relationship>,
    child_parent: HashMap<EntityType, Relationship>,
}

impl EntityMapping {
    /// Start a mapping for model `T` stored in `table_name`
    pub fn builder<T: 'static>(table_name: impl Into<String>) -> EntityMappingBuilder<T> {
        EntityMappingBuilder {
            table_name: table_name.into(),
            key: None,
            parent_child: HashMap::new(),
            child_parent: HashMap::new(),
            _model: std::marker::PhantomData,
        }
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Compute the deduplication key of an instance of this entity
    ///
    /// # Errors
    ///
    /// Returns `MaterializeError::TypeMismatch` if `instance` is another entity type.
    pub fn key_of(&self, instance: &ErasedInstance) -> Result<EntityKey, MaterializeError> {
        (self.key)(instance)
    }

    /// Relationship in which `related` is a child collection of this entity
    pub fn parent_child(&self, related: EntityType) -> Option<&Relationship> {
        self.parent_child.get(&related)
    }

    /// Relationship in which `related` is a single reference held by this entity
    pub fn child_parent(&self, related: EntityType) -> Option<&Relationship> {
        self.child_parent.get(&related)
    }

    pub fn parent_child_relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.parent_child.values()
    }

    pub fn child_parent_relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.child_parent.values()
    }
}

impl std::fmt::Debug for EntityMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityMapping")
            .field("entity_type", &self.entity_type)
            .field("table_name", &self.table_name)
            .field("parent_child", &self.parent_child.values().collect::<Vec<_>>())
            .field("child_parent", &self.child_parent.values().collect::<Vec<_>>())
            .finish()
    }
}

/// Typed builder for [`EntityMapping`]
pub struct EntityMappingBuilder<T> {
    table_name: String,
    key: Option<KeyFn>,
    parent_child: HashMap<EntityType, Relationship>,
    child_parent: HashMap<EntityType, Relationship>,
    _model: std::marker::PhantomData<fn() -> T>,
}

impl<T: 'static> EntityMappingBuilder<T> {
    /// Key properties used for deduplication, in order
    pub fn key<F>(mut self, key: F) -> Self
    where
        F: Fn(&T) -> Vec<Value> + Send + Sync + 'static,
    {
        self.key = Some(Arc::new(move |instance: &ErasedInstance| {
            let instance = instance.downcast::<T>()?;
            let values = key(&*instance.borrow());
            Ok(EntityKey::new(values))
        }));
        self
    }

    /// This entity owns a collection of `N::Child`
    pub fn has_many<N, F>(mut self, accessor: F) -> Self
    where
        N: ChildCollection,
        F: Fn(&mut T) -> &mut N + Send + Sync + 'static,
    {
        let rel = Relationship::has_many(accessor);
        self.parent_child.insert(rel.related(), rel);
        self
    }

    /// This entity references its parent `R::Parent`
    pub fn belongs_to<R, F>(mut self, accessor: F) -> Self
    where
        R: ParentReference,
        F: Fn(&mut T) -> &mut R + Send + Sync + 'static,
    {
        let rel = Relationship::belongs_to(accessor);
        self.child_parent.insert(rel.related(), rel);
        self
    }

    /// This entity references a single `R::Parent` in a one-to-one relationship
    pub fn has_one<R, F>(mut self, accessor: F) -> Self
    where
        R: ParentReference,
        F: Fn(&mut T) -> &mut R + Send + Sync + 'static,
    {
        let rel = Relationship::has_one(accessor);
        self.child_parent.insert(rel.related(), rel);
        self
    }

    /// Finish the mapping
    ///
    /// # Errors
    ///
    /// Returns `MaterializeError::MissingKey` if no key properties were configured.
    pub fn build(self) -> Result<Arc<EntityMapping>, MaterializeError> {
        let entity_type = EntityType::of::<T>();
        let key = self
            .key
            .ok_or(MaterializeError::MissingKey { entity: entity_type })?;

        Ok(Arc::new(EntityMapping {
            entity_type,
            table_name: self.table_name,
            key,
            parent_child: self.parent_child,
            child_parent: self.child_parent,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::navigation::{shared, Shared};
    use crate::mapping::relationship::RelationType;
    use std::cell::RefCell;
    use std::rc::Weak;

    #[derive(Debug, Default)]
    struct Order {
        id: i32,
        line_items: Vec<Shared<LineItem>>,
    }

    #[derive(Debug, Default)]
    struct LineItem {
        id: i32,
        order: Option<Weak<RefCell<Order>>>,
    }

    #[derive(Debug, Default)]
    struct Employee {
        id: i32,
        workstation: Option<Shared<Workstation>>,
    }

    #[derive(Debug, Default)]
    struct Workstation {
        id: i32,
    }

    #[test]
    fn test_entity_type_equality() {
        assert_eq!(EntityType::of::<Order>(), EntityType::of::<Order>());
        assert_ne!(EntityType::of::<Order>(), EntityType::of::<LineItem>());
        assert!(EntityType::of::<Order>().name().ends_with("Order"));
    }

    #[test]
    fn test_build_requires_key() {
        let err = EntityMapping::builder::<Order>("orders").build().unwrap_err();
        assert_eq!(
            err,
            MaterializeError::MissingKey {
                entity: EntityType::of::<Order>()
            }
        );
    }

    #[test]
    fn test_key_of_uses_key_properties() {
        let mapping = EntityMapping::builder::<Order>("orders")
            .key(|o: &Order| vec![o.id.into()])
            .build()
            .unwrap();

        let a = ErasedInstance::new(shared(Order {
            id: 1,
            ..Default::default()
        }));
        let b = ErasedInstance::new(shared(Order {
            id: 1,
            ..Default::default()
        }));
        assert_eq!(mapping.key_of(&a).unwrap(), mapping.key_of(&b).unwrap());
    }

    #[test]
    fn test_key_of_wrong_type() {
        let mapping = EntityMapping::builder::<Order>("orders")
            .key(|o: &Order| vec![o.id.into()])
            .build()
            .unwrap();
        let item = ErasedInstance::new(shared(LineItem::default()));
        assert!(matches!(
            mapping.key_of(&item),
            Err(MaterializeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_relationship_maps() {
        let orders = EntityMapping::builder::<Order>("orders")
            .key(|o: &Order| vec![o.id.into()])
            .has_many(|o: &mut Order| &mut o.line_items)
            .build()
            .unwrap();
        let items = EntityMapping::builder::<LineItem>("line_items")
            .key(|li: &LineItem| vec![li.id.into()])
            .belongs_to(|li: &mut LineItem| &mut li.order)
            .build()
            .unwrap();

        let rel = orders.parent_child(EntityType::of::<LineItem>()).unwrap();
        assert_eq!(rel.rel_type(), RelationType::HasMany);
        assert!(orders.child_parent(EntityType::of::<LineItem>()).is_none());

        let rel = items.child_parent(EntityType::of::<Order>()).unwrap();
        assert_eq!(rel.rel_type(), RelationType::BelongsTo);
        assert!(items.parent_child(EntityType::of::<Order>()).is_none());
    }

    #[test]
    fn test_has_one_registers_as_reference() {
        let employees = EntityMapping::builder::<Employee>("employees")
            .key(|e: &Employee| vec![e.id.into()])
            .has_one(|e: &mut Employee| &mut e.workstation)
            .build()
            .unwrap();

        let rel = employees
            .child_parent(EntityType::of::<Workstation>())
            .unwrap();
        assert_eq!(rel.rel_type(), RelationType::HasOne);
        assert_eq!(employees.child_parent_relationships().count(), 1);
        assert_eq!(employees.parent_child_relationships().count(), 0);
    }

    #[test]
    fn test_same_related_type_last_wins() {
        let employees = EntityMapping::builder::<Employee>("employees")
            .key(|e: &Employee| vec![e.id.into()])
            .belongs_to(|e: &mut Employee| &mut e.workstation)
            .has_one(|e: &mut Employee| &mut e.workstation)
            .build()
            .unwrap();

        let rel = employees
            .child_parent(EntityType::of::<Workstation>())
            .unwrap();
        assert_eq!(rel.rel_type(), RelationType::HasOne);
        assert_eq!(employees.child_parent_relationships().count(), 1);
    }

    #[test]
    fn test_debug_lists_relationships() {
        let orders = EntityMapping::builder::<Order>("orders")
            .key(|o: &Order| vec![o.id.into()])
            .has_many(|o: &mut Order| &mut o.line_items)
            .build()
            .unwrap();
        let debug = format!("{orders:?}");
        assert!(debug.contains("orders"));
        assert!(debug.contains("HasMany"));
    }
}
