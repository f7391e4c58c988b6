//! Relationship descriptors between entity mappings
//!
//! A `Relationship` is registered on the owning side's mapping and knows how to
//! wire one canonical instance to another: append to a collection for
//! one-to-many, assign a single reference for many-to-one and one-to-one.
//! Navigation properties are reached through accessor closures captured when
//! the relationship is declared, so no runtime reflection is needed.

use crate::error::MaterializeError;
use crate::mapping::navigation::{ChildCollection, ErasedInstance, ParentReference};
use crate::mapping::EntityType;
use std::sync::Arc;

/// Type of relationship between entities, seen from the owning side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationType {
    /// One-to-one relationship (owner holds a single reference)
    HasOne,
    /// One-to-many relationship (owner holds a collection)
    HasMany,
    /// Many-to-one relationship (owner holds a single reference to its parent)
    BelongsTo,
}

impl RelationType {
    /// Whether the owning side's navigation property is a collection
    pub fn is_collection(self) -> bool {
        matches!(self, RelationType::HasMany)
    }
}

type InitializeFn = Arc<dyn Fn(&ErasedInstance) -> Result<(), MaterializeError> + Send + Sync>;
type BindFn =
    Arc<dyn Fn(&ErasedInstance, &ErasedInstance) -> Result<(), MaterializeError> + Send + Sync>;

/// Navigation metadata for one side of a relationship
#[derive(Clone)]
pub struct Relationship {
    rel_type: RelationType,
    owner: EntityType,
    related: EntityType,
    initialize: Option<InitializeFn>,
    bind: BindFn,
}

impl Relationship {
    /// One-to-many: `O` holds a collection of `N::Child`
    ///
    /// The collection is reset to [`ChildCollection::empty`] when an `O`
    /// instance first becomes canonical, then children are appended by binds.
    pub fn has_many<O, N, F>(accessor: F) -> Self
    where
        O: 'static,
        N: ChildCollection,
        F: Fn(&mut O) -> &mut N + Send + Sync + 'static,
    {
        let accessor = Arc::new(accessor);
        let init_accessor = Arc::clone(&accessor);

        let initialize: InitializeFn = Arc::new(move |owner: &ErasedInstance| {
            let owner = owner.downcast::<O>()?;
            let mut owner = owner.borrow_mut();
            *init_accessor(&mut *owner) = N::empty();
            Ok(())
        });

        let bind: BindFn = Arc::new(move |owner: &ErasedInstance, child: &ErasedInstance| {
            let owner = owner.downcast::<O>()?;
            let child = child.downcast::<N::Child>()?;
            let mut owner = owner.borrow_mut();
            accessor(&mut *owner).push_child(child);
            Ok(())
        });

        Self {
            rel_type: RelationType::HasMany,
            owner: EntityType::of::<O>(),
            related: EntityType::of::<N::Child>(),
            initialize: Some(initialize),
            bind,
        }
    }

    /// Many-to-one: `O` holds a single reference to its parent `R::Parent`
    pub fn belongs_to<O, R, F>(accessor: F) -> Self
    where
        O: 'static,
        R: ParentReference,
        F: Fn(&mut O) -> &mut R + Send + Sync + 'static,
    {
        Self::reference(RelationType::BelongsTo, accessor)
    }

    /// One-to-one: `O` holds a single reference to `R::Parent`
    pub fn has_one<O, R, F>(accessor: F) -> Self
    where
        O: 'static,
        R: ParentReference,
        F: Fn(&mut O) -> &mut R + Send + Sync + 'static,
    {
        Self::reference(RelationType::HasOne, accessor)
    }

    fn reference<O, R, F>(rel_type: RelationType, accessor: F) -> Self
    where
        O: 'static,
        R: ParentReference,
        F: Fn(&mut O) -> &mut R + Send + Sync + 'static,
    {
        let bind: BindFn = Arc::new(move |owner: &ErasedInstance, parent: &ErasedInstance| {
            let owner = owner.downcast::<O>()?;
            let parent = parent.downcast::<R::Parent>()?;
            let mut owner = owner.borrow_mut();
            accessor(&mut *owner).assign(&parent);
            Ok(())
        });

        Self {
            rel_type,
            owner: EntityType::of::<O>(),
            related: EntityType::of::<R::Parent>(),
            initialize: None,
            bind,
        }
    }

    pub fn rel_type(&self) -> RelationType {
        self.rel_type
    }

    /// The entity type holding the navigation property
    pub fn owner(&self) -> EntityType {
        self.owner
    }

    /// The entity type the navigation property points to
    pub fn related(&self) -> EntityType {
        self.related
    }

    /// Whether the navigation property is a collection
    pub fn is_collection(&self) -> bool {
        self.rel_type.is_collection()
    }

    /// Reset the owner's collection to an empty one; no-op for references
    ///
    /// # Errors
    ///
    /// Returns `MaterializeError::TypeMismatch` if `owner` is not the owning type.
    pub fn initialize(&self, owner: &ErasedInstance) -> Result<(), MaterializeError> {
        match &self.initialize {
            Some(initialize) => initialize(owner),
            None => Ok(()),
        }
    }

    /// Append `related` to the owner's collection, or assign it to the owner's reference
    ///
    /// # Errors
    ///
    /// Returns `MaterializeError::TypeMismatch` if either instance has the wrong type.
    pub fn bind(
        &self,
        owner: &ErasedInstance,
        related: &ErasedInstance,
    ) -> Result<(), MaterializeError> {
        (self.bind)(owner, related)
    }
}

impl std::fmt::Debug for Relationship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relationship")
            .field("rel_type", &self.rel_type)
            .field("owner", &self.owner)
            .field("related", &self.related)
            .finish()
    }
}
