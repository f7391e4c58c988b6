//! Navigation property capabilities and type-erased instance handles
//!
//! Materialized entities are shared, interior-mutable values so that one
//! canonical instance can be referenced from every related entity in the graph.
//! Navigation properties are plain fields; the traits here are the capability
//! the builder needs from them (create an empty collection, append a child,
//! assign a parent).

use crate::error::MaterializeError;
use crate::mapping::EntityType;
use std::any::Any;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// A canonical, shared entity instance
pub type Shared<T> = Rc<RefCell<T>>;

/// Wrap a freshly materialized entity so it can take part in a graph
pub fn shared<T>(entity: T) -> Shared<T> {
    Rc::new(RefCell::new(entity))
}

/// Collection-valued navigation property (the "many" side held by the owner)
///
/// # Example
///
/// ```
/// use lifeline::mapping::{shared, ChildCollection, Shared};
///
/// struct LineItem { id: i32 }
///
/// let mut items: Option<Vec<Shared<LineItem>>> = ChildCollection::empty();
/// items.push_child(shared(LineItem { id: 10 }));
/// assert_eq!(items.as_ref().map(Vec::len), Some(1));
/// ```
pub trait ChildCollection: 'static {
    /// The related entity stored in this collection
    type Child: 'static;

    /// A new, empty collection, assigned when the owner first becomes canonical
    fn empty() -> Self;

    /// Append a canonical child instance
    fn push_child(&mut self, child: Shared<Self::Child>);
}

impl<C: 'static> ChildCollection for Vec<Shared<C>> {
    type Child = C;

    fn empty() -> Self {
        Vec::new()
    }

    fn push_child(&mut self, child: Shared<C>) {
        self.push(child);
    }
}

impl<C: 'static> ChildCollection for Option<Vec<Shared<C>>> {
    type Child = C;

    fn empty() -> Self {
        Some(Vec::new())
    }

    fn push_child(&mut self, child: Shared<C>) {
        self.get_or_insert_with(Vec::new).push(child);
    }
}

/// Single-reference navigation property (parent or one-to-one side)
///
/// A strong `Option<Shared<P>>` keeps the parent alive on its own. When the
/// parent also holds the child in a collection, use the weak form for the
/// back-reference so the graph does not form an `Rc` cycle.
pub trait ParentReference: 'static {
    /// The related entity this property points to
    type Parent: 'static;

    /// Point this property at a canonical parent instance (last assignment wins)
    fn assign(&mut self, parent: &Shared<Self::Parent>);
}

impl<P: 'static> ParentReference for Option<Shared<P>> {
    type Parent = P;

    fn assign(&mut self, parent: &Shared<P>) {
        *self = Some(Rc::clone(parent));
    }
}

impl<P: 'static> ParentReference for Option<Weak<RefCell<P>>> {
    type Parent = P;

    fn assign(&mut self, parent: &Shared<P>) {
        *self = Some(Rc::downgrade(parent));
    }
}

/// A shared instance with its concrete type erased
///
/// Rows mix several entity types, so the builder stores every lane behind this
/// handle and recovers the concrete type only inside mapping accessors.
#[derive(Clone)]
pub struct ErasedInstance {
    entity_type: EntityType,
    inner: Rc<dyn Any>,
}

impl ErasedInstance {
    /// Erase a shared instance
    pub fn new<T: 'static>(instance: Shared<T>) -> Self {
        Self {
            entity_type: EntityType::of::<T>(),
            inner: instance,
        }
    }

    /// The entity type held by this handle
    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    /// Recover the typed instance
    ///
    /// # Errors
    ///
    /// Returns `MaterializeError::TypeMismatch` when the handle holds another type.
    pub fn downcast<T: 'static>(&self) -> Result<Shared<T>, MaterializeError> {
        Rc::clone(&self.inner)
            .downcast::<RefCell<T>>()
            .map_err(|_| MaterializeError::TypeMismatch {
                expected: EntityType::of::<T>(),
                found: self.entity_type,
            })
    }

    /// Reference equality on the underlying instance
    pub fn ptr_eq(&self, other: &ErasedInstance) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.inner), Rc::as_ptr(&other.inner))
    }

    /// Address of the underlying instance, stable while any handle is alive
    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }
}

impl std::fmt::Debug for ErasedInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErasedInstance")
            .field("entity_type", &self.entity_type)
            .field("addr", &format_args!("{:#x}", self.addr()))
            .finish()
    }
}
