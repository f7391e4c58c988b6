//! Identities handed out for each registered row instance
//!
//! An identity pairs the instance materialized for this row with the canonical
//! instance the builder keeps for the same logical entity. Absent (outer-joined)
//! instances are always duplicates of a canonical `None`.

use crate::error::MaterializeError;
use crate::mapping::{EntityMapping, ErasedInstance, Shared};
use std::sync::Arc;

/// Type-erased identity stored in a row's occurrence slot
#[derive(Debug, Clone)]
pub struct SlotIdentity {
    mapping: Arc<EntityMapping>,
    instance: Option<ErasedInstance>,
    unique: Option<ErasedInstance>,
    is_duplicate: bool,
}

impl SlotIdentity {
    pub(crate) fn absent(mapping: Arc<EntityMapping>) -> Self {
        Self {
            mapping,
            instance: None,
            unique: None,
            is_duplicate: true,
        }
    }

    pub(crate) fn canonical(mapping: Arc<EntityMapping>, instance: ErasedInstance) -> Self {
        Self {
            mapping,
            unique: Some(instance.clone()),
            instance: Some(instance),
            is_duplicate: false,
        }
    }

    pub(crate) fn duplicate(
        mapping: Arc<EntityMapping>,
        instance: ErasedInstance,
        unique: ErasedInstance,
    ) -> Self {
        Self {
            mapping,
            instance: Some(instance),
            unique: Some(unique),
            is_duplicate: true,
        }
    }

    pub fn mapping(&self) -> &Arc<EntityMapping> {
        &self.mapping
    }

    /// The instance materialized for this row
    pub fn instance(&self) -> Option<&ErasedInstance> {
        self.instance.as_ref()
    }

    /// The canonical instance for this logical entity
    pub fn unique_instance(&self) -> Option<&ErasedInstance> {
        self.unique.as_ref()
    }

    pub fn is_duplicate(&self) -> bool {
        self.is_duplicate
    }

    /// Recover the typed identity
    ///
    /// # Errors
    ///
    /// Returns `MaterializeError::TypeMismatch` when the slot holds another entity type.
    pub fn typed<T: 'static>(&self) -> Result<InstanceIdentity<T>, MaterializeError> {
        Ok(InstanceIdentity {
            instance: self.instance.as_ref().map(ErasedInstance::downcast::<T>).transpose()?,
            unique: self.unique.as_ref().map(ErasedInstance::downcast::<T>).transpose()?,
            is_duplicate: self.is_duplicate,
        })
    }
}

/// Identity of one registered instance of `T`
///
/// Returned by [`RelationshipInstanceBuilder::register`](super::RelationshipInstanceBuilder::register).
/// Callers typically look at the root lane only: a non-duplicate root is a new
/// entry of the externally visible result.
pub struct InstanceIdentity<T> {
    instance: Option<Shared<T>>,
    unique: Option<Shared<T>>,
    is_duplicate: bool,
}

impl<T> InstanceIdentity<T> {
    /// The instance materialized for this row (discarded if it is a duplicate)
    pub fn instance(&self) -> Option<&Shared<T>> {
        self.instance.as_ref()
    }

    /// The canonical instance, first seen in this query
    pub fn unique_instance(&self) -> Option<&Shared<T>> {
        self.unique.as_ref()
    }

    pub fn into_unique_instance(self) -> Option<Shared<T>> {
        self.unique
    }

    /// `true` for an already known entity and for an absent (outer-joined) lane
    pub fn is_duplicate(&self) -> bool {
        self.is_duplicate
    }

    /// `true` when the row carried no instance for this lane
    pub fn is_absent(&self) -> bool {
        self.unique.is_none()
    }
}

impl<T> Clone for InstanceIdentity<T> {
    fn clone(&self) -> Self {
        Self {
            instance: self.instance.clone(),
            unique: self.unique.clone(),
            is_duplicate: self.is_duplicate,
        }
    }
}

impl<T> std::fmt::Debug for InstanceIdentity<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceIdentity")
            .field("entity", &std::any::type_name::<T>())
            .field("is_duplicate", &self.is_duplicate)
            .field("is_absent", &self.is_absent())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::shared;
    use std::rc::Rc;

    #[derive(Debug)]
    struct Order {
        id: i32,
    }

    fn orders() -> Arc<EntityMapping> {
        EntityMapping::builder::<Order>("orders")
            .key(|o: &Order| vec![o.id.into()])
            .build()
            .unwrap()
    }

    #[test]
    fn test_absent_identity_is_duplicate() {
        let slot = SlotIdentity::absent(orders());
        assert!(slot.is_duplicate());
        assert!(slot.instance().is_none());
        assert!(slot.unique_instance().is_none());

        let typed = slot.typed::<Order>().unwrap();
        assert!(typed.is_absent());
        assert!(typed.is_duplicate());
    }

    #[test]
    fn test_canonical_identity_is_its_own_unique() {
        let order = shared(Order { id: 1 });
        let slot = SlotIdentity::canonical(orders(), ErasedInstance::new(Rc::clone(&order)));
        assert!(!slot.is_duplicate());

        let typed = slot.typed::<Order>().unwrap();
        assert!(Rc::ptr_eq(typed.instance().unwrap(), typed.unique_instance().unwrap()));
        assert!(Rc::ptr_eq(&typed.into_unique_instance().unwrap(), &order));
    }

    #[test]
    fn test_duplicate_identity_points_at_first_instance() {
        let first = shared(Order { id: 1 });
        let second = shared(Order { id: 1 });
        let slot = SlotIdentity::duplicate(
            orders(),
            ErasedInstance::new(Rc::clone(&second)),
            ErasedInstance::new(Rc::clone(&first)),
        );

        let typed = slot.typed::<Order>().unwrap();
        assert!(typed.is_duplicate());
        assert!(Rc::ptr_eq(typed.unique_instance().unwrap(), &first));
        assert!(Rc::ptr_eq(typed.instance().unwrap(), &second));
        assert_eq!(typed.unique_instance().unwrap().borrow().id, 1);
    }

    #[test]
    fn test_typed_wrong_type() {
        struct Other;
        let slot = SlotIdentity::canonical(orders(), ErasedInstance::new(shared(Order { id: 1 })));
        assert!(matches!(
            slot.typed::<Other>(),
            Err(MaterializeError::TypeMismatch { .. })
        ));
    }
}
