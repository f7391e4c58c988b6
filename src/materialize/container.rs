//! Per-entity-type registry of canonical instances for one query

use crate::error::MaterializeError;
use crate::mapping::{EntityKey, EntityMapping, ErasedInstance};
use crate::materialize::identity::SlotIdentity;
use std::collections::HashMap;
use std::sync::Arc;

/// Known instances of one entity type, keyed by their key property values
///
/// The map only grows while the query's rows are consumed.
#[derive(Debug)]
pub struct EntityInstanceContainer {
    mapping: Arc<EntityMapping>,
    known_instances: HashMap<EntityKey, ErasedInstance>,
}

impl EntityInstanceContainer {
    pub fn new(mapping: Arc<EntityMapping>) -> Self {
        Self {
            mapping,
            known_instances: HashMap::new(),
        }
    }

    pub fn mapping(&self) -> &Arc<EntityMapping> {
        &self.mapping
    }

    /// Number of distinct entities seen so far
    pub fn len(&self) -> usize {
        self.known_instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known_instances.is_empty()
    }

    /// The canonical instance for `key`, if one was registered
    pub fn get(&self, key: &EntityKey) -> Option<&ErasedInstance> {
        self.known_instances.get(key)
    }

    /// Resolve a freshly materialized instance against the known ones
    ///
    /// A first sighting becomes canonical: its collection navigation properties
    /// are reset to empty collections and it is remembered under its key. Any
    /// later instance with an equal key is a duplicate of that canonical object.
    pub(crate) fn resolve(
        &mut self,
        instance: Option<ErasedInstance>,
    ) -> Result<SlotIdentity, MaterializeError> {
        let Some(instance) = instance else {
            return Ok(SlotIdentity::absent(Arc::clone(&self.mapping)));
        };

        let key = self.mapping.key_of(&instance)?;
        if let Some(unique) = self.known_instances.get(&key) {
            log::trace!(
                "{} {:?} already known, collapsing duplicate",
                self.mapping.entity_type(),
                key.values()
            );
            return Ok(SlotIdentity::duplicate(
                Arc::clone(&self.mapping),
                instance,
                unique.clone(),
            ));
        }

        for rel in self.mapping.parent_child_relationships() {
            rel.initialize(&instance)?;
        }
        self.known_instances.insert(key, instance.clone());

        Ok(SlotIdentity::canonical(Arc::clone(&self.mapping), instance))
    }
}
