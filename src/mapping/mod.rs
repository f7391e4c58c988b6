//! Mapping module for the entity metadata the materializer consumes.
//!
//! # Architecture
//!
//! - **Entity**: `EntityMapping`, `EntityType` and the typed mapping builder
//! - **Relationship**: owning-side relationship descriptors (`Relationship`, `RelationType`)
//! - **Navigation**: capabilities of navigation properties and type-erased instance handles
//! - **Key**: value-based deduplication keys

pub mod entity;
#[doc(inline)]
pub use entity::{EntityMapping, EntityMappingBuilder, EntityType};

pub mod relationship;
#[doc(inline)]
pub use relationship::{RelationType, Relationship};

pub mod navigation;
#[doc(inline)]
pub use navigation::{shared, ChildCollection, ErasedInstance, ParentReference, Shared};

pub mod key;
#[doc(inline)]
pub use key::EntityKey;
