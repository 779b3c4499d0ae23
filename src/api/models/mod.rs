//! Type descriptors and the generic entity representation

pub mod entity;
pub mod registry;
pub mod value;

pub use entity::{Entity, EntityMetadata, SerializeMode};
pub use registry::{normalize_namespace, EntityTypeRegistry, TypeDescriptor};
pub use value::Value;
