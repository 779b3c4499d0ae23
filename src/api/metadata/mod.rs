//! `$metadata` and service document parsing
//!
//! Turns EDMX into plain definitions: complex and entity types with their
//! properties, associations, entity sets and function imports.

pub mod association;
pub mod edmx;
pub mod function_import;
pub mod property;

pub use association::{Association, AssociationEnd, Multiplicity};
pub use edmx::{
    parse_edmx, parse_service_document, ComplexTypeDef, EdmxDocument, EdmxModel, EntitySetDef,
    EntityTypeDef, ServiceCollection,
};
pub use function_import::{FunctionImport, FunctionParameter, ReturnType};
pub use property::{parse_property, PropertyMetadata};

/// Last dotted segment of a qualified name: `Model.Category` -> `Category`
pub fn local_name(qualified: &str) -> &str {
    qualified.rsplit('.').next().unwrap_or(qualified)
}

/// `Collection(Model.Product)` -> `Model.Product`
pub fn collection_inner(edm_type: &str) -> Option<&str> {
    edm_type
        .strip_prefix("Collection(")
        .and_then(|rest| rest.strip_suffix(')'))
}
