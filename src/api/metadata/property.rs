//! Property metadata parsed from EDMX `Property` / `NavigationProperty` elements

use super::association::{Association, Multiplicity};
use crate::api::constants::namespaces;
use roxmltree::Node;
use std::rc::Rc;

/// One scalar, complex or navigation property of a type
#[derive(Debug, Clone)]
pub struct PropertyMetadata {
    pub name: String,
    /// EDM type string; `None` for navigation properties without a `Type` attribute
    pub edm_type: Option<String>,
    pub nullable: bool,
    /// Syndication mapping target (`m:FC_TargetPath`)
    pub fc_target_path: Option<String>,
    /// `m:FC_KeepInContent`; `None` when the attribute is absent
    pub fc_keep_in_content: Option<bool>,
    pub is_navigation: bool,
    pub is_key: bool,
    /// Only set for navigation properties
    pub association: Option<Rc<Association>>,
}

impl PropertyMetadata {
    /// A scalar property declared in code rather than parsed
    pub fn scalar(name: impl Into<String>, edm_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            edm_type: Some(edm_type.into()),
            nullable: true,
            fc_target_path: None,
            fc_keep_in_content: None,
            is_navigation: false,
            is_key: false,
            association: None,
        }
    }

    /// A navigation property backed by an association
    pub fn navigation(name: impl Into<String>, association: Rc<Association>) -> Self {
        Self {
            name: name.into(),
            edm_type: None,
            nullable: true,
            fc_target_path: None,
            fc_keep_in_content: None,
            is_navigation: true,
            is_key: false,
            association: Some(association),
        }
    }

    pub fn with_key(mut self, is_key: bool) -> Self {
        self.is_key = is_key;
        self
    }

    /// Multiplicity of the far end of a navigation property
    pub fn multiplicity(&self) -> Option<Multiplicity> {
        self.association.as_ref().map(|a| a.to_role.multiplicity)
    }

    pub fn is_collection(&self) -> bool {
        self.multiplicity() == Some(Multiplicity::Many)
    }

    /// Primitive types are `Edm.*`; anything else names a complex type
    pub fn is_primitive(&self) -> bool {
        match &self.edm_type {
            Some(edm_type) => edm_type.is_empty() || edm_type.starts_with("Edm."),
            None => true,
        }
    }
}

/// Parse a `Property` or `NavigationProperty` element.
///
/// Key membership comes from the owning type's `Key` element, passed in as `keys`.
pub fn parse_property(node: Node, keys: &[String]) -> PropertyMetadata {
    let name = node.attribute("Name").unwrap_or_default().to_string();
    let is_navigation = node.tag_name().name() == "NavigationProperty";
    let nullable = is_navigation || node.attribute("Nullable") == Some("true");
    let keep_in_content = node.attribute((namespaces::METADATA, "FC_KeepInContent"));

    PropertyMetadata {
        is_key: keys.iter().any(|key| key == &name),
        name,
        edm_type: node.attribute("Type").map(str::to_string),
        nullable,
        fc_target_path: node
            .attribute((namespaces::METADATA, "FC_TargetPath"))
            .map(str::to_string),
        fc_keep_in_content: keep_in_content.map(|value| value == "true"),
        is_navigation,
        association: None,
    }
}
