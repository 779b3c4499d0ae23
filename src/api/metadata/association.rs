//! Associations between entity types, resolved from navigation properties

use super::edmx::EdmxDocument;
use crate::error::{Error, Result};
use roxmltree::Node;
use std::fmt;

/// Cardinality of one association end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Multiplicity {
    ZeroOrOne,
    One,
    Many,
}

impl Multiplicity {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "0..1" => Some(Multiplicity::ZeroOrOne),
            "1" => Some(Multiplicity::One),
            "*" => Some(Multiplicity::Many),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Multiplicity::ZeroOrOne => "0..1",
            Multiplicity::One => "1",
            Multiplicity::Many => "*",
        }
    }
}

impl fmt::Display for Multiplicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `End` of an association
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationEnd {
    pub role: String,
    /// Schema-qualified entity type, e.g. `Model.Category`
    pub type_name: String,
    pub multiplicity: Multiplicity,
}

/// A relationship as seen from one navigation property: `from_role` is the
/// declaring type's end, `to_role` the target's end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    pub name: String,
    pub namespace: String,
    /// The navigation property's `Relationship` attribute
    pub relationship: String,
    pub from_role: AssociationEnd,
    pub to_role: AssociationEnd,
}

impl Association {
    /// Resolve a `NavigationProperty` element against the EDMX document.
    ///
    /// Fails when the association or either of its roles can't be found.
    pub fn parse(nav_prop: Node, edmx: &EdmxDocument) -> Result<Self> {
        let relationship = nav_prop.attribute("Relationship").ok_or_else(|| {
            Error::metadata(format!(
                "navigation property '{}' has no Relationship",
                nav_prop.attribute("Name").unwrap_or_default()
            ))
        })?;

        let mut parts: Vec<&str> = relationship.split('.').collect();
        let name = parts.pop().unwrap_or_default().to_string();
        let namespace = parts.join(".");

        let from_role = nav_prop.attribute("FromRole").unwrap_or_default();
        let to_role = nav_prop.attribute("ToRole").unwrap_or_default();

        let association = edmx.association_node(&namespace, &name).ok_or_else(|| {
            Error::metadata(format!(
                "Association not found: {} in namespace '{}'",
                name, namespace
            ))
        })?;

        Ok(Self {
            from_role: role_end(association, &name, from_role, edmx)?,
            to_role: role_end(association, &name, to_role, edmx)?,
            relationship: relationship.to_string(),
            name,
            namespace,
        })
    }

    /// Role name to `(type, multiplicity)` mapping
    pub fn roles(&self) -> Vec<(&str, &AssociationEnd)> {
        vec![
            (self.from_role.role.as_str(), &self.from_role),
            (self.to_role.role.as_str(), &self.to_role),
        ]
    }

    pub fn role(&self, role: &str) -> Option<&AssociationEnd> {
        self.roles()
            .into_iter()
            .find(|(name, _)| *name == role)
            .map(|(_, end)| end)
    }
}

fn role_end(
    association: Node,
    association_name: &str,
    role: &str,
    edmx: &EdmxDocument,
) -> Result<AssociationEnd> {
    let end = association
        .children()
        .find(|n| edmx.is_edm(n, "End") && n.attribute("Role") == Some(role))
        .ok_or_else(|| {
            Error::metadata(format!(
                "Association not found: {}, role: {}",
                association_name, role
            ))
        })?;

    let type_name = end.attribute("Type").unwrap_or_default().to_string();
    let multiplicity = end
        .attribute("Multiplicity")
        .and_then(Multiplicity::parse)
        .ok_or_else(|| {
            Error::metadata(format!(
                "Association {} role {} has no valid Multiplicity",
                association_name, role
            ))
        })?;

    Ok(AssociationEnd {
        role: role.to_string(),
        type_name,
        multiplicity,
    })
}
