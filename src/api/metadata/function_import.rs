//! Service operations declared as `EntityContainer/FunctionImport`

use super::edmx::EdmxDocument;
use super::{collection_inner, local_name};
use crate::api::client::HttpMethod;
use crate::api::constants::namespaces;
use roxmltree::Node;

/// Declared return shape of a function import
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnType {
    /// `T`
    Single(String),
    /// `Collection(T)`
    Collection(String),
}

impl ReturnType {
    pub fn parse(value: &str) -> Self {
        match collection_inner(value) {
            Some(inner) => ReturnType::Collection(inner.to_string()),
            None => ReturnType::Single(value.to_string()),
        }
    }

    /// The element type, without any `Collection(..)` wrapper
    pub fn type_name(&self) -> &str {
        match self {
            ReturnType::Single(name) | ReturnType::Collection(name) => name,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, ReturnType::Collection(_))
    }

    pub fn is_primitive(&self) -> bool {
        self.type_name().starts_with("Edm.")
    }

    /// Last dotted segment of the element type
    pub fn local_type_name(&self) -> &str {
        local_name(self.type_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionParameter {
    pub name: String,
    pub edm_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionImport {
    pub name: String,
    pub return_type: Option<ReturnType>,
    pub entity_set: Option<String>,
    pub http_method: HttpMethod,
    pub parameters: Vec<FunctionParameter>,
}

impl FunctionImport {
    pub fn parse(node: Node, edmx: &EdmxDocument) -> Self {
        let parameters = node
            .children()
            .filter(|n| edmx.is_edm(n, "Parameter"))
            .map(|n| FunctionParameter {
                name: n.attribute("Name").unwrap_or_default().to_string(),
                edm_type: n.attribute("Type").unwrap_or_default().to_string(),
            })
            .collect();

        let http_method = node
            .attribute((namespaces::METADATA, "HttpMethod"))
            .and_then(HttpMethod::parse)
            .unwrap_or(HttpMethod::Get);

        Self {
            name: node.attribute("Name").unwrap_or_default().to_string(),
            return_type: node.attribute("ReturnType").map(ReturnType::parse),
            entity_set: node.attribute("EntitySet").map(str::to_string),
            http_method,
            parameters,
        }
    }
}
