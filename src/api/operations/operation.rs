//! Pending write operations

use crate::api::client::HttpMethod;
use crate::api::constants::{collection_endpoint, links_endpoint};
use crate::api::models::{Entity, SerializeMode};
use crate::config::UpdateMethod;
use std::fmt;

/// One queued write, flushed by [`crate::Service::save_changes`]
#[derive(Debug, Clone)]
pub enum SaveOperation {
    Add { collection: String, entity: Entity },
    Update { entity: Entity },
    Delete { entity: Entity },
    AddLink { parent: Entity, property: String, child: Entity },
}

impl SaveOperation {
    pub fn kind(&self) -> &'static str {
        match self {
            SaveOperation::Add { .. } => "Add",
            SaveOperation::Update { .. } => "Update",
            SaveOperation::Delete { .. } => "Delete",
            SaveOperation::AddLink { .. } => "AddLink",
        }
    }

    pub fn method(&self, update_method: UpdateMethod) -> HttpMethod {
        match self {
            SaveOperation::Add { .. } | SaveOperation::AddLink { .. } => HttpMethod::Post,
            SaveOperation::Update { .. } => match update_method {
                UpdateMethod::Put => HttpMethod::Put,
                UpdateMethod::Patch => HttpMethod::Patch,
                UpdateMethod::Merge => HttpMethod::Merge,
            },
            SaveOperation::Delete { .. } => HttpMethod::Delete,
        }
    }

    /// Target URL; entity URIs are absolute, collections hang off `base_uri`
    pub fn url(&self, base_uri: &str) -> String {
        match self {
            SaveOperation::Add { collection, .. } => collection_endpoint(base_uri, collection),
            SaveOperation::Update { entity } | SaveOperation::Delete { entity } => {
                entity.uri().unwrap_or_default()
            }
            SaveOperation::AddLink { parent, property, .. } => {
                links_endpoint(&parent.uri().unwrap_or_default(), property)
            }
        }
    }

    /// JSON request body; deletes have none
    pub fn body(&self) -> Option<String> {
        let json = match self {
            SaveOperation::Add { entity, .. } => entity.to_json(SerializeMode::Add),
            SaveOperation::Update { entity } => entity.to_json(SerializeMode::Update),
            SaveOperation::Delete { .. } => return None,
            SaveOperation::AddLink { child, .. } => child.to_json(SerializeMode::Link),
        };
        Some(json.to_string())
    }
}

impl fmt::Display for SaveOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveOperation::Add { collection, entity } => {
                write!(f, "Add {} to {}", entity.type_name(), collection)
            }
            SaveOperation::Update { entity } | SaveOperation::Delete { entity } => write!(
                f,
                "{} {}",
                self.kind(),
                entity.uri().unwrap_or_else(|| entity.type_name())
            ),
            SaveOperation::AddLink { parent, property, child } => write!(
                f,
                "AddLink {} -> {}/{}",
                child.type_name(),
                parent.uri().unwrap_or_default(),
                property
            ),
        }
    }
}
