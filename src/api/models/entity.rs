//! Entity instances
//!
//! An [`Entity`] is a shared handle: clones point at the same instance, so a
//! parsed entity queued for an update and later marked tracked is observed
//! through every clone.

use super::registry::TypeDescriptor;
use super::value::Value;
use crate::error::{Error, Result};
use serde_json::{json, Map};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Server bookkeeping for a tracked entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMetadata {
    pub uri: String,
}

/// How an entity is rendered into a JSON request body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializeMode {
    /// Create: every declared value plus loaded navigation properties.
    /// Already-tracked entities render as a `__metadata` reference only.
    Add,
    /// Replace: `__metadata` plus every declared value; navigation omitted
    Update,
    /// `{"uri": ...}` body for `$links`
    Link,
}

struct EntityData {
    descriptor: Rc<TypeDescriptor>,
    values: HashMap<String, Value>,
    metadata: Option<EntityMetadata>,
}

#[derive(Clone)]
pub struct Entity(Rc<RefCell<EntityData>>);

impl Entity {
    /// A new, untracked instance
    pub fn new(descriptor: Rc<TypeDescriptor>) -> Self {
        Self(Rc::new(RefCell::new(EntityData {
            descriptor,
            values: HashMap::new(),
            metadata: None,
        })))
    }

    pub fn descriptor(&self) -> Rc<TypeDescriptor> {
        self.0.borrow().descriptor.clone()
    }

    /// Unqualified type name
    pub fn type_name(&self) -> String {
        self.0.borrow().descriptor.name.clone()
    }

    pub fn is_complex(&self) -> bool {
        self.0.borrow().descriptor.is_complex
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.0.borrow().values.get(name).cloned()
    }

    /// Set a declared property
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let mut data = self.0.borrow_mut();
        if !data.descriptor.has_property(name) {
            return Err(Error::UnknownProperty {
                type_name: data.descriptor.name.clone(),
                property: name.to_string(),
            });
        }
        data.values.insert(name.to_string(), value.into());
        Ok(())
    }

    /// Builder-style [`Entity::set`]
    pub fn with(self, name: &str, value: impl Into<Value>) -> Result<Self> {
        self.set(name, value)?;
        Ok(self)
    }

    /// Store a value without checking the descriptor; used for response data
    pub(crate) fn insert(&self, name: &str, value: Value) {
        self.0.borrow_mut().values.insert(name.to_string(), value);
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.0.borrow().values.contains_key(name)
    }

    /// Names of properties holding a value
    pub fn loaded_properties(&self) -> Vec<String> {
        let data = self.0.borrow();
        data.descriptor
            .properties
            .iter()
            .filter(|p| data.values.contains_key(&p.name))
            .map(|p| p.name.clone())
            .collect()
    }

    pub fn metadata(&self) -> Option<EntityMetadata> {
        self.0.borrow().metadata.clone()
    }

    pub fn uri(&self) -> Option<String> {
        self.0.borrow().metadata.as_ref().map(|m| m.uri.clone())
    }

    /// Tracked entities carry a server URI; complex values never do
    pub fn is_tracked(&self) -> bool {
        self.0.borrow().metadata.is_some()
    }

    pub(crate) fn set_metadata(&self, metadata: Option<EntityMetadata>) {
        let mut data = self.0.borrow_mut();
        if !data.descriptor.is_complex {
            data.metadata = metadata;
        }
    }

    /// Take over the state of `other`, typically the server's copy after a create
    pub(crate) fn adopt(&self, other: &Entity) {
        if self.ptr_eq(other) {
            return;
        }
        let (values, metadata) = {
            let source = other.0.borrow();
            (source.values.clone(), source.metadata.clone())
        };
        let mut data = self.0.borrow_mut();
        for (name, value) in values {
            data.values.insert(name, value);
        }
        if !data.descriptor.is_complex {
            data.metadata = metadata;
        }
    }

    /// A detached copy holding the metadata and value properties but no
    /// navigation properties
    pub fn shallow_copy(&self) -> Entity {
        let data = self.0.borrow();
        let values = data
            .values
            .iter()
            .filter(|(name, _)| {
                data.descriptor
                    .property(name)
                    .map_or(true, |p| !p.is_navigation)
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        Entity(Rc::new(RefCell::new(EntityData {
            descriptor: data.descriptor.clone(),
            values,
            metadata: data.metadata.clone(),
        })))
    }

    pub fn ptr_eq(&self, other: &Entity) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Render a JSON request body
    pub fn to_json(&self, mode: SerializeMode) -> serde_json::Value {
        let data = self.0.borrow();

        match mode {
            SerializeMode::Link => json!({ "uri": data.metadata.as_ref().map(|m| m.uri.clone()) }),
            SerializeMode::Add => {
                if let Some(metadata) = &data.metadata {
                    return json!({ "__metadata": { "uri": metadata.uri } });
                }

                let mut body = Self::value_fields(&data, mode);
                for nav in data.descriptor.navigation_properties() {
                    if let Some(value) = data.values.get(&nav.name) {
                        if matches!(value, Value::Entity(_) | Value::Entities(_)) {
                            body.insert(nav.name.clone(), value.to_json(mode));
                        }
                    }
                }
                serde_json::Value::Object(body)
            }
            SerializeMode::Update => {
                let mut body = Map::new();
                if let Some(metadata) = &data.metadata {
                    body.insert("__metadata".to_string(), json!({ "uri": metadata.uri }));
                }
                body.extend(Self::value_fields(&data, mode));
                serde_json::Value::Object(body)
            }
        }
    }

    /// Declared value properties the instance holds; unset or unloaded ones are left out
    fn value_fields(data: &EntityData, mode: SerializeMode) -> Map<String, serde_json::Value> {
        data.descriptor
            .value_properties()
            .filter_map(|p| {
                data.values
                    .get(&p.name)
                    .map(|value| (p.name.clone(), value.to_json(mode)))
            })
            .collect()
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0.borrow();
        f.debug_struct("Entity")
            .field("type", &data.descriptor.type_name)
            .field("uri", &data.metadata.as_ref().map(|m| m.uri.as_str()))
            .field("properties", &data.values.len())
            .finish()
    }
}
