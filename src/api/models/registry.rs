//! Per-service registry of entity and complex type descriptors

use crate::api::metadata::PropertyMetadata;
use log::debug;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

/// Structure of one entity or complex type
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    /// Registry-qualified name, e.g. `Northwind::Model::Category`
    pub type_name: String,
    /// Unqualified name, e.g. `Category`
    pub name: String,
    /// Declared properties, scalars first then navigation properties
    pub properties: Vec<PropertyMetadata>,
    pub is_complex: bool,
}

impl TypeDescriptor {
    pub fn property(&self, name: &str) -> Option<&PropertyMetadata> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.property(name).is_some()
    }

    /// Scalar and complex properties
    pub fn value_properties(&self) -> impl Iterator<Item = &PropertyMetadata> {
        self.properties.iter().filter(|p| !p.is_navigation)
    }

    pub fn navigation_properties(&self) -> impl Iterator<Item = &PropertyMetadata> {
        self.properties.iter().filter(|p| p.is_navigation)
    }

    pub fn navigation_property(&self, name: &str) -> Option<&PropertyMetadata> {
        self.navigation_properties().find(|p| p.name == name)
    }

    pub fn key_properties(&self) -> impl Iterator<Item = &PropertyMetadata> {
        self.properties.iter().filter(|p| p.is_key)
    }
}

/// Type descriptors built from metadata, owned by one service.
///
/// Types are keyed by their qualified name. Namespace containers live in a
/// separate set, so a namespace segment can never collide with a type name.
#[derive(Debug, Default)]
pub struct EntityTypeRegistry {
    namespace: Option<String>,
    types: HashMap<String, Rc<TypeDescriptor>>,
    order: Vec<String>,
    namespaces: BTreeSet<String>,
}

impl EntityTypeRegistry {
    /// A registry whose types default to `namespace` (`Foo.Bar` or `Foo::Bar`)
    pub fn new(namespace: Option<&str>) -> Self {
        let mut registry = Self {
            namespace: namespace.and_then(normalize_namespace),
            ..Default::default()
        };
        if let Some(namespace) = registry.namespace.clone() {
            registry.register_namespace(&namespace);
        }
        registry
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Build an entity type, or return the cached one with the same qualified name.
    ///
    /// An explicit `namespace` overrides the registry default. An empty
    /// `type_name` builds nothing.
    pub fn build(
        &mut self,
        type_name: &str,
        properties: Vec<PropertyMetadata>,
        nav_properties: Vec<PropertyMetadata>,
        namespace: Option<&str>,
    ) -> Option<Rc<TypeDescriptor>> {
        let mut all = properties;
        all.extend(nav_properties);
        self.insert(type_name, all, namespace, false)
    }

    /// Build a complex type; complex types have no navigation properties or keys
    pub fn build_complex(
        &mut self,
        type_name: &str,
        properties: Vec<PropertyMetadata>,
        namespace: Option<&str>,
    ) -> Option<Rc<TypeDescriptor>> {
        let properties = properties
            .into_iter()
            .filter(|p| !p.is_navigation)
            .map(|p| p.with_key(false))
            .collect();
        self.insert(type_name, properties, namespace, true)
    }

    fn insert(
        &mut self,
        type_name: &str,
        properties: Vec<PropertyMetadata>,
        namespace: Option<&str>,
        is_complex: bool,
    ) -> Option<Rc<TypeDescriptor>> {
        let type_name = type_name.trim();
        if type_name.is_empty() {
            return None;
        }

        let namespace = match namespace {
            Some(ns) => normalize_namespace(ns),
            None => self.namespace.clone(),
        };
        let qualified = qualify(namespace.as_deref(), type_name);

        if let Some(existing) = self.types.get(&qualified) {
            return Some(existing.clone());
        }

        if let Some(namespace) = &namespace {
            self.register_namespace(namespace);
        }

        let mut seen = BTreeSet::new();
        let properties = properties
            .into_iter()
            .filter(|p| seen.insert(p.name.clone()))
            .collect();

        let descriptor = Rc::new(TypeDescriptor {
            type_name: qualified.clone(),
            name: type_name.to_string(),
            properties,
            is_complex,
        });

        debug!(
            "Registered {} type {}",
            if is_complex { "complex" } else { "entity" },
            qualified
        );

        self.types.insert(qualified.clone(), descriptor.clone());
        self.order.push(qualified);
        Some(descriptor)
    }

    fn register_namespace(&mut self, namespace: &str) {
        let mut path = String::new();
        for segment in namespace.split("::") {
            if !path.is_empty() {
                path.push_str("::");
            }
            path.push_str(segment);
            self.namespaces.insert(path.clone());
        }
    }

    /// Exact lookup by qualified name
    pub fn get(&self, qualified: &str) -> Option<Rc<TypeDescriptor>> {
        self.types.get(qualified).cloned()
    }

    /// Lookup by qualified name, by name in the registry namespace, or by the
    /// last segment of a schema-qualified name such as `Model.Category`.
    pub fn resolve(&self, name: &str) -> Option<Rc<TypeDescriptor>> {
        if name.is_empty() {
            return None;
        }
        if let Some(found) = self.get(name) {
            return Some(found);
        }

        let local = name
            .rsplit("::")
            .next()
            .and_then(|n| n.rsplit('.').next())
            .unwrap_or(name);

        if let Some(found) = self.get(&qualify(self.namespace.as_deref(), local)) {
            return Some(found);
        }

        self.order
            .iter()
            .filter_map(|qualified| self.types.get(qualified))
            .find(|descriptor| descriptor.name == local)
            .cloned()
    }

    /// Qualified type names in registration order
    pub fn classes(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = Rc<TypeDescriptor>> + '_ {
        self.order
            .iter()
            .filter_map(|qualified| self.types.get(qualified).cloned())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Namespace containers created so far, outermost first
    pub fn namespaces(&self) -> Vec<&str> {
        self.namespaces.iter().map(String::as_str).collect()
    }

    pub fn has_namespace(&self, namespace: &str) -> bool {
        normalize_namespace(namespace).is_some_and(|ns| self.namespaces.contains(&ns))
    }
}

/// `Foo.Bar` and `Foo::Bar` both become `Foo::Bar`; blank input is no namespace
pub fn normalize_namespace(namespace: &str) -> Option<String> {
    let segments: Vec<&str> = namespace
        .split("::")
        .flat_map(|part| part.split('.'))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if segments.is_empty() {
        None
    } else {
        Some(segments.join("::"))
    }
}

fn qualify(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) => format!("{}::{}", ns, name),
        None => name.to_string(),
    }
}
