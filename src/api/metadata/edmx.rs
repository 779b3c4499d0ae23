//! EDMX and service document reading

use super::association::Association;
use super::function_import::FunctionImport;
use super::property::{parse_property, PropertyMetadata};
use super::local_name;
use crate::api::constants::namespaces;
use crate::error::{Error, Result};
use log::debug;
use roxmltree::{Document, Node};
use std::collections::HashMap;
use std::rc::Rc;

/// A parsed EDMX document with its EDM namespace resolved.
///
/// The EDM namespace differs between protocol versions, so it is taken from
/// the first element under `DataServices` instead of being hard-coded.
pub struct EdmxDocument<'a, 'input> {
    doc: &'a Document<'input>,
    edm_ns: String,
    schemas: Vec<Node<'a, 'input>>,
}

impl<'a, 'input> EdmxDocument<'a, 'input> {
    pub fn new(doc: &'a Document<'input>) -> Result<Self> {
        let root = doc.root_element();
        if root.tag_name().name() != "Edmx" {
            return Err(Error::metadata(format!(
                "expected an Edmx root element, found '{}'",
                root.tag_name().name()
            )));
        }

        let data_services = root
            .children()
            .find(|n| n.is_element() && n.tag_name().name() == "DataServices")
            .ok_or_else(|| Error::metadata("Edmx document has no DataServices element"))?;

        let first = data_services
            .children()
            .find(|n| n.is_element())
            .ok_or_else(|| Error::metadata("DataServices has no Schema element"))?;

        let edm_ns = first
            .tag_name()
            .namespace()
            .ok_or_else(|| Error::metadata("Schema element has no EDM namespace"))?
            .to_string();

        let schemas = data_services
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "Schema")
            .filter(|n| n.tag_name().namespace() == Some(edm_ns.as_str()))
            .collect();

        debug!("EDM namespace: {}", edm_ns);

        Ok(Self {
            doc,
            edm_ns,
            schemas,
        })
    }

    pub fn document(&self) -> &'a Document<'input> {
        self.doc
    }

    pub fn edm_namespace(&self) -> &str {
        &self.edm_ns
    }

    /// Whether `node` is the EDM element `local`
    pub fn is_edm(&self, node: &Node, local: &str) -> bool {
        node.is_element()
            && node.tag_name().name() == local
            && node.tag_name().namespace() == Some(self.edm_ns.as_str())
    }

    fn schema_namespace(schema: &Node) -> String {
        schema.attribute("Namespace").unwrap_or_default().to_string()
    }

    /// `Schema[@Namespace=namespace]/Association[@Name=name]`
    pub fn association_node(&self, namespace: &str, name: &str) -> Option<Node<'a, 'input>> {
        self.schemas
            .iter()
            .filter(|schema| {
                schema.attribute("Namespace") == Some(namespace)
                    || schema.attribute("Alias") == Some(namespace)
            })
            .find_map(|schema| {
                schema
                    .children()
                    .find(|n| self.is_edm(n, "Association") && n.attribute("Name") == Some(name))
            })
    }

    /// Elements named `local` directly under any schema, with their schema namespace
    fn schema_items(&self, local: &str) -> Vec<(String, Node<'a, 'input>)> {
        let mut items = Vec::new();
        for schema in &self.schemas {
            let namespace = Self::schema_namespace(schema);
            for node in schema.children().filter(|n| self.is_edm(n, local)) {
                items.push((namespace.clone(), node));
            }
        }
        items
    }

    fn find_entity_type(&self, qualified: &str) -> Option<(String, Node<'a, 'input>)> {
        let name = local_name(qualified);
        let namespace = qualified
            .len()
            .checked_sub(name.len() + 1)
            .map(|end| &qualified[..end]);

        let candidates = self.schema_items("EntityType");
        candidates
            .iter()
            .find(|(ns, n)| Some(ns.as_str()) == namespace && n.attribute("Name") == Some(name))
            .or_else(|| candidates.iter().find(|(_, n)| n.attribute("Name") == Some(name)))
            .cloned()
    }

    /// Property and navigation elements of an entity type, base types first,
    /// plus the key names in effect for it.
    fn entity_members(
        &self,
        node: Node<'a, 'input>,
        chain: &mut Vec<String>,
    ) -> Result<(Vec<Node<'a, 'input>>, Vec<Node<'a, 'input>>, Vec<String>)> {
        let name = node.attribute("Name").unwrap_or_default().to_string();
        if chain.contains(&name) {
            return Err(Error::metadata(format!(
                "BaseType cycle detected at entity type '{}'",
                name
            )));
        }
        chain.push(name);

        let (mut properties, mut navigation, mut keys) = match node.attribute("BaseType") {
            Some(base_type) => {
                let (_, base) = self.find_entity_type(base_type).ok_or_else(|| {
                    Error::metadata(format!("BaseType not found: {}", base_type))
                })?;
                self.entity_members(base, chain)?
            }
            None => (Vec::new(), Vec::new(), Vec::new()),
        };

        for child in node.children().filter(|n| n.is_element()) {
            if self.is_edm(&child, "Property") {
                properties.push(child);
            } else if self.is_edm(&child, "NavigationProperty") {
                navigation.push(child);
            } else if self.is_edm(&child, "Key") {
                keys.extend(
                    child
                        .children()
                        .filter(|n| self.is_edm(n, "PropertyRef"))
                        .filter_map(|n| n.attribute("Name"))
                        .map(str::to_string),
                );
            }
        }

        Ok((properties, navigation, keys))
    }
}

/// A complex type definition
#[derive(Debug, Clone)]
pub struct ComplexTypeDef {
    pub name: String,
    pub namespace: String,
    pub properties: Vec<PropertyMetadata>,
}

/// An entity type definition with inherited members folded in
#[derive(Debug, Clone)]
pub struct EntityTypeDef {
    pub name: String,
    pub namespace: String,
    pub is_abstract: bool,
    pub base_type: Option<String>,
    pub properties: Vec<PropertyMetadata>,
    pub nav_properties: Vec<PropertyMetadata>,
}

impl EntityTypeDef {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }
}

/// An `EntityContainer/EntitySet`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySetDef {
    pub name: String,
    /// Schema-qualified entity type
    pub entity_type: String,
}

/// Everything the service needs from `$metadata`
#[derive(Debug, Clone, Default)]
pub struct EdmxModel {
    pub edm_namespace: String,
    pub complex_types: Vec<ComplexTypeDef>,
    pub entity_types: Vec<EntityTypeDef>,
    pub entity_sets: Vec<EntitySetDef>,
    pub function_imports: Vec<FunctionImport>,
    /// One entry per distinct relationship, in first-seen order
    pub associations: Vec<Rc<Association>>,
}

impl EdmxModel {
    pub fn entity_set(&self, name: &str) -> Option<&EntitySetDef> {
        self.entity_sets.iter().find(|set| set.name == name)
    }
}

/// Parse a `$metadata` document
pub fn parse_edmx(xml: &str) -> Result<EdmxModel> {
    let doc = Document::parse(xml)?;
    let edmx = EdmxDocument::new(&doc)?;

    let mut model = EdmxModel {
        edm_namespace: edmx.edm_namespace().to_string(),
        ..Default::default()
    };

    for (namespace, node) in edmx.schema_items("ComplexType") {
        let properties = node
            .children()
            .filter(|n| edmx.is_edm(n, "Property"))
            .map(|n| parse_property(n, &[]))
            .collect();

        model.complex_types.push(ComplexTypeDef {
            name: node.attribute("Name").unwrap_or_default().to_string(),
            namespace,
            properties,
        });
    }

    let mut relationships: HashMap<String, Rc<Association>> = HashMap::new();

    for (namespace, node) in edmx.schema_items("EntityType") {
        let (property_nodes, navigation_nodes, keys) = edmx.entity_members(node, &mut Vec::new())?;

        let properties = property_nodes
            .into_iter()
            .map(|n| parse_property(n, &keys))
            .collect();

        let mut nav_properties = Vec::new();
        for nav_node in navigation_nodes {
            let mut nav_prop = parse_property(nav_node, &keys);
            let association = Rc::new(Association::parse(nav_node, &edmx)?);

            if !relationships.contains_key(&association.relationship) {
                relationships.insert(association.relationship.clone(), association.clone());
                model.associations.push(association.clone());
            }

            nav_prop.association = Some(association);
            nav_properties.push(nav_prop);
        }

        model.entity_types.push(EntityTypeDef {
            name: node.attribute("Name").unwrap_or_default().to_string(),
            namespace,
            is_abstract: node.attribute("Abstract") == Some("true"),
            base_type: node.attribute("BaseType").map(str::to_string),
            properties,
            nav_properties,
        });
    }

    for (_, container) in edmx.schema_items("EntityContainer") {
        for child in container.children().filter(|n| n.is_element()) {
            if edmx.is_edm(&child, "EntitySet") {
                model.entity_sets.push(EntitySetDef {
                    name: child.attribute("Name").unwrap_or_default().to_string(),
                    entity_type: child.attribute("EntityType").unwrap_or_default().to_string(),
                });
            } else if edmx.is_edm(&child, "FunctionImport") {
                model.function_imports.push(FunctionImport::parse(child, &edmx));
            }
        }
    }

    debug!(
        "Parsed metadata: {} complex types, {} entity types, {} entity sets, {} function imports",
        model.complex_types.len(),
        model.entity_types.len(),
        model.entity_sets.len(),
        model.function_imports.len()
    );

    Ok(model)
}

/// A collection advertised by the service document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCollection {
    pub href: String,
    pub title: Option<String>,
}

impl ServiceCollection {
    /// The collection name used in URLs
    pub fn name(&self) -> &str {
        if self.href.is_empty() {
            self.title.as_deref().unwrap_or_default()
        } else {
            &self.href
        }
    }
}

/// Parse the AtomPub service document
pub fn parse_service_document(xml: &str) -> Result<Vec<ServiceCollection>> {
    let doc = Document::parse(xml)?;

    let collections = doc
        .descendants()
        .filter(|n| n.has_tag_name((namespaces::APP, "collection")))
        .map(|n| ServiceCollection {
            href: n.attribute("href").unwrap_or_default().to_string(),
            title: n
                .children()
                .find(|c| c.has_tag_name((namespaces::ATOM, "title")))
                .and_then(|c| c.text())
                .map(|t| t.trim().to_string()),
        })
        .filter(|c| !c.name().is_empty())
        .collect::<Vec<_>>();

    debug!("Service document advertises {} collections", collections.len());
    Ok(collections)
}
