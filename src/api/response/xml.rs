//! Atom feed and entry parsing

use super::value::parse_edm_value;
use super::ParsedResponse;
use crate::api::constants::namespaces;
use crate::api::metadata::{collection_inner, local_name, Multiplicity};
use crate::api::models::{Entity, EntityMetadata, EntityTypeRegistry, TypeDescriptor, Value};
use crate::api::query::Payload;
use crate::error::Result;
use log::{debug, warn};
use roxmltree::{Document, Node};
use std::rc::Rc;

const SYNDICATION_TITLE: &str = "SyndicationTitle";
const SYNDICATION_SUMMARY: &str = "SyndicationSummary";

pub(crate) struct AtomParser<'r> {
    registry: &'r EntityTypeRegistry,
}

impl<'r> AtomParser<'r> {
    pub fn new(registry: &'r EntityTypeRegistry) -> Self {
        Self { registry }
    }

    pub fn parse(&self, body: &str, expected_type: Option<&str>) -> Result<ParsedResponse> {
        let doc = Document::parse(body)?;
        let root = doc.root_element();

        if is_links_document(&root) {
            let links = root
                .descendants()
                .filter(|n| n.is_element() && n.tag_name().name() == "uri")
                .filter_map(|n| n.text())
                .map(|t| t.trim().to_string())
                .collect::<Vec<_>>();
            debug!("Parsed {} links", links.len());
            return Ok(ParsedResponse {
                payload: Payload::Links(links),
                next_link: None,
            });
        }

        let next_link = if root.has_tag_name((namespaces::ATOM, "feed")) {
            next_link(&root)
        } else {
            None
        };

        let mut entities: Vec<Entity> = top_level_entries(&root)
            .into_iter()
            .filter_map(|entry| self.parse_entry(entry, expected_type))
            .collect();

        debug!("Parsed {} top-level entries", entities.len());

        let payload = if entities.len() == 1 {
            Payload::Entity(entities.remove(0))
        } else {
            Payload::Entities(entities)
        };

        Ok(ParsedResponse { payload, next_link })
    }

    /// Build one entity from an `entry` element, or `None` when its type can't be resolved
    pub fn parse_entry(&self, entry: Node, expected_type: Option<&str>) -> Option<Entity> {
        let descriptor = self.entry_type(&entry, expected_type)?;
        let entity = Entity::new(descriptor.clone());

        if let Some(id) = atom_child(&entry, "id").and_then(|n| n.text()) {
            entity.set_metadata(Some(EntityMetadata {
                uri: id.trim().to_string(),
            }));
        }

        if let Some(properties) = properties_node(&entry) {
            for property in properties.children().filter(|n| n.is_element()) {
                let name = property.tag_name().name();
                let declared = descriptor.property(name).and_then(|p| p.edm_type.clone());
                let edm_type = declared.or_else(|| {
                    property
                        .attribute((namespaces::METADATA, "type"))
                        .map(str::to_string)
                });
                entity.insert(name, self.property_value(&property, edm_type.as_deref()));
            }
        }

        self.apply_feed_customization(&entry, &descriptor, &entity);
        self.parse_inline_links(&entry, &descriptor, &entity);

        Some(entity)
    }

    fn entry_type(&self, entry: &Node, expected_type: Option<&str>) -> Option<Rc<TypeDescriptor>> {
        let term = atom_child(entry, "category")
            .and_then(|c| c.attribute("term"))
            .map(local_name);

        let title = atom_child(entry, "title")
            .and_then(|n| n.text())
            .map(str::trim);

        let descriptor = [term, expected_type.map(local_name), title]
            .into_iter()
            .flatten()
            .find_map(|name| self.registry.resolve(name))
            .filter(|d| !d.is_complex);

        if descriptor.is_none() {
            warn!(
                "Skipping entry with unresolvable type (category: {:?}, expected: {:?})",
                term, expected_type
            );
        }
        descriptor
    }

    /// Convert one `d:*` property element
    fn property_value(&self, node: &Node, edm_type: Option<&str>) -> Value {
        if node.attribute((namespaces::METADATA, "null")) == Some("true") {
            return Value::Null;
        }

        let text = node.text().unwrap_or_default();
        let edm_type = match edm_type {
            Some(t) if !t.is_empty() => t,
            _ => return parse_edm_value(None, text),
        };

        if let Some(inner) = collection_inner(edm_type) {
            let values = node
                .children()
                .filter(|n| n.is_element() && n.tag_name().name() == "element")
                .map(|element| self.property_value(&element, Some(inner)))
                .collect();
            return Value::List(values);
        }

        if edm_type.starts_with("Edm.") {
            return parse_edm_value(Some(edm_type), text);
        }

        match self.registry.resolve(local_name(edm_type)) {
            Some(descriptor) => Value::Entity(self.complex_value(node, descriptor)),
            None => {
                warn!("Unknown complex type {}, keeping text", edm_type);
                Value::String(text.to_string())
            }
        }
    }

    fn complex_value(&self, node: &Node, descriptor: Rc<TypeDescriptor>) -> Entity {
        let value = Entity::new(descriptor.clone());
        for child in node.children().filter(|n| n.is_element()) {
            let name = child.tag_name().name();
            let edm_type = descriptor
                .property(name)
                .and_then(|p| p.edm_type.clone())
                .or_else(|| {
                    child
                        .attribute((namespaces::METADATA, "type"))
                        .map(str::to_string)
                });
            value.insert(name, self.property_value(&child, edm_type.as_deref()));
        }
        value
    }

    /// Properties mapped to `title`/`summary` and kept out of `m:properties`
    fn apply_feed_customization(&self, entry: &Node, descriptor: &TypeDescriptor, entity: &Entity) {
        for property in descriptor.value_properties() {
            if property.fc_keep_in_content != Some(false) {
                continue;
            }
            let element = match property.fc_target_path.as_deref() {
                Some(SYNDICATION_TITLE) => "title",
                Some(SYNDICATION_SUMMARY) => "summary",
                _ => continue,
            };
            if let Some(node) = atom_child(entry, element) {
                let text = node.text().unwrap_or_default();
                entity.insert(
                    &property.name,
                    parse_edm_value(property.edm_type.as_deref(), text),
                );
            }
        }
    }

    fn parse_inline_links(&self, entry: &Node, descriptor: &TypeDescriptor, entity: &Entity) {
        let links = entry
            .children()
            .filter(|n| n.has_tag_name((namespaces::ATOM, "link")));

        for link in links {
            let inline = match link
                .children()
                .find(|n| n.has_tag_name((namespaces::METADATA, "inline")))
            {
                Some(inline) => inline,
                None => continue,
            };

            let name = match link
                .attribute("title")
                .or_else(|| link.attribute("rel").map(|rel| rel.rsplit('/').next().unwrap_or(rel)))
            {
                Some(name) if !name.is_empty() => name.to_string(),
                _ => continue,
            };

            let nav = descriptor.navigation_property(&name);
            let target_type = nav
                .and_then(|p| p.association.as_ref())
                .map(|a| a.to_role.type_name.clone());

            let content = inline.children().find(|n| n.is_element());
            let is_feed = content.is_some_and(|n| n.has_tag_name((namespaces::ATOM, "feed")));
            let entries: Vec<Node> = match content {
                Some(feed) if is_feed => feed
                    .children()
                    .filter(|n| n.has_tag_name((namespaces::ATOM, "entry")))
                    .collect(),
                Some(single) if single.has_tag_name((namespaces::ATOM, "entry")) => vec![single],
                _ => Vec::new(),
            };

            let mut children: Vec<Entity> = entries
                .into_iter()
                .filter_map(|e| self.parse_entry(e, target_type.as_deref()))
                .collect();

            let value = match nav.and_then(|p| p.multiplicity()) {
                Some(Multiplicity::Many) => Value::Entities(children),
                Some(Multiplicity::One | Multiplicity::ZeroOrOne) => {
                    if children.is_empty() {
                        Value::Null
                    } else {
                        Value::Entity(children.remove(0))
                    }
                }
                None if is_feed => Value::Entities(children),
                None => children.into_iter().next().map(Value::Entity).unwrap_or(Value::Null),
            };

            entity.insert(&name, value);
        }
    }
}

fn is_links_document(root: &Node) -> bool {
    let name = root.tag_name().name();
    name == "links" || (name == "uri" && root.tag_name().namespace() == Some(namespaces::DATA))
}

/// `entry` elements that are not nested inside another entry
fn top_level_entries<'a, 'i>(root: &Node<'a, 'i>) -> Vec<Node<'a, 'i>> {
    root.descendants()
        .filter(|n| n.has_tag_name((namespaces::ATOM, "entry")))
        .filter(|n| {
            !n.ancestors()
                .skip(1)
                .any(|a| a.has_tag_name((namespaces::ATOM, "entry")))
        })
        .collect()
}

fn next_link(feed: &Node) -> Option<String> {
    feed.children()
        .filter(|n| n.has_tag_name((namespaces::ATOM, "link")))
        .find(|n| n.attribute("rel") == Some("next"))
        .and_then(|n| n.attribute("href"))
        .filter(|href| !href.is_empty())
        .map(str::to_string)
}

fn atom_child<'a, 'i>(node: &Node<'a, 'i>, name: &str) -> Option<Node<'a, 'i>> {
    node.children()
        .find(|n| n.has_tag_name((namespaces::ATOM, name)))
}

/// `content/m:properties`, or `m:properties` directly under a media link entry
fn properties_node<'a, 'i>(entry: &Node<'a, 'i>) -> Option<Node<'a, 'i>> {
    let in_content = atom_child(entry, "content").and_then(|content| {
        content
            .children()
            .find(|n| n.has_tag_name((namespaces::METADATA, "properties")))
    });

    in_content.or_else(|| {
        entry
            .children()
            .find(|n| n.has_tag_name((namespaces::METADATA, "properties")))
    })
}
