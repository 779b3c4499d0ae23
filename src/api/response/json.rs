//! Verbose JSON (`application/json;odata=verbose`) parsing

use super::value::parse_edm_value;
use super::ParsedResponse;
use crate::api::metadata::{collection_inner, local_name, Multiplicity, PropertyMetadata};
use crate::api::models::{Entity, EntityMetadata, EntityTypeRegistry, TypeDescriptor, Value};
use crate::api::query::Payload;
use crate::error::Result;
use log::{debug, warn};
use rust_decimal::Decimal;
use serde_json::{Map, Value as Json};
use std::rc::Rc;
use std::str::FromStr;

pub(crate) struct JsonParser<'r> {
    registry: &'r EntityTypeRegistry,
}

impl<'r> JsonParser<'r> {
    pub fn new(registry: &'r EntityTypeRegistry) -> Self {
        Self { registry }
    }

    pub fn parse(&self, body: &str, expected_type: Option<&str>) -> Result<ParsedResponse> {
        let document: Json = serde_json::from_str(body)?;
        let data = document.get("d").unwrap_or(&document);

        let (items, next_link) = match data {
            Json::Array(items) => (Some(items), None),
            Json::Object(object) => (
                object.get("results").and_then(Json::as_array),
                object.get("__next").and_then(Json::as_str).map(str::to_string),
            ),
            _ => (None, None),
        };

        let payload = match items {
            Some(items) if !items.is_empty() && items.iter().all(is_link) => Payload::Links(
                items
                    .iter()
                    .filter_map(|item| item.get("uri").and_then(Json::as_str))
                    .map(str::to_string)
                    .collect(),
            ),
            Some(items) => {
                let mut entities: Vec<Entity> = items
                    .iter()
                    .filter_map(Json::as_object)
                    .filter_map(|object| self.parse_entity(object, expected_type))
                    .collect();
                if entities.len() == 1 {
                    Payload::Entity(entities.remove(0))
                } else {
                    Payload::Entities(entities)
                }
            }
            None if is_link(data) => Payload::Links(
                data.get("uri")
                    .and_then(Json::as_str)
                    .map(|uri| vec![uri.to_string()])
                    .unwrap_or_default(),
            ),
            None => match data.as_object().and_then(|o| self.parse_entity(o, expected_type)) {
                Some(entity) => Payload::Entity(entity),
                None => Payload::Entities(Vec::new()),
            },
        };

        debug!("Parsed JSON payload with {} items", payload.len());
        Ok(ParsedResponse { payload, next_link })
    }

    pub fn parse_entity(&self, object: &Map<String, Json>, expected_type: Option<&str>) -> Option<Entity> {
        let metadata = object.get("__metadata");
        let type_name = metadata
            .and_then(|m| m.get("type"))
            .and_then(Json::as_str)
            .map(local_name);

        let descriptor = [type_name, expected_type.map(local_name)]
            .into_iter()
            .flatten()
            .find_map(|name| self.registry.resolve(name))
            .filter(|d| !d.is_complex);

        let descriptor = match descriptor {
            Some(descriptor) => descriptor,
            None => {
                warn!("Skipping JSON object with unresolvable type {:?}", type_name);
                return None;
            }
        };

        let entity = Entity::new(descriptor.clone());
        if let Some(uri) = metadata.and_then(|m| m.get("uri")).and_then(Json::as_str) {
            entity.set_metadata(Some(EntityMetadata { uri: uri.to_string() }));
        }

        for property in &descriptor.properties {
            let raw = match object.get(&property.name) {
                Some(raw) => raw,
                None => continue,
            };

            if property.is_navigation {
                if let Some(value) = self.navigation_value(property, raw) {
                    entity.insert(&property.name, value);
                }
            } else {
                entity.insert(&property.name, self.json_value(property.edm_type.as_deref(), raw));
            }
        }

        Some(entity)
    }

    /// `None` for deferred links, which carry no data
    fn navigation_value(&self, property: &PropertyMetadata, raw: &Json) -> Option<Value> {
        if raw.get("__deferred").is_some() {
            return None;
        }

        let target = property
            .association
            .as_ref()
            .map(|a| a.to_role.type_name.as_str());

        let items = match raw {
            Json::Array(items) => Some(items),
            Json::Object(object) => object.get("results").and_then(Json::as_array),
            _ => None,
        };

        let mut children: Vec<Entity> = match (items, raw) {
            (Some(items), _) => items
                .iter()
                .filter_map(Json::as_object)
                .filter_map(|o| self.parse_entity(o, target))
                .collect(),
            (None, Json::Object(object)) => self.parse_entity(object, target).into_iter().collect(),
            _ => Vec::new(),
        };

        Some(match property.multiplicity() {
            Some(Multiplicity::Many) => Value::Entities(children),
            _ if items.is_some() && property.multiplicity().is_none() => Value::Entities(children),
            _ if children.is_empty() => Value::Null,
            _ => Value::Entity(children.remove(0)),
        })
    }

    fn json_value(&self, edm_type: Option<&str>, raw: &Json) -> Value {
        let edm_type = edm_type.filter(|t| !t.is_empty());

        if let Some(inner) = edm_type.and_then(collection_inner) {
            let items = match raw {
                Json::Array(items) => Some(items),
                Json::Object(object) => object.get("results").and_then(Json::as_array),
                _ => None,
            };
            return Value::List(
                items
                    .map(|items| items.iter().map(|item| self.json_value(Some(inner), item)).collect())
                    .unwrap_or_default(),
            );
        }

        match raw {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::String(s) => parse_edm_value(edm_type, s),
            Json::Number(n) => match edm_type {
                Some("Edm.Decimal") => Decimal::from_str(&n.to_string())
                    .map(Value::Decimal)
                    .unwrap_or_else(|_| Value::String(n.to_string())),
                Some("Edm.Double") | Some("Edm.Single") => {
                    n.as_f64().map(Value::Double).unwrap_or(Value::Null)
                }
                _ => match n.as_i64() {
                    Some(i) => Value::Int(i),
                    None => n.as_f64().map(Value::Double).unwrap_or(Value::Null),
                },
            },
            Json::Object(object) => match edm_type.and_then(|t| self.complex_type(t)) {
                Some(descriptor) => Value::Entity(self.complex_value(object, descriptor)),
                None => Value::String(raw.to_string()),
            },
            Json::Array(items) => Value::List(items.iter().map(|item| self.json_value(None, item)).collect()),
        }
    }

    fn complex_type(&self, edm_type: &str) -> Option<Rc<TypeDescriptor>> {
        if edm_type.starts_with("Edm.") {
            return None;
        }
        self.registry.resolve(local_name(edm_type))
    }

    fn complex_value(&self, object: &Map<String, Json>, descriptor: Rc<TypeDescriptor>) -> Entity {
        let value = Entity::new(descriptor.clone());
        for property in descriptor.value_properties() {
            if let Some(raw) = object.get(&property.name) {
                value.insert(&property.name, self.json_value(property.edm_type.as_deref(), raw));
            }
        }
        value
    }
}

/// A `{"uri": ...}` object as returned by `$links`
fn is_link(value: &Json) -> bool {
    value
        .as_object()
        .is_some_and(|o| o.contains_key("uri") && !o.contains_key("__metadata"))
}
