//! Response parsing
//!
//! [`ResponseParser`] turns Atom XML or verbose JSON bodies into entities,
//! link lists or counts, resolving types through the service's registry.

mod json;
pub mod value;
mod xml;

pub use value::{parse_date, parse_edm_value};

use crate::api::constants::namespaces;
use crate::api::metadata::collection_inner;
use crate::api::models::{EntityTypeRegistry, Value};
use crate::api::query::Payload;
use crate::error::{Error, Result, NO_MESSAGE};
use json::JsonParser;
use roxmltree::Document;
use xml::AtomParser;

/// A parsed body plus the feed's next link, if it had one
#[derive(Debug, Clone)]
pub struct ParsedResponse {
    pub payload: Payload,
    pub next_link: Option<String>,
}

pub struct ResponseParser<'r> {
    registry: &'r EntityTypeRegistry,
}

impl<'r> ResponseParser<'r> {
    pub fn new(registry: &'r EntityTypeRegistry) -> Self {
        Self { registry }
    }

    /// Parse a feed, entry or links document.
    ///
    /// `expected_type` resolves entries that carry no type information.
    pub fn parse(&self, body: &str, expected_type: Option<&str>) -> Result<ParsedResponse> {
        if body.trim().is_empty() {
            return Err(Error::InvalidResponse("empty response body".to_string()));
        }
        if is_json(body) {
            JsonParser::new(self.registry).parse(body, expected_type)
        } else {
            AtomParser::new(self.registry).parse(body, expected_type)
        }
    }

    /// Parse a primitive or `Collection(Edm.*)` result of a service operation
    pub fn parse_primitive(&self, body: &str, edm_type: &str) -> Result<Value> {
        let inner = collection_inner(edm_type);

        if is_json(body) {
            let document: serde_json::Value = serde_json::from_str(body)?;
            let data = document.get("d").unwrap_or(&document);
            return Ok(match inner {
                Some(inner) => {
                    let items = data
                        .as_array()
                        .or_else(|| data.get("results").and_then(|r| r.as_array()));
                    Value::List(
                        items
                            .into_iter()
                            .flatten()
                            .map(|item| json_primitive(Some(inner), item))
                            .collect(),
                    )
                }
                None => {
                    let scalar = match data.as_object() {
                        Some(object) if object.len() == 1 => object.values().next().unwrap_or(data),
                        _ => data,
                    };
                    json_primitive(Some(edm_type), scalar)
                }
            });
        }

        let doc = Document::parse(body)?;
        let root = doc.root_element();
        Ok(match inner {
            Some(inner) => Value::List(
                root.children()
                    .filter(|n| n.is_element() && n.tag_name().name() == "element")
                    .map(|n| parse_edm_value(Some(inner), n.text().unwrap_or_default()))
                    .collect(),
            ),
            None if root.attribute((namespaces::METADATA, "null")) == Some("true") => Value::Null,
            None => parse_edm_value(Some(edm_type), root.text().unwrap_or_default()),
        })
    }
}

fn is_json(body: &str) -> bool {
    matches!(body.trim_start().chars().next(), Some('{') | Some('['))
}

fn json_primitive(edm_type: Option<&str>, raw: &serde_json::Value) -> Value {
    match raw {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::String(s) => parse_edm_value(edm_type, s),
        serde_json::Value::Number(n) => parse_edm_value(edm_type, &n.to_string()),
        other => Value::String(other.to_string()),
    }
}

/// Best-effort message from an OData error payload (XML or JSON)
pub fn extract_error_message(body: &str) -> String {
    let message = if is_json(body) {
        serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|document| {
                let error = document.get("error").or_else(|| document.get("odata.error"))?;
                let message = error.get("message")?;
                message
                    .get("value")
                    .and_then(|v| v.as_str())
                    .or_else(|| message.as_str())
                    .map(str::to_string)
            })
    } else {
        Document::parse(body).ok().and_then(|doc| {
            doc.descendants()
                .filter(|n| n.is_element() && n.tag_name().name() == "message")
                .find(|n| {
                    n.tag_name().namespace() == Some(namespaces::METADATA)
                        || n.parent_element()
                            .is_some_and(|p| p.tag_name().name() == "error")
                })
                .and_then(|n| n.text())
                .map(|t| t.trim().to_string())
        })
    };

    message
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| NO_MESSAGE.to_string())
}
