//! QueryBuilder for OData resource paths and query options

use crate::api::client::encode_params;
use crate::error::{NotSupported, Result};
use std::collections::BTreeMap;

/// Accumulates one query against a collection.
///
/// Renders as `root[/nav..][/$links/<p> | /$count]?$select&$expand&$filter&$orderby&$skip&$top&<params>`.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    root: String,
    navigation: Vec<String>,
    expands: Vec<String>,
    filters: Vec<String>,
    order_bys: Vec<String>,
    selects: Vec<String>,
    skip: Option<u64>,
    top: Option<u64>,
    links_property: Option<String>,
    count: bool,
    additional_params: BTreeMap<String, String>,
}

impl QueryBuilder {
    pub fn new(root: impl AsRef<str>) -> Self {
        Self::with_params(root, BTreeMap::new())
    }

    /// A builder whose rendered query always ends with `additional_params`
    pub fn with_params(root: impl AsRef<str>, additional_params: BTreeMap<String, String>) -> Self {
        Self {
            root: escape_path(root.as_ref()),
            navigation: Vec::new(),
            expands: Vec::new(),
            filters: Vec::new(),
            order_bys: Vec::new(),
            selects: Vec::new(),
            skip: None,
            top: None,
            links_property: None,
            count: false,
            additional_params,
        }
    }

    /// A builder for one entity: `collection` is escaped, `key_segment` is
    /// used as given and must already be percent-encoded
    pub fn keyed(
        collection: &str,
        key_segment: &str,
        additional_params: BTreeMap<String, String>,
    ) -> Self {
        let mut builder = Self::with_params(collection, additional_params);
        builder.root.push_str(key_segment);
        builder
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn additional_params(&self) -> &BTreeMap<String, String> {
        &self.additional_params
    }

    /// Path segments appended with [`QueryBuilder::navigate`]
    pub fn navigation(&self) -> &[String] {
        &self.navigation
    }

    /// Expand a navigation path, e.g. `Products` or `Products/Supplier`
    pub fn expand(&mut self, path: impl Into<String>) -> &mut Self {
        push_unique(&mut self.expands, path.into());
        self
    }

    /// Add a filter expression; multiple filters are joined with `and`
    pub fn filter(&mut self, expression: impl Into<String>) -> &mut Self {
        self.filters.push(expression.into());
        self
    }

    pub fn order_by(&mut self, expression: impl Into<String>) -> &mut Self {
        self.order_bys.push(expression.into());
        self
    }

    pub fn skip(&mut self, count: u64) -> &mut Self {
        self.skip = Some(count);
        self
    }

    pub fn top(&mut self, count: u64) -> &mut Self {
        self.top = Some(count);
        self
    }

    /// Select properties. Nested paths such as `Products/Name` expand their
    /// parent path automatically.
    pub fn select<I, S>(&mut self, properties: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.count {
            return Err(combination("count", "select"));
        }
        if self.links_property.is_some() {
            return Err(combination("links", "select"));
        }

        for property in properties {
            let property = property.into();
            if let Some((parent, _)) = property.rsplit_once('/') {
                push_unique(&mut self.expands, parent.to_string());
            }
            push_unique(&mut self.selects, property);
        }
        Ok(self)
    }

    /// Append a path segment to the resource path
    pub fn navigate(&mut self, path: impl AsRef<str>) -> &mut Self {
        self.navigation.push(escape_path(path.as_ref()));
        self
    }

    /// Address the links of a navigation property instead of the entities
    pub fn links(&mut self, navigation_property: impl Into<String>) -> Result<&mut Self> {
        if self.count {
            return Err(combination("count", "links"));
        }
        if !self.selects.is_empty() {
            return Err(combination("select", "links"));
        }
        self.links_property = Some(escape_path(&navigation_property.into()));
        Ok(self)
    }

    /// Ask for the number of matching entities instead of the entities
    pub fn count(&mut self) -> Result<&mut Self> {
        if self.links_property.is_some() {
            return Err(combination("links", "count"));
        }
        if !self.selects.is_empty() {
            return Err(combination("select", "count"));
        }
        self.count = true;
        Ok(self)
    }

    pub fn is_count(&self) -> bool {
        self.count
    }

    pub fn is_links(&self) -> bool {
        self.links_property.is_some()
    }

    /// The root addresses one entity by key and nothing is appended to it
    pub fn is_single_entity(&self) -> bool {
        self.root.ends_with(')')
            && self.root.contains('(')
            && self.navigation.is_empty()
            && !self.is_links()
            && !self.count
    }

    /// Resource path plus query options, relative to the service root
    pub fn query(&self) -> String {
        let mut path = self.root.clone();
        for segment in &self.navigation {
            path.push('/');
            path.push_str(segment);
        }
        if let Some(property) = &self.links_property {
            path.push_str("/$links/");
            path.push_str(property);
        } else if self.count {
            path.push_str("/$count");
        }

        let mut options = Vec::new();
        if !self.selects.is_empty() {
            options.push(format!("$select={}", self.selects.join(",")));
        }
        if !self.expands.is_empty() {
            options.push(format!("$expand={}", self.expands.join(",")));
        }
        if !self.filters.is_empty() {
            options.push(format!(
                "$filter={}",
                urlencoding::encode(&self.filters.join(" and "))
            ));
        }
        if !self.order_bys.is_empty() {
            options.push(format!(
                "$orderby={}",
                urlencoding::encode(&self.order_bys.join(","))
            ));
        }
        if let Some(skip) = self.skip {
            options.push(format!("$skip={}", skip));
        }
        if let Some(top) = self.top {
            options.push(format!("$top={}", top));
        }
        if !self.additional_params.is_empty() {
            options.push(encode_params(&self.additional_params));
        }

        if options.is_empty() {
            path
        } else {
            format!("{}?{}", path, options.join("&"))
        }
    }
}

fn combination(first: &'static str, second: &'static str) -> crate::error::Error {
    NotSupported::QueryCombination { first, second }.into()
}

fn push_unique(list: &mut Vec<String>, item: String) {
    if !list.contains(&item) {
        list.push(item);
    }
}

/// Percent-encode a resource path, keeping URI delimiters
pub fn escape_path(path: &str) -> String {
    percent_encode(path, "-._~!$&'()*+,;=:@/")
}

/// Percent-encode a key literal such as `'a/b'`; `/` and `%` never survive
pub fn escape_key_literal(literal: &str) -> String {
    percent_encode(literal, "-._~!$&'()*+,;=:@")
}

fn percent_encode(text: &str, keep: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() || keep.contains(ch) {
            escaped.push(ch);
        } else {
            let mut buf = [0u8; 4];
            for byte in ch.encode_utf8(&mut buf).bytes() {
                escaped.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    escaped
}
