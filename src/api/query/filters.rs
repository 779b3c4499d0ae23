//! OData v2 filter expressions
//!
//! Helpers that render `$filter` strings. The query builder treats the
//! result as an opaque string, so raw expressions work just as well.

use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug, Clone)]
pub enum Filter {
    // Comparison operators
    Eq(String, FilterValue),
    Ne(String, FilterValue),
    Gt(String, FilterValue),
    Ge(String, FilterValue),
    Lt(String, FilterValue),
    Le(String, FilterValue),

    // String functions
    SubstringOf(String, String),
    StartsWith(String, String),
    EndsWith(String, String),

    // Logical operators
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),

    Raw(String),
}

/// A literal on the right-hand side of a comparison
#[derive(Debug, Clone)]
pub enum FilterValue {
    String(String),
    Number(f64),
    Integer(i64),
    Boolean(bool),
    DateTime(DateTime<Utc>),
    Null,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::Eq(field.into(), value.into())
    }

    pub fn ne(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::Ne(field.into(), value.into())
    }

    pub fn gt(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::Gt(field.into(), value.into())
    }

    pub fn ge(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::Ge(field.into(), value.into())
    }

    pub fn lt(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::Lt(field.into(), value.into())
    }

    pub fn le(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::Le(field.into(), value.into())
    }

    /// `substringof('value', field)`
    pub fn substring_of(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::SubstringOf(field.into(), value.into())
    }

    pub fn starts_with(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::StartsWith(field.into(), value.into())
    }

    pub fn ends_with(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::EndsWith(field.into(), value.into())
    }

    pub fn and(filters: Vec<Filter>) -> Self {
        Self::And(filters)
    }

    pub fn or(filters: Vec<Filter>) -> Self {
        Self::Or(filters)
    }

    pub fn not(filter: Filter) -> Self {
        Self::Not(Box::new(filter))
    }

    pub fn raw(filter: impl Into<String>) -> Self {
        Self::Raw(filter.into())
    }

    pub fn to_odata_string(&self) -> String {
        match self {
            Filter::Eq(field, value) => format!("{} eq {}", field, value.to_odata_string()),
            Filter::Ne(field, value) => format!("{} ne {}", field, value.to_odata_string()),
            Filter::Gt(field, value) => format!("{} gt {}", field, value.to_odata_string()),
            Filter::Ge(field, value) => format!("{} ge {}", field, value.to_odata_string()),
            Filter::Lt(field, value) => format!("{} lt {}", field, value.to_odata_string()),
            Filter::Le(field, value) => format!("{} le {}", field, value.to_odata_string()),

            Filter::SubstringOf(field, value) => {
                format!("substringof({}, {})", quote(value), field)
            }
            Filter::StartsWith(field, value) => format!("startswith({}, {})", field, quote(value)),
            Filter::EndsWith(field, value) => format!("endswith({}, {})", field, quote(value)),

            Filter::And(filters) => join(filters, " and "),
            Filter::Or(filters) => join(filters, " or "),
            Filter::Not(filter) => format!("not ({})", filter.to_odata_string()),

            Filter::Raw(raw) => raw.clone(),
        }
    }
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn join(filters: &[Filter], separator: &str) -> String {
    let parts: Vec<String> = filters.iter().map(Filter::to_odata_string).collect();
    format!("({})", parts.join(separator))
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_odata_string())
    }
}

impl From<Filter> for String {
    fn from(filter: Filter) -> Self {
        filter.to_odata_string()
    }
}

impl FilterValue {
    pub fn to_odata_string(&self) -> String {
        match self {
            FilterValue::String(s) => quote(s),
            FilterValue::Number(n) => n.to_string(),
            FilterValue::Integer(i) => i.to_string(),
            FilterValue::Boolean(b) => b.to_string(),
            FilterValue::DateTime(dt) => format!("datetime'{}'", dt.format("%Y-%m-%dT%H:%M:%S")),
            FilterValue::Null => "null".to_string(),
        }
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::String(value)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::String(value.to_string())
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        FilterValue::Number(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Integer(value)
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        FilterValue::Integer(value as i64)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Boolean(value)
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(value: DateTime<Utc>) -> Self {
        FilterValue::DateTime(value)
    }
}
