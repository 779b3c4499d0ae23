//! EDM primitive conversion
//!
//! Parsing is tolerant: anything that doesn't fit its declared type is kept as
//! the raw string.

use crate::api::models::Value;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use log::warn;
use rust_decimal::Decimal;
use std::str::FromStr;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
];

/// Convert the text of a property according to its EDM type
pub fn parse_edm_value(edm_type: Option<&str>, text: &str) -> Value {
    let edm_type = match edm_type {
        Some(t) if !t.is_empty() => t,
        _ => return Value::String(text.to_string()),
    };

    match edm_type {
        "Edm.Int16" | "Edm.Int32" | "Edm.Int64" | "Edm.Byte" | "Edm.SByte" => text
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .unwrap_or_else(|_| fallback(edm_type, text)),
        "Edm.Decimal" => Decimal::from_str(text.trim())
            .or_else(|_| Decimal::from_scientific(text.trim()))
            .map(Value::Decimal)
            .unwrap_or_else(|_| fallback(edm_type, text)),
        "Edm.Double" | "Edm.Single" => text
            .trim()
            .parse::<f64>()
            .map(Value::Double)
            .unwrap_or_else(|_| fallback(edm_type, text)),
        "Edm.Boolean" => match text.trim() {
            "true" | "1" => Value::Bool(true),
            "false" | "0" => Value::Bool(false),
            _ => fallback(edm_type, text),
        },
        "Edm.DateTime" | "Edm.DateTimeOffset" => parse_date(text)
            .map(Value::DateTime)
            .unwrap_or_else(|| fallback(edm_type, text)),
        _ => Value::String(text.to_string()),
    }
}

fn fallback(edm_type: &str, text: &str) -> Value {
    if !text.is_empty() {
        warn!("Keeping malformed {} value as text: {}", edm_type, text);
    }
    Value::String(text.to_string())
}

/// Parse an Atom or JSON timestamp. Timestamps without an offset are UTC.
pub fn parse_date(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(inner) = text
        .strip_prefix("/Date(")
        .and_then(|rest| rest.strip_suffix(")/"))
    {
        return parse_json_date(inner);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt);
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc().fixed_offset())
}

/// `/Date(1356998400000)/` or `/Date(1356998400000+0060)/`; the offset is in minutes
fn parse_json_date(inner: &str) -> Option<DateTime<FixedOffset>> {
    let split = inner
        .char_indices()
        .skip(1)
        .find(|(_, c)| *c == '+' || *c == '-')
        .map(|(i, _)| i);

    let (millis, offset_minutes) = match split {
        Some(i) => (&inner[..i], inner[i..].parse::<i32>().ok()?),
        None => (inner, 0),
    };

    let millis: i64 = millis.parse().ok()?;
    let utc = Utc.timestamp_millis_opt(millis).single()?;
    let offset = FixedOffset::east_opt(offset_minutes.checked_mul(60)?)?;
    Some(utc.with_timezone(&offset))
}
