//! `$batch` response parser
//!
//! Splits a multipart/mixed batch response into per-request responses,
//! descending into changeset responses.

use crate::error::{Error, Result};
use log::debug;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
enum ParsingState {
    MultipartHeaders,
    HttpStatus,
    HttpHeaders,
    Body,
}

/// One response inside a batch
#[derive(Debug, Clone)]
pub struct BatchResponseItem {
    pub content_id: Option<u32>,
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
}

impl BatchResponseItem {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

pub struct BatchResponseParser;

impl BatchResponseParser {
    /// Parse a batch response body.
    ///
    /// `content_type` is the response's Content-Type header, used for the outer
    /// boundary when present.
    pub fn parse(response_text: &str, content_type: Option<&str>) -> Result<Vec<BatchResponseItem>> {
        let boundary = content_type
            .and_then(boundary_param)
            .or_else(|| first_boundary_line(response_text))
            .ok_or_else(|| {
                Error::InvalidResponse("Could not find batch boundary in response".to_string())
            })?;

        let items = Self::parse_multipart(response_text, &boundary)?;
        debug!("Parsed {} batch response parts", items.len());
        Ok(items)
    }

    fn parse_multipart(text: &str, boundary: &str) -> Result<Vec<BatchResponseItem>> {
        let mut results = Vec::new();

        for part in text.split(&format!("--{}", boundary)) {
            let part = part.trim();
            if part.is_empty() || part == "--" || part.starts_with("--") {
                continue;
            }

            let (headers, content) = split_headers(part);
            let nested = headers
                .lines()
                .find(|line| starts_with_ignore_case(line.trim(), "Content-Type: multipart/mixed"))
                .and_then(|line| boundary_param(line.trim()));

            match nested {
                Some(changeset_boundary) => {
                    results.extend(Self::parse_multipart(content, &changeset_boundary)?);
                }
                None if contains_ignore_case(headers, "application/http") => {
                    results.push(Self::parse_http_response(part));
                }
                None => {}
            }
        }

        Ok(results)
    }

    fn parse_http_response(response_text: &str) -> BatchResponseItem {
        let mut content_id = None;
        let mut status_code = 500;
        let mut headers = HashMap::new();
        let mut state = ParsingState::MultipartHeaders;
        let mut body_lines = Vec::new();

        for raw_line in response_text.lines() {
            let line = raw_line.trim_end_matches('\r');

            match state {
                ParsingState::MultipartHeaders => {
                    if line.trim().is_empty() {
                        state = ParsingState::HttpStatus;
                    } else if let Some((name, value)) = line.split_once(':') {
                        if name.trim().eq_ignore_ascii_case("Content-ID") {
                            content_id = value.trim().parse().ok();
                        }
                    }
                }
                ParsingState::HttpStatus => {
                    if line.starts_with("HTTP/") {
                        status_code = line
                            .split_whitespace()
                            .nth(1)
                            .and_then(|s| s.parse().ok())
                            .unwrap_or(500);
                        state = ParsingState::HttpHeaders;
                    }
                }
                ParsingState::HttpHeaders => {
                    if line.trim().is_empty() {
                        state = ParsingState::Body;
                    } else if let Some((name, value)) = line.split_once(':') {
                        headers.insert(name.trim().to_string(), value.trim().to_string());
                    }
                }
                ParsingState::Body => body_lines.push(line),
            }
        }

        let body = Some(body_lines.join("\n").trim().to_string()).filter(|b| !b.is_empty());
        let content_id = content_id.or_else(|| {
            headers
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case("Content-ID"))
                .and_then(|(_, value)| value.parse().ok())
        });

        BatchResponseItem {
            content_id,
            status_code,
            headers,
            body,
        }
    }
}

/// `boundary=` parameter of a Content-Type value, quotes removed
fn boundary_param(content_type: &str) -> Option<String> {
    let lower = content_type.to_ascii_lowercase();
    let start = lower.find("boundary=")? + "boundary=".len();
    let boundary = content_type[start..]
        .split(|c: char| c == ';' || c.is_whitespace())
        .next()?
        .trim_matches('"');
    (!boundary.is_empty()).then(|| boundary.to_string())
}

/// Split a part at its first blank line
fn split_headers(part: &str) -> (&str, &str) {
    let crlf = part.find("\r\n\r\n").map(|i| (i, 4));
    let lf = part.find("\n\n").map(|i| (i, 2));
    let split = match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    };
    match split {
        Some((index, len)) => (&part[..index], &part[index + len..]),
        None => (part, ""),
    }
}

fn first_boundary_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| line.starts_with("--") && line.len() > 2)
        .map(|line| line.trim_start_matches("--").trim_end_matches("--").to_string())
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.len() >= prefix.len()
        && text.is_char_boundary(prefix.len())
        && text[..prefix.len()].eq_ignore_ascii_case(prefix)
}

fn contains_ignore_case(text: &str, needle: &str) -> bool {
    text.to_ascii_lowercase().contains(&needle.to_ascii_lowercase())
}
