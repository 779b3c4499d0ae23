//! `$batch` request builder
//!
//! Renders queued operations as one changeset inside a multipart/mixed batch.

use crate::api::client::HttpMethod;
use crate::api::constants::{
    batch_endpoint, headers, BATCH_BOUNDARY_PREFIX, BATCH_CONTENT_TYPE, CHANGESET_BOUNDARY_PREFIX,
};
use crate::api::operations::SaveOperation;
use crate::config::UpdateMethod;
use uuid::Uuid;

const CRLF: &str = "\r\n";

/// One request inside the changeset
#[derive(Debug, Clone)]
pub struct ChangeSetPart {
    pub content_id: u32,
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

pub struct BatchRequestBuilder {
    batch_id: String,
    changeset_id: String,
    base_url: String,
    parts: Vec<ChangeSetPart>,
}

impl BatchRequestBuilder {
    /// Fresh boundary tokens are generated for every builder
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            batch_id: format!("{}{}", BATCH_BOUNDARY_PREFIX, Uuid::new_v4().simple()),
            changeset_id: format!("{}{}", CHANGESET_BOUNDARY_PREFIX, Uuid::new_v4().simple()),
            base_url: base_url.into(),
            parts: Vec::new(),
        }
    }

    /// Append operations in order; Content-IDs continue from the previous part
    pub fn add_operations(mut self, operations: &[SaveOperation], update_method: UpdateMethod) -> Self {
        for operation in operations {
            let part = self.to_part(operation, update_method, self.parts.len() as u32 + 1);
            self.parts.push(part);
        }
        self
    }

    pub fn add_operation(self, operation: &SaveOperation, update_method: UpdateMethod) -> Self {
        self.add_operations(std::slice::from_ref(operation), update_method)
    }

    fn to_part(&self, operation: &SaveOperation, update_method: UpdateMethod, content_id: u32) -> ChangeSetPart {
        let method = operation.method(update_method);
        let mut part_headers = vec![(
            headers::ACCEPT_CHARSET.to_string(),
            headers::ACCEPT_CHARSET_VALUE.to_string(),
        )];
        if method != HttpMethod::Delete {
            part_headers.push((
                headers::CONTENT_TYPE.to_string(),
                headers::CONTENT_TYPE_JSON_UTF8.to_string(),
            ));
        }

        ChangeSetPart {
            content_id,
            method,
            url: operation.url(&self.base_url),
            headers: part_headers,
            body: operation.body(),
        }
    }

    pub fn build(self) -> BatchRequest {
        let mut body = String::new();

        body.push_str(&format!("--{}{}", self.batch_id, CRLF));
        body.push_str(&format!(
            "Content-Type: {}; boundary={}{}",
            BATCH_CONTENT_TYPE, self.changeset_id, CRLF
        ));
        body.push_str(CRLF);

        for part in &self.parts {
            body.push_str(&format!("--{}{}", self.changeset_id, CRLF));
            body.push_str(&format!("Content-Type: application/http{}", CRLF));
            body.push_str(&format!("Content-Transfer-Encoding: binary{}", CRLF));
            body.push_str(&format!("Content-ID: {}{}", part.content_id, CRLF));
            body.push_str(CRLF);

            body.push_str(&format!("{} {} HTTP/1.1{}", part.method, part.url, CRLF));
            for (name, value) in &part.headers {
                body.push_str(&format!("{}: {}{}", name, value, CRLF));
            }
            body.push_str(CRLF);

            if let Some(part_body) = &part.body {
                body.push_str(part_body);
            }
            body.push_str(CRLF);
        }

        body.push_str(&format!("--{}--{}", self.changeset_id, CRLF));
        body.push_str(&format!("--{}--{}", self.batch_id, CRLF));

        BatchRequest {
            url: batch_endpoint(&self.base_url),
            content_type: format!("{}; boundary={}", BATCH_CONTENT_TYPE, self.batch_id),
            body,
            parts: self.parts,
        }
    }

    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    pub fn changeset_id(&self) -> &str {
        &self.changeset_id
    }
}

/// A rendered batch, ready to POST
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub url: String,
    pub content_type: String,
    pub body: String,
    pub parts: Vec<ChangeSetPart>,
}
