//! HTTP transport and per-service request context
//!
//! [`HttpTransport`] is the seam between the service and the network;
//! [`ReqwestTransport`] is the blocking `reqwest` implementation.

use super::constants::headers;
use crate::config::ServiceOptions;
use crate::error::{Error, Result};
use log::{debug, trace};
use std::collections::BTreeMap;
use std::fmt;

/// HTTP methods used by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Merge,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Merge => "MERGE",
            HttpMethod::Delete => "DELETE",
        }
    }

    pub fn parse(method: &str) -> Option<Self> {
        match method.to_ascii_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "PATCH" => Some(HttpMethod::Patch),
            "MERGE" => Some(HttpMethod::Merge),
            "DELETE" => Some(HttpMethod::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outgoing request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A received response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// The HTTP capability the service is built on.
///
/// Implementations block until a response or a transport error is available.
pub trait HttpTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

impl<T: HttpTransport + ?Sized> HttpTransport for &T {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        (**self).send(request)
    }
}

/// Blocking reqwest transport with basic auth, TLS and timeout settings
pub struct ReqwestTransport {
    http_client: reqwest::blocking::Client,
    credentials: Option<(String, String)>,
}

impl ReqwestTransport {
    pub fn new(options: &ServiceOptions) -> Result<Self> {
        let mut builder = reqwest::blocking::Client::builder()
            .danger_accept_invalid_certs(!options.verify_ssl)
            .user_agent(
                options
                    .user_agent
                    .clone()
                    .unwrap_or_else(|| format!("odata-client/{}", env!("CARGO_PKG_VERSION"))),
            );

        if let Some(timeout) = options.timeout_duration() {
            builder = builder.timeout(timeout);
        }
        if let Some(open_timeout) = options.open_timeout_duration() {
            builder = builder.connect_timeout(open_timeout);
        }
        if let Some(proxy) = &options.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }

        let credentials = options
            .username
            .clone()
            .map(|username| (username, options.password.clone().unwrap_or_default()));

        Ok(Self {
            http_client: builder.build()?,
            credentials,
        })
    }

    /// Wrap an already configured client
    pub fn with_custom_client(http_client: reqwest::blocking::Client) -> Self {
        Self {
            http_client,
            credentials: None,
        }
    }
}

impl HttpTransport for ReqwestTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| Error::InvalidResponse(format!("invalid method: {}", e)))?;

        let mut builder = self.http_client.request(method, &request.url);
        for (name, value) in &request.headers {
            // Compression is negotiated by the client itself so bodies are decoded
            if name.eq_ignore_ascii_case(headers::ACCEPT_ENCODING) {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some((username, password)) = &self.credentials {
            builder = builder.basic_auth(username, Some(password));
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        let mut response_headers = Vec::new();
        for (name, value) in response.headers() {
            if let Ok(value_str) = value.to_str() {
                response_headers.push((name.to_string(), value_str.to_string()));
            }
        }
        let body = response.text()?;

        Ok(HttpResponse {
            status,
            headers: response_headers,
            body,
        })
    }
}

/// Builds requests against one service root: standard headers, custom headers
/// and the additional query parameters every request carries.
#[derive(Debug, Clone)]
pub struct RequestContext {
    base_uri: String,
    headers: Vec<(String, String)>,
    additional_params: BTreeMap<String, String>,
}

impl RequestContext {
    pub fn new(base_uri: impl Into<String>, options: &ServiceOptions) -> Self {
        let mut headers = vec![
            (headers::ACCEPT.to_string(), headers::ACCEPT_VALUE.to_string()),
            (
                headers::ACCEPT_ENCODING.to_string(),
                headers::ACCEPT_ENCODING_VALUE.to_string(),
            ),
        ];
        headers.extend(
            options
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );

        Self {
            base_uri: base_uri.into(),
            headers,
            additional_params: options.additional_params.clone(),
        }
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    pub fn additional_params(&self) -> &BTreeMap<String, String> {
        &self.additional_params
    }

    /// Request with the standard headers; additional params are appended to the URL
    pub fn request(&self, method: HttpMethod, url: &str) -> HttpRequest {
        let mut request = HttpRequest::new(method, append_params(url, &self.additional_params));
        request.headers = self.headers.clone();
        request
    }

    /// Request for a URL that already carries the additional params
    pub fn request_raw(&self, method: HttpMethod, url: &str) -> HttpRequest {
        let mut request = HttpRequest::new(method, url);
        request.headers = self.headers.clone();
        request
    }

    pub fn json_request(&self, method: HttpMethod, url: &str, body: String) -> HttpRequest {
        self.request(method, url)
            .header(headers::CONTENT_TYPE, headers::CONTENT_TYPE_JSON)
            .body(body)
    }
}

/// Send a request and log it
pub(crate) fn dispatch<T: HttpTransport + ?Sized>(
    transport: &T,
    request: HttpRequest,
) -> Result<HttpResponse> {
    debug!("{} {}", request.method, request.url);
    if let Some(body) = &request.body {
        trace!("Request body: {}", body);
    }

    let response = transport.send(request)?;

    debug!("Response status: {}", response.status);
    trace!("Response body: {}", response.body);
    Ok(response)
}

/// Render a parameter map as `key=value&...` with both sides url-encoded
pub fn encode_params(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Append parameters to a URL that may or may not already carry a query string
pub fn append_params(url: &str, params: &BTreeMap<String, String>) -> String {
    if params.is_empty() {
        return url.to_string();
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", url, separator, encode_params(params))
}
