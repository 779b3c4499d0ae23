//! OData client API
//!
//! Metadata parsing, the type registry, query building, response parsing,
//! the write queue and the [`Service`] that ties them together.

pub mod client;
pub mod constants;
pub mod metadata;
pub mod models;
pub mod operations;
pub mod query;
pub mod response;
pub mod service;

pub use client::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use models::{Entity, EntityMetadata, EntityTypeRegistry, SerializeMode, TypeDescriptor, Value};
pub use operations::{SaveOperation, SaveQueue, SaveResult};
pub use query::{Filter, FilterValue, OrderBy, PartialCursor, Payload, QueryBuilder};
pub use response::{extract_error_message, ParsedResponse, ResponseParser};
pub use service::{Argument, Capability, FunctionResult, Invocation, Key, Service};
