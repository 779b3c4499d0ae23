//! Metadata-driven OData client
//!
//! ```no_run
//! use odata_client::{Service, ServiceOptions};
//!
//! let mut service = Service::open("http://services.odata.org/OData/OData.svc", ServiceOptions::default())?;
//! service.collection("Products").filter("Price gt 10").top(5);
//! let products = service.execute()?.into_entities();
//! # Ok::<(), odata_client::Error>(())
//! ```

pub mod api;
pub mod config;
pub mod error;

pub use api::{
    Argument, Entity, FunctionResult, Invocation, Key, Payload, QueryBuilder, SaveResult, Service,
    Value,
};
pub use api::query::{Filter, FilterValue, OrderBy};
pub use config::{ServiceOptions, UpdateMethod};
pub use error::{Error, NotSupported, Result};
