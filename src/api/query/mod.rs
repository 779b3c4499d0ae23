//! Query construction and results
//!
//! [`QueryBuilder`] renders resource paths and query options; [`Filter`] and
//! [`OrderBy`] produce the expression strings it accepts.

pub mod builder;
pub mod filters;
pub mod orderby;
pub mod result;

pub use builder::{escape_key_literal, escape_path, QueryBuilder};
pub use filters::{Filter, FilterValue};
pub use orderby::OrderBy;
pub use result::{Continuation, PartialCursor, Payload};
