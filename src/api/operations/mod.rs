//! Write operations
//!
//! Adds, updates, deletes and links are queued as [`SaveOperation`]s and
//! flushed either one at a time or as a single `$batch` changeset.

pub mod batch;
pub mod operation;
pub mod queue;

pub use batch::{BatchRequest, BatchRequestBuilder, BatchResponseItem, BatchResponseParser};
pub use operation::SaveOperation;
pub use queue::{SaveQueue, SaveResult};
