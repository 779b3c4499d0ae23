//! `$batch` request building and response parsing

pub mod builder;
pub mod parser;

pub use builder::{BatchRequest, BatchRequestBuilder, ChangeSetPart};
pub use parser::{BatchResponseItem, BatchResponseParser};
