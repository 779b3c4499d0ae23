//! Error types for the OData client

use thiserror::Error;

/// Fallback message used when an error payload carries no readable message.
pub const NO_MESSAGE: &str = "Server returned error but no message.";

/// Library errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The EDMX document is malformed or references something that can't be resolved.
    #[error("metadata parse error: {0}")]
    MetadataParse(String),

    /// An operation that isn't allowed in the current state.
    #[error(transparent)]
    NotSupported(#[from] NotSupported),

    /// A name that should refer to a navigation property doesn't.
    #[error("'{property}' is not a valid navigation property for {type_name}")]
    InvalidNavigationProperty { type_name: String, property: String },

    /// A non-success HTTP response from the service.
    #[error("service error ({status}): {message}")]
    Service { status: u16, message: String },

    /// A function import was called with too many positional arguments.
    #[error("wrong number of arguments ({given} for {expected})")]
    ArgumentCount { given: usize, expected: usize },

    /// A dynamic invocation that matches no collection, AddTo or function import.
    #[error("undefined operation '{0}'")]
    UnknownOperation(String),

    /// A property name not declared on the entity's type.
    #[error("'{property}' is not a property of {type_name}")]
    UnknownProperty { type_name: String, property: String },

    /// An argument of the wrong kind for a dynamic invocation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("no query is pending; select a collection first")]
    NoPendingQuery,

    /// The response could not be interpreted.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Operations rejected before anything is sent to the service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotSupported {
    #[error("You cannot {operation} a non-tracked {type_name} entity")]
    UntrackedEntity { operation: String, type_name: String },

    #[error("You cannot add a link on a non-tracked {type_name} parent entity")]
    UntrackedParent { type_name: String },

    #[error("You cannot add a link to a non-tracked {type_name} child entity")]
    UntrackedChild { type_name: String },

    #[error("You cannot call both the `{first}` method and the `{second}` method in the same query.")]
    QueryCombination {
        first: &'static str,
        second: &'static str,
    },
}

impl Error {
    pub(crate) fn metadata(message: impl Into<String>) -> Self {
        Self::MetadataParse(message.into())
    }

    /// HTTP status for service errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Service { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_supported(&self) -> bool {
        matches!(self, Self::NotSupported(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
