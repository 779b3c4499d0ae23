//! Protocol constants for OData services

/// Metadata endpoint, relative to the service root
pub const METADATA_ENDPOINT: &str = "$metadata";

/// Batch endpoint for multi-operation requests
pub const BATCH_ENDPOINT: &str = "$batch";

/// Content type for batch requests
pub const BATCH_CONTENT_TYPE: &str = "multipart/mixed";

/// Prefix of the outer batch boundary token
pub const BATCH_BOUNDARY_PREFIX: &str = "batch_";

/// Prefix of the changeset boundary token
pub const CHANGESET_BOUNDARY_PREFIX: &str = "changeset_";

/// XML namespaces used by Atom, AtomPub and the OData extensions
pub mod namespaces {
    pub const ATOM: &str = "http://www.w3.org/2005/Atom";
    pub const APP: &str = "http://www.w3.org/2007/app";
    pub const DATA: &str = "http://schemas.microsoft.com/ado/2007/08/dataservices";
    pub const METADATA: &str = "http://schemas.microsoft.com/ado/2007/08/dataservices/metadata";
    pub const EDMX: &str = "http://schemas.microsoft.com/ado/2007/06/edmx";
}

/// Standard headers for OData requests
pub mod headers {
    pub const ACCEPT: &str = "Accept";
    pub const ACCEPT_VALUE: &str = "*/*; q=0.5, application/xml";

    pub const ACCEPT_ENCODING: &str = "Accept-Encoding";
    pub const ACCEPT_ENCODING_VALUE: &str = "gzip, deflate";

    pub const ACCEPT_CHARSET: &str = "Accept-Charset";
    pub const ACCEPT_CHARSET_VALUE: &str = "utf-8";

    pub const CONTENT_TYPE: &str = "Content-Type";

    /// Content type for JSON request bodies
    pub const CONTENT_TYPE_JSON: &str = "application/json";

    /// Content type for JSON bodies inside a changeset
    pub const CONTENT_TYPE_JSON_UTF8: &str = "application/json;charset=utf-8";
}

/// Build the URL of an entity collection
pub fn collection_endpoint(base_url: &str, collection: &str) -> String {
    format!("{}/{}", base_url, collection)
}

/// Build the `$links` URL used to associate a child with a parent's navigation property
pub fn links_endpoint(parent_uri: &str, property: &str) -> String {
    format!("{}/$links/{}", parent_uri, property)
}

/// Build the URL used to load a navigation property of a tracked entity
pub fn property_endpoint(entity_uri: &str, property: &str) -> String {
    format!("{}/{}", entity_uri, property)
}

/// Build the metadata endpoint URL
pub fn metadata_endpoint(base_url: &str) -> String {
    format!("{}/{}", base_url, METADATA_ENDPOINT)
}

/// Build the batch endpoint URL
pub fn batch_endpoint(base_url: &str) -> String {
    format!("{}/{}", base_url, BATCH_ENDPOINT)
}
