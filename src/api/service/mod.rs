//! The service orchestrator
//!
//! A [`Service`] is bound to one OData endpoint. Opening it fetches the
//! service document and `$metadata`, builds the type registry and the
//! capability table, and from then on it issues queries and flushes queued
//! writes through its transport.

mod dispatch;
mod query;
mod save;

pub use dispatch::{Argument, Capability, FunctionResult, Invocation, Key};

use crate::api::client::{
    dispatch as send, HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport,
    RequestContext,
};
use crate::api::constants::metadata_endpoint;
use crate::api::metadata::{
    local_name, parse_edmx, parse_service_document, Association, EdmxModel, FunctionImport,
};
use crate::api::models::EntityTypeRegistry;
use crate::api::operations::{SaveOperation, SaveQueue};
use crate::api::query::{PartialCursor, QueryBuilder};
use crate::api::response::extract_error_message;
use crate::config::ServiceOptions;
use crate::error::{Error, Result};
use log::{debug, info};
use std::collections::HashMap;
use std::rc::Rc;

/// Client for one OData service
pub struct Service {
    uri: String,
    options: ServiceOptions,
    transport: Box<dyn HttpTransport>,
    context: RequestContext,
    registry: EntityTypeRegistry,
    model: EdmxModel,
    collections: Vec<String>,
    capabilities: HashMap<String, Capability>,
    query: Option<QueryBuilder>,
    cursor: Option<PagingState>,
    save_queue: SaveQueue,
}

/// Where a non-eager query left off
#[derive(Debug, Clone)]
struct PagingState {
    cursor: PartialCursor,
    expected_type: Option<String>,
}

impl Service {
    /// Connect with the default reqwest transport
    pub fn open(uri: &str, options: ServiceOptions) -> Result<Self> {
        let transport = ReqwestTransport::new(&options)?;
        Self::with_transport(uri, options, Box::new(transport))
    }

    /// Connect over a caller-supplied transport.
    ///
    /// Fails if the service document or `$metadata` can't be fetched or parsed.
    pub fn with_transport(
        uri: &str,
        options: ServiceOptions,
        transport: Box<dyn HttpTransport>,
    ) -> Result<Self> {
        let uri = uri.trim_end_matches('/').to_string();
        let context = RequestContext::new(uri.clone(), &options);
        let registry = EntityTypeRegistry::new(options.namespace.as_deref());

        let mut service = Self {
            uri,
            options,
            transport,
            context,
            registry,
            model: EdmxModel::default(),
            collections: Vec::new(),
            capabilities: HashMap::new(),
            query: None,
            cursor: None,
            save_queue: SaveQueue::new(),
        };

        service.load_service_document()?;
        service.load_metadata()?;
        service.build_capabilities();

        info!(
            "Service {} ready: {} collections, {} types",
            service.uri,
            service.collections.len(),
            service.registry.len()
        );
        Ok(service)
    }

    fn load_service_document(&mut self) -> Result<()> {
        let response = self.get(&self.uri)?;
        self.collections = parse_service_document(&response.body)?
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        debug!("Collections: {:?}", self.collections);
        Ok(())
    }

    fn load_metadata(&mut self) -> Result<()> {
        let response = self.get(&metadata_endpoint(&self.uri))?;
        let model = parse_edmx(&response.body)?;

        for complex in &model.complex_types {
            self.registry
                .build_complex(&complex.name, complex.properties.clone(), None);
        }
        for entity_type in model.entity_types.iter().filter(|t| !t.is_abstract) {
            self.registry.build(
                &entity_type.name,
                entity_type.properties.clone(),
                entity_type.nav_properties.clone(),
                None,
            );
        }

        // Collections only named in $metadata still get an entry point
        for set in &model.entity_sets {
            if !self.collections.contains(&set.name) {
                self.collections.push(set.name.clone());
            }
        }

        info!(
            "Loaded metadata: {} complex types, {} entity types, {} function imports",
            model.complex_types.len(),
            model.entity_types.len(),
            model.function_imports.len()
        );
        self.model = model;
        Ok(())
    }

    fn build_capabilities(&mut self) {
        for collection in &self.collections {
            self.capabilities
                .insert(collection.clone(), Capability::Collection(collection.clone()));
            self.capabilities.insert(
                format!("AddTo{}", collection),
                Capability::AddTo(collection.clone()),
            );
        }
        for function in &self.model.function_imports {
            self.capabilities
                .entry(function.name.clone())
                .or_insert_with(|| Capability::Function(function.name.clone()));
        }
    }

    /// GET with the standard headers and additional params; non-2xx is an error
    fn get(&self, url: &str) -> Result<HttpResponse> {
        self.checked(self.context.request(HttpMethod::Get, url))
    }

    /// GET a URL that already carries the additional params
    fn get_raw(&self, url: &str) -> Result<HttpResponse> {
        self.checked(self.context.request_raw(HttpMethod::Get, url))
    }

    fn checked(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = send(self.transport.as_ref(), request)?;
        if !response.is_success() {
            return Err(Error::Service {
                status: response.status,
                message: extract_error_message(&response.body),
            });
        }
        Ok(response)
    }

    /// Entity type of a collection, unqualified
    fn collection_type(&self, collection: &str) -> Option<String> {
        self.model
            .entity_set(collection)
            .map(|set| local_name(&set.entity_type).to_string())
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn options(&self) -> &ServiceOptions {
        &self.options
    }

    /// Collection names, service document order first
    pub fn collections(&self) -> &[String] {
        &self.collections
    }

    /// Names of the registered types
    pub fn classes(&self) -> Vec<&str> {
        self.registry.classes()
    }

    pub fn registry(&self) -> &EntityTypeRegistry {
        &self.registry
    }

    pub fn function_imports(&self) -> &[FunctionImport] {
        &self.model.function_imports
    }

    pub fn associations(&self) -> &[Rc<Association>] {
        &self.model.associations
    }

    pub fn capabilities(&self) -> &HashMap<String, Capability> {
        &self.capabilities
    }

    /// Queued writes, in flush order
    pub fn pending_operations(&self) -> &[SaveOperation] {
        self.save_queue.operations()
    }
}
