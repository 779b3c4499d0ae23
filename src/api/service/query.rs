//! Query execution, paging and property loading

use super::{Key, PagingState, Service};
use crate::api::constants::{collection_endpoint, property_endpoint};
use crate::api::metadata::local_name;
use crate::api::models::{Entity, Value};
use crate::api::query::{PartialCursor, Payload, QueryBuilder};
use crate::api::response::ResponseParser;
use crate::error::{Error, NotSupported, Result};
use log::{debug, warn};

impl Service {
    /// Start a query against a collection; it becomes the pending query.
    ///
    /// Unlike [`Service::invoke`], names missing from the service document are
    /// not rejected here. They are logged and sent as written, so resources the
    /// service document doesn't list can still be queried.
    pub fn collection(&mut self, name: &str) -> &mut QueryBuilder {
        self.note_unlisted_collection(name);
        let builder = QueryBuilder::with_params(name, self.context.additional_params().clone());
        self.query.insert(builder)
    }

    /// Start a query for one entity of a collection
    pub fn collection_with_key(&mut self, name: &str, key: impl Into<Key>) -> &mut QueryBuilder {
        self.note_unlisted_collection(name);
        let segment = key.into().to_path_segment();
        let builder = QueryBuilder::keyed(name, &segment, self.context.additional_params().clone());
        self.query.insert(builder)
    }

    /// The pending query, if any
    pub fn pending_query(&self) -> Option<&QueryBuilder> {
        self.query.as_ref()
    }

    /// Run the pending query.
    ///
    /// Keyed fetches yield [`Payload::Entity`]; other entity queries yield
    /// [`Payload::Entities`]. With eager paging all continuation pages are
    /// fetched and concatenated.
    pub fn execute(&mut self) -> Result<Payload> {
        let query = self.query.take().ok_or(Error::NoPendingQuery)?;
        self.run_query(&query)
    }

    pub(super) fn run_query(&mut self, query: &QueryBuilder) -> Result<Payload> {
        self.cursor = None;
        let url = format!("{}/{}", self.uri, query.query());
        let response = self.get_raw(&url)?;

        if query.is_count() {
            let count = response.body.trim().parse::<u64>().map_err(|e| {
                Error::InvalidResponse(format!("invalid $count body '{}': {}", response.body.trim(), e))
            })?;
            return Ok(Payload::Count(count));
        }

        let expected_type = self.query_type(query);
        let parsed = ResponseParser::new(&self.registry).parse(&response.body, expected_type.as_deref())?;

        if query.is_links() {
            return Ok(parsed.payload);
        }

        let mut entities = parsed.payload.into_entities();
        let mut cursor = PartialCursor::new(url, parsed.next_link.as_deref());

        if self.options.eager_partial {
            while let Some(next_url) = cursor.next_url() {
                debug!("Following continuation {}", next_url);
                let response = self.get_raw(&next_url)?;
                let page = ResponseParser::new(&self.registry).parse(&response.body, expected_type.as_deref())?;
                entities.extend(page.payload.into_entities());
                cursor.advance(page.next_link.as_deref());
            }
        } else if cursor.has_more() {
            self.cursor = Some(PagingState {
                cursor,
                expected_type,
            });
        }

        if query.is_single_entity() && entities.len() == 1 {
            return Ok(Payload::Entity(entities.remove(0)));
        }
        Ok(Payload::Entities(entities))
    }

    /// The last query stopped at a page boundary
    pub fn is_partial(&self) -> bool {
        self.cursor.as_ref().is_some_and(|state| state.cursor.has_more())
    }

    /// Fetch the next page of a partial collection; empty when there is none
    pub fn next_page(&mut self) -> Result<Payload> {
        let mut state = match self.cursor.take() {
            Some(state) => state,
            None => return Ok(Payload::Entities(Vec::new())),
        };
        let next_url = match state.cursor.next_url() {
            Some(url) => url,
            None => return Ok(Payload::Entities(Vec::new())),
        };

        let response = self.get_raw(&next_url)?;
        let page = ResponseParser::new(&self.registry).parse(&response.body, state.expected_type.as_deref())?;
        state.cursor.advance(page.next_link.as_deref());
        if state.cursor.has_more() {
            self.cursor = Some(state);
        }

        Ok(Payload::Entities(page.payload.into_entities()))
    }

    /// Fetch a navigation property of a tracked entity and store it on the entity.
    ///
    /// `*` properties become a list, single-valued ones an entity or null. The
    /// entity's own URI is left alone.
    pub fn load_property(&self, entity: &Entity, property: &str) -> Result<Value> {
        let uri = entity.uri().ok_or_else(|| NotSupported::UntrackedEntity {
            operation: "load a property on".to_string(),
            type_name: entity.type_name(),
        })?;

        let descriptor = entity.descriptor();
        let navigation = descriptor.navigation_property(property).ok_or_else(|| {
            Error::InvalidNavigationProperty {
                type_name: entity.type_name(),
                property: property.to_string(),
            }
        })?;
        let target = navigation
            .association
            .as_ref()
            .map(|a| local_name(&a.to_role.type_name).to_string());

        let response = self.get(&property_endpoint(&uri, property))?;
        let parsed = ResponseParser::new(&self.registry).parse(&response.body, target.as_deref())?;

        let value = if navigation.is_collection() {
            Value::Entities(parsed.payload.into_entities())
        } else {
            parsed
                .payload
                .into_entities()
                .into_iter()
                .next()
                .map(Value::Entity)
                .unwrap_or(Value::Null)
        };

        entity.insert(property, value.clone());
        Ok(value)
    }

    /// Fetch one entity of the given type by key; `None` when the service
    /// answers with an error such as 404
    pub fn first(&mut self, type_name: &str, key: impl Into<Key>) -> Result<Option<Entity>> {
        let wanted = local_name(type_name);
        let collection = self
            .model
            .entity_sets
            .iter()
            .find(|set| local_name(&set.entity_type) == wanted)
            .map(|set| set.name.clone())
            .ok_or_else(|| Error::UnknownOperation(format!("no collection of type {}", type_name)))?;

        let segment = key.into().to_path_segment();
        let query = QueryBuilder::keyed(&collection, &segment, self.context.additional_params().clone());

        match self.run_query(&query) {
            Ok(payload) => Ok(payload.into_entities().into_iter().next()),
            Err(Error::Service { status, message }) => {
                warn!("{} lookup failed ({}): {}", type_name, status, message);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Entity type a query's results are expected to have, following
    /// navigation segments through the associations
    fn query_type(&self, query: &QueryBuilder) -> Option<String> {
        let root = query.root();
        let mut segments = root
            .split('/')
            .chain(query.navigation().iter().flat_map(|s| s.split('/')))
            .map(strip_key)
            .filter(|s| !s.is_empty());

        let collection = segments.next()?;
        let mut type_name = self.collection_type(collection)?;

        for segment in segments {
            let descriptor = self.registry.resolve(&type_name)?;
            let navigation = descriptor.navigation_property(segment)?;
            type_name = local_name(&navigation.association.as_ref()?.to_role.type_name).to_string();
        }

        Some(type_name)
    }

    fn note_unlisted_collection(&self, name: &str) {
        if !self.collections.iter().any(|c| c == name) {
            warn!("{} is not a collection of {}; querying it as written", name, self.uri);
        }
    }

    /// Absolute URL of a collection
    pub fn collection_url(&self, name: &str) -> String {
        collection_endpoint(&self.uri, name)
    }
}

/// `Categories(1)` -> `Categories`
fn strip_key(segment: &str) -> &str {
    segment.split('(').next().unwrap_or(segment)
}
