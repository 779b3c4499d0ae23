//! Pending-operation queue and its flush logic

use super::batch::{BatchRequestBuilder, BatchResponseItem, BatchResponseParser};
use super::operation::SaveOperation;
use crate::api::client::{dispatch, HttpMethod, HttpResponse, HttpTransport, RequestContext};
use crate::api::constants::headers;
use crate::api::models::{Entity, EntityTypeRegistry, Value};
use crate::api::response::{extract_error_message, ResponseParser};
use crate::config::UpdateMethod;
use crate::error::{Error, Result};
use log::{debug, info, warn};

/// Outcome of a flush
#[derive(Debug, Clone)]
pub enum SaveResult {
    /// Single add: the caller's instance, now tracked
    Added(Entity),
    /// Single update, delete or link: `true` only for 204 No Content
    Succeeded(bool),
    /// Batch flush: one item per changeset part
    Batch(Vec<BatchResponseItem>),
}

impl SaveResult {
    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            SaveResult::Added(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        match self {
            SaveResult::Added(_) => true,
            SaveResult::Succeeded(success) => *success,
            SaveResult::Batch(items) => items.iter().all(BatchResponseItem::is_success),
        }
    }
}

/// Writes waiting for the next save, in enqueue order
#[derive(Debug, Default, Clone)]
pub struct SaveQueue {
    operations: Vec<SaveOperation>,
}

impl SaveQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, operation: SaveOperation) {
        debug!("Queued {}", operation);
        self.operations.push(operation);
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SaveOperation> {
        self.operations.iter()
    }

    pub fn operations(&self) -> &[SaveOperation] {
        &self.operations
    }

    pub fn clear(&mut self) {
        self.operations.clear();
    }

    /// Send every queued operation; `None` when nothing is queued.
    ///
    /// One operation goes out as a direct request, several as one `$batch`
    /// changeset. The queue itself is left untouched.
    pub fn flush<T: HttpTransport + ?Sized>(
        &self,
        transport: &T,
        context: &RequestContext,
        registry: &EntityTypeRegistry,
        update_method: UpdateMethod,
    ) -> Result<Option<SaveResult>> {
        match self.operations.as_slice() {
            [] => Ok(None),
            [operation] => {
                single_save(operation, transport, context, registry, update_method).map(Some)
            }
            operations => {
                batch_save(operations, transport, context, registry, update_method).map(Some)
            }
        }
    }
}

fn single_save<T: HttpTransport + ?Sized>(
    operation: &SaveOperation,
    transport: &T,
    context: &RequestContext,
    registry: &EntityTypeRegistry,
    update_method: UpdateMethod,
) -> Result<SaveResult> {
    let method = operation.method(update_method);
    let url = operation.url(context.base_uri());
    let request = match operation.body() {
        Some(body) => context.json_request(method, &url, body),
        None => context.request(method, &url),
    };

    let response = dispatch(transport, request)?;
    if !response.is_success() {
        return Err(service_error(&response));
    }
    info!("{} saved ({})", operation, response.status);

    match operation {
        SaveOperation::Add { entity, .. } => {
            adopt_created(entity, &response.body, registry)?;
            Ok(SaveResult::Added(entity.clone()))
        }
        SaveOperation::AddLink { parent, property, child } => {
            link_child_to_parent(parent, property, child);
            Ok(SaveResult::Succeeded(response.status == 204))
        }
        SaveOperation::Update { .. } | SaveOperation::Delete { .. } => {
            Ok(SaveResult::Succeeded(response.status == 204))
        }
    }
}

fn batch_save<T: HttpTransport + ?Sized>(
    operations: &[SaveOperation],
    transport: &T,
    context: &RequestContext,
    registry: &EntityTypeRegistry,
    update_method: UpdateMethod,
) -> Result<SaveResult> {
    let batch = BatchRequestBuilder::new(context.base_uri())
        .add_operations(operations, update_method)
        .build();
    debug!("Sending batch with {} parts", batch.parts.len());

    let request = context
        .request(HttpMethod::Post, &batch.url)
        .header(headers::CONTENT_TYPE, batch.content_type.as_str())
        .body(batch.body);

    let response = dispatch(transport, request)?;
    if !response.is_success() {
        return Err(service_error(&response));
    }

    let content_type = response.header(headers::CONTENT_TYPE);
    let is_multipart = content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("multipart"))
        || response.body.trim_start().starts_with("--");
    let items = if is_multipart {
        BatchResponseParser::parse(&response.body, content_type)?
    } else {
        warn!("Batch response is not multipart; part results are unavailable");
        Vec::new()
    };

    if let Some(failed) = items.iter().find(|item| !item.is_success()) {
        return Err(Error::Service {
            status: failed.status_code,
            message: extract_error_message(failed.body.as_deref().unwrap_or_default()),
        });
    }

    for (index, operation) in operations.iter().enumerate() {
        let content_id = index as u32 + 1;
        let item = items
            .iter()
            .find(|item| item.content_id == Some(content_id))
            .or_else(|| (items.len() == operations.len()).then(|| &items[index]));

        match operation {
            SaveOperation::Add { entity, .. } => {
                if let Some(body) = item.and_then(|item| item.body.as_deref()) {
                    if let Err(e) = adopt_created(entity, body, registry) {
                        warn!("Could not read created entity from batch part {}: {}", content_id, e);
                    }
                }
            }
            SaveOperation::AddLink { parent, property, child } => {
                link_child_to_parent(parent, property, child);
            }
            SaveOperation::Update { .. } | SaveOperation::Delete { .. } => {}
        }
    }

    info!("Batch of {} operations saved", operations.len());
    Ok(SaveResult::Batch(items))
}

fn service_error(response: &HttpResponse) -> Error {
    Error::Service {
        status: response.status,
        message: extract_error_message(&response.body),
    }
}

/// Mark `entity` tracked using the server's copy from a create response
fn adopt_created(entity: &Entity, body: &str, registry: &EntityTypeRegistry) -> Result<()> {
    if body.trim().is_empty() {
        warn!("Create of {} returned no body; instance stays untracked", entity.type_name());
        return Ok(());
    }

    let parsed = ResponseParser::new(registry).parse(body, Some(&entity.type_name()))?;
    match parsed.payload.as_entity() {
        Some(created) => entity.adopt(created),
        None => warn!("Create response for {} held no entry", entity.type_name()),
    }
    Ok(())
}

/// Mirror a saved link locally: the child lands on the parent's property and
/// the reverse navigation property of the child points back at the parent
pub(crate) fn link_child_to_parent(parent: &Entity, property: &str, child: &Entity) {
    let parent_type = parent.descriptor();
    let navigation = match parent_type.navigation_property(property) {
        Some(navigation) => navigation,
        None => return,
    };

    attach(parent, property, navigation.is_collection(), child.clone());

    let association = match &navigation.association {
        Some(association) => association,
        None => return,
    };
    let child_type = child.descriptor();
    let reverse = child_type.navigation_properties().find(|p| {
        p.association.as_ref().is_some_and(|a| {
            a.relationship == association.relationship && a.from_role.role == association.to_role.role
        })
    });

    if let Some(reverse) = reverse {
        attach(child, &reverse.name, reverse.is_collection(), parent.shallow_copy());
    }
}

fn attach(target: &Entity, property: &str, is_collection: bool, value: Entity) {
    if is_collection {
        let mut items = target
            .get(property)
            .and_then(|v| v.as_entities().map(<[Entity]>::to_vec))
            .unwrap_or_default();
        items.push(value);
        target.insert(property, Value::Entities(items));
    } else {
        target.insert(property, Value::Entity(value));
    }
}
