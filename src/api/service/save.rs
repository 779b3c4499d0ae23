//! Queueing writes and saving them

use super::Service;
use crate::api::models::Entity;
use crate::api::operations::{SaveOperation, SaveResult};
use crate::error::{Error, NotSupported, Result};
use log::info;

impl Service {
    /// Queue a create of `entity` in `collection`
    pub fn add_to(&mut self, collection: &str, entity: &Entity) -> Result<()> {
        if !self.collections.iter().any(|c| c == collection) {
            return Err(Error::UnknownOperation(format!("AddTo{}", collection)));
        }
        self.save_queue.enqueue(SaveOperation::Add {
            collection: collection.to_string(),
            entity: entity.clone(),
        });
        Ok(())
    }

    /// Queue an update of a tracked entity
    pub fn update_object(&mut self, entity: &Entity) -> Result<()> {
        require_tracked(entity, "update")?;
        self.save_queue.enqueue(SaveOperation::Update {
            entity: entity.clone(),
        });
        Ok(())
    }

    /// Queue a delete of a tracked entity
    pub fn delete_object(&mut self, entity: &Entity) -> Result<()> {
        require_tracked(entity, "delete")?;
        self.save_queue.enqueue(SaveOperation::Delete {
            entity: entity.clone(),
        });
        Ok(())
    }

    /// Queue a link from `parent.property` to `child`; both must be tracked
    pub fn add_link(&mut self, parent: &Entity, property: &str, child: &Entity) -> Result<()> {
        if !parent.is_tracked() {
            return Err(NotSupported::UntrackedParent {
                type_name: parent.type_name(),
            }
            .into());
        }
        if !child.is_tracked() {
            return Err(NotSupported::UntrackedChild {
                type_name: child.type_name(),
            }
            .into());
        }
        if parent.descriptor().navigation_property(property).is_none() {
            return Err(Error::InvalidNavigationProperty {
                type_name: parent.type_name(),
                property: property.to_string(),
            });
        }

        self.save_queue.enqueue(SaveOperation::AddLink {
            parent: parent.clone(),
            property: property.to_string(),
            child: child.clone(),
        });
        Ok(())
    }

    /// Flush the queue; `None` when nothing was queued.
    ///
    /// The queue is cleared only when the save succeeds, so a failed save can
    /// be retried or dropped with [`Service::clear_pending`].
    pub fn save_changes(&mut self) -> Result<Option<SaveResult>> {
        let result = self.save_queue.flush(
            self.transport.as_ref(),
            &self.context,
            &self.registry,
            self.options.update_method,
        )?;

        if result.is_some() {
            info!("Saved {} operations", self.save_queue.len());
            self.save_queue.clear();
        }
        Ok(result)
    }

    /// Drop every queued operation
    pub fn clear_pending(&mut self) {
        self.save_queue.clear();
    }
}

fn require_tracked(entity: &Entity, operation: &str) -> Result<()> {
    if entity.is_tracked() {
        return Ok(());
    }
    Err(NotSupported::UntrackedEntity {
        operation: operation.to_string(),
        type_name: entity.type_name(),
    }
    .into())
}
