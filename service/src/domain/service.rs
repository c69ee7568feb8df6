use std::{collections::BTreeSet, sync::Arc};

use chrono::{DateTime, Utc};
use cmdr_common::{
    AuthorId, Clock, EditOutcome, ItemError, ItemType, ItemTypeId, ItemTypesRegistry, ItemUid,
    ItemValue, LibraryItem, LibraryItemStatus, LibraryName, ObjectAction, ValidationError,
    Version,
};
use serde_json::{Map, Value};

use crate::domain::repository::{LibraryItemRepository, RepositoryError, query::ItemQuery};

/// Which snapshot of an item to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSelector {
    Latest,
    Version(Version),
    Status(LibraryItemStatus),
    At(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    AlreadyExists(String),
    #[error("{0}")]
    InvalidReference(String),
    #[error(transparent)]
    Item(#[from] ItemError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Library item use cases. Every mutation reads the current snapshot,
/// applies one aggregate operation and saves the result against that snapshot.
#[derive(Clone)]
pub struct LibraryItemService<R: LibraryItemRepository> {
    repository: R,
    item_types: Arc<dyn ItemTypesRegistry>,
    clock: Arc<dyn Clock>,
}

impl<R: LibraryItemRepository> LibraryItemService<R> {
    pub fn new(repository: R, item_types: Arc<dyn ItemTypesRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            item_types,
            clock,
        }
    }

    pub fn item_types(&self) -> &dyn ItemTypesRegistry {
        self.item_types.as_ref()
    }

    pub fn item_type(&self, id: &ItemTypeId) -> Result<Arc<ItemType>, ServiceError> {
        self.item_types
            .get(id)
            .ok_or_else(|| ServiceError::NotFound(format!("item type '{}'", id)))
    }

    pub async fn create(
        &self,
        item_type_id: &ItemTypeId,
        library_name: &LibraryName,
        value: &Map<String, Value>,
        author_id: AuthorId,
    ) -> Result<LibraryItem, ServiceError> {
        let item_type = self.item_type(item_type_id)?;
        let library = self
            .repository
            .find_library(library_name)
            .await?
            .ok_or_else(|| {
                ServiceError::InvalidReference(format!("library '{}' does not exist", library_name))
            })?;

        let value = ItemValue::from_json(&item_type, value)?;
        self.ensure_unique(&item_type, &value, None).await?;

        let uid = self.repository.next_uid(&item_type).await?;
        let item = LibraryItem::create(uid, item_type, library, value, author_id, self.clock.now())?;
        self.repository.create(&item).await?;

        tracing::info!("Created {} {}", item_type_id, item.uid());
        Ok(item)
    }

    pub async fn get(
        &self,
        item_type_id: &ItemTypeId,
        uid: &ItemUid,
        selector: VersionSelector,
    ) -> Result<LibraryItem, ServiceError> {
        let item_type = self.item_type(item_type_id)?;
        let found = match selector {
            VersionSelector::Latest => self.repository.find_latest(&item_type, uid).await?,
            VersionSelector::Version(version) => {
                self.repository.find_version(&item_type, uid, version).await?
            }
            VersionSelector::Status(status) => {
                self.repository
                    .find_latest_with_status(&item_type, uid, status)
                    .await?
            }
            VersionSelector::At(at) => self.repository.find_at(&item_type, uid, at).await?,
        };
        found.ok_or_else(|| not_found(item_type_id, uid))
    }

    pub async fn list(
        &self,
        item_type_id: &ItemTypeId,
        query: &ItemQuery,
    ) -> Result<Vec<LibraryItem>, ServiceError> {
        let item_type = self.item_type(item_type_id)?;
        Ok(self.repository.find_all(&item_type, query).await?)
    }

    /// Number of items a paged `list` draws from
    pub async fn count(
        &self,
        item_type_id: &ItemTypeId,
        query: &ItemQuery,
    ) -> Result<i64, ServiceError> {
        let item_type = self.item_type(item_type_id)?;
        Ok(self.repository.count(&item_type, query).await?)
    }

    /// Full history, newest first
    pub async fn versions(
        &self,
        item_type_id: &ItemTypeId,
        uid: &ItemUid,
    ) -> Result<Vec<LibraryItem>, ServiceError> {
        let item_type = self.item_type(item_type_id)?;
        let history = self.repository.history(&item_type, uid).await?;
        if history.is_empty() {
            return Err(not_found(item_type_id, uid));
        }
        Ok(history)
    }

    pub async fn possible_actions(
        &self,
        item_type_id: &ItemTypeId,
        uid: &ItemUid,
    ) -> Result<BTreeSet<ObjectAction>, ServiceError> {
        let item = self.get(item_type_id, uid, VersionSelector::Latest).await?;
        Ok(item.possible_actions())
    }

    /// Edit a draft. Returns the item unchanged when the value is the same.
    pub async fn edit(
        &self,
        item_type_id: &ItemTypeId,
        uid: &ItemUid,
        value: &Map<String, Value>,
        change_description: String,
        author_id: AuthorId,
    ) -> Result<LibraryItem, ServiceError> {
        let mut item = self.get(item_type_id, uid, VersionSelector::Latest).await?;
        let value = ItemValue::from_json(item.item_type(), value)?;
        self.ensure_unique(item.item_type(), &value, Some(uid)).await?;

        let expected = item.metadata().clone();
        let outcome = item.edit_draft(author_id, change_description, value, self.clock.now())?;
        match outcome {
            EditOutcome::Edited => {
                self.repository.save(&item, &expected).await?;
                tracing::info!("Edited {} {} to {}", item_type_id, uid, item.metadata().version());
            }
            EditOutcome::Unchanged => {
                tracing::debug!("Edit of {} {} left the value unchanged", item_type_id, uid);
            }
        }
        Ok(item)
    }

    pub async fn approve(
        &self,
        item_type_id: &ItemTypeId,
        uid: &ItemUid,
        change_description: Option<String>,
        author_id: AuthorId,
    ) -> Result<LibraryItem, ServiceError> {
        self.transition(item_type_id, uid, |item, now| {
            item.approve(author_id, change_description, now)
        })
        .await
    }

    /// New draft on top of a final version, optionally with a new value
    pub async fn new_version(
        &self,
        item_type_id: &ItemTypeId,
        uid: &ItemUid,
        value: Option<&Map<String, Value>>,
        change_description: Option<String>,
        author_id: AuthorId,
    ) -> Result<LibraryItem, ServiceError> {
        let value = match value {
            Some(value) => {
                let item_type = self.item_type(item_type_id)?;
                let value = ItemValue::from_json(&item_type, value)?;
                self.ensure_unique(&item_type, &value, Some(uid)).await?;
                Some(value)
            }
            None => None,
        };

        self.transition(item_type_id, uid, |item, now| {
            item.create_new_version(author_id, change_description, value, now)
        })
        .await
    }

    pub async fn inactivate(
        &self,
        item_type_id: &ItemTypeId,
        uid: &ItemUid,
        change_description: Option<String>,
        author_id: AuthorId,
    ) -> Result<LibraryItem, ServiceError> {
        self.transition(item_type_id, uid, |item, now| {
            item.inactivate(author_id, change_description, now)
        })
        .await
    }

    pub async fn reactivate(
        &self,
        item_type_id: &ItemTypeId,
        uid: &ItemUid,
        change_description: Option<String>,
        author_id: AuthorId,
    ) -> Result<LibraryItem, ServiceError> {
        self.transition(item_type_id, uid, |item, now| {
            item.reactivate(author_id, change_description, now)
        })
        .await
    }

    /// Soft delete, only for items never approved
    pub async fn delete(&self, item_type_id: &ItemTypeId, uid: &ItemUid) -> Result<(), ServiceError> {
        let mut item = self.get(item_type_id, uid, VersionSelector::Latest).await?;
        let expected = item.metadata().clone();
        item.soft_delete()?;
        self.repository.delete(uid, &expected, self.clock.now()).await?;

        tracing::info!("Deleted {} {}", item_type_id, uid);
        Ok(())
    }

    async fn transition<F>(
        &self,
        item_type_id: &ItemTypeId,
        uid: &ItemUid,
        apply: F,
    ) -> Result<LibraryItem, ServiceError>
    where
        F: FnOnce(&mut LibraryItem, DateTime<Utc>) -> Result<(), ItemError> + Send,
    {
        let mut item = self.get(item_type_id, uid, VersionSelector::Latest).await?;
        let expected = item.metadata().clone();
        apply(&mut item, self.clock.now())?;
        self.repository.save(&item, &expected).await?;

        tracing::info!(
            "{} {} is now {} {}",
            item_type_id,
            uid,
            item.metadata().status(),
            item.metadata().version()
        );
        Ok(item)
    }

    async fn ensure_unique(
        &self,
        item_type: &ItemType,
        value: &ItemValue,
        excluding: Option<&ItemUid>,
    ) -> Result<(), ServiceError> {
        for field in item_type.unique_fields() {
            let Some(field_value) = value.get(field) else {
                continue;
            };
            if self
                .repository
                .exists_with_value(item_type, field, field_value, excluding)
                .await?
            {
                return Err(ServiceError::AlreadyExists(format!(
                    "{} with {} '{}' already exists",
                    item_type.info.title,
                    field,
                    field_value.to_json()
                )));
            }
        }
        Ok(())
    }
}

fn not_found(item_type_id: &ItemTypeId, uid: &ItemUid) -> ServiceError {
    ServiceError::NotFound(format!("{} '{}'", item_type_id, uid))
}
