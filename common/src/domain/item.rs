use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::{
    AuthorId, ItemUid,
    error::ItemError,
    item_types::{ItemType, extract_parameters},
    library::Library,
    lifecycle::{
        FINAL_VERSION_LABEL, LibraryItemStatus, NEW_VERSION_LABEL, ObjectAction,
        REACTIVATED_VERSION_LABEL, RETIRED_VERSION_LABEL, VersionedItemMetadata,
    },
    value::ItemValue,
};

/// A versioned library item: one value plus the metadata of its latest version.
/// Example: the compound "Aspirin" of the Sponsor library at FINAL 2.0.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryItem {
    uid: ItemUid,
    item_type: Arc<ItemType>,
    library: Library,
    value: ItemValue,
    metadata: VersionedItemMetadata,
    is_deleted: bool,
}

/// Result of a draft edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// a new draft snapshot was produced
    Edited,
    /// the value equals the current one, nothing to version
    Unchanged,
}

impl LibraryItem {
    /// New item in DRAFT 0.1, the library must accept edits for the item type.
    pub fn create(
        uid: ItemUid,
        item_type: Arc<ItemType>,
        library: Library,
        value: ItemValue,
        author_id: AuthorId,
        now: DateTime<Utc>,
    ) -> Result<Self, ItemError> {
        if !library.is_editable && !item_type.options.allow_edit_in_locked_library {
            return Err(ItemError::LibraryNotEditable(library.name));
        }

        Ok(Self {
            uid,
            item_type,
            library,
            value,
            metadata: VersionedItemMetadata::initial(author_id, now),
            is_deleted: false,
        })
    }

    pub fn from_repository_values(
        uid: ItemUid,
        item_type: Arc<ItemType>,
        library: Library,
        value: ItemValue,
        metadata: VersionedItemMetadata,
        is_deleted: bool,
    ) -> Self {
        Self {
            uid,
            item_type,
            library,
            value,
            metadata,
            is_deleted,
        }
    }

    pub fn uid(&self) -> &ItemUid {
        &self.uid
    }

    pub fn item_type(&self) -> &Arc<ItemType> {
        &self.item_type
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn value(&self) -> &ItemValue {
        &self.value
    }

    pub fn metadata(&self) -> &VersionedItemMetadata {
        &self.metadata
    }

    pub fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    pub fn possible_actions(&self) -> BTreeSet<ObjectAction> {
        self.metadata.possible_actions()
    }

    /// Replace the value of a draft. An identical value produces no new version.
    pub fn edit_draft(
        &mut self,
        author_id: AuthorId,
        change_description: impl Into<String>,
        value: ItemValue,
        now: DateTime<Utc>,
    ) -> Result<EditOutcome, ItemError> {
        self.ensure_mutable()?;
        if self.metadata.status() != LibraryItemStatus::Draft {
            return Err(self.metadata.rejected(ObjectAction::Edit).into());
        }
        self.ensure_template_parameters_kept(&value)?;
        if self.value == value {
            return Ok(EditOutcome::Unchanged);
        }

        self.metadata = self
            .metadata
            .new_draft_version(author_id, change_description, now)?;
        self.value = value;
        Ok(EditOutcome::Edited)
    }

    pub fn approve(
        &mut self,
        author_id: AuthorId,
        change_description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), ItemError> {
        self.ensure_mutable()?;
        let description = change_description.unwrap_or_else(|| FINAL_VERSION_LABEL.to_string());
        self.metadata = self.metadata.new_final_version(author_id, description, now)?;
        Ok(())
    }

    /// Open a new draft on top of a FINAL version, optionally with a new value.
    pub fn create_new_version(
        &mut self,
        author_id: AuthorId,
        change_description: Option<String>,
        value: Option<ItemValue>,
        now: DateTime<Utc>,
    ) -> Result<(), ItemError> {
        self.ensure_mutable()?;
        if self.metadata.status() != LibraryItemStatus::Final {
            return Err(self.metadata.rejected(ObjectAction::NewVersion).into());
        }
        if let Some(value) = &value {
            self.ensure_template_parameters_kept(value)?;
        }

        let description = change_description.unwrap_or_else(|| NEW_VERSION_LABEL.to_string());
        self.metadata = self.metadata.new_draft_version(author_id, description, now)?;
        if let Some(value) = value {
            self.value = value;
        }
        Ok(())
    }

    pub fn inactivate(
        &mut self,
        author_id: AuthorId,
        change_description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), ItemError> {
        self.ensure_mutable()?;
        let description = change_description.unwrap_or_else(|| RETIRED_VERSION_LABEL.to_string());
        self.metadata = self.metadata.new_retired_version(author_id, description, now)?;
        Ok(())
    }

    pub fn reactivate(
        &mut self,
        author_id: AuthorId,
        change_description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), ItemError> {
        self.ensure_mutable()?;
        let description =
            change_description.unwrap_or_else(|| REACTIVATED_VERSION_LABEL.to_string());
        self.metadata = self.metadata.reactivate(author_id, description, now)?;
        Ok(())
    }

    /// Only items that were never approved can be deleted.
    pub fn soft_delete(&mut self) -> Result<(), ItemError> {
        if self.is_deleted {
            return Err(ItemError::Deleted);
        }
        if self.metadata.was_approved() {
            return Err(ItemError::AlreadyApproved);
        }
        self.is_deleted = true;
        Ok(())
    }

    fn ensure_mutable(&self) -> Result<(), ItemError> {
        if self.is_deleted {
            return Err(ItemError::Deleted);
        }
        if !self.library.is_editable && !self.item_type.options.allow_edit_in_locked_library {
            return Err(ItemError::LibraryNotEditable(self.library.name.clone()));
        }
        Ok(())
    }

    // number and order of template parameters are frozen from 1.0 on
    fn ensure_template_parameters_kept(&self, value: &ItemValue) -> Result<(), ItemError> {
        if !self.metadata.was_approved() {
            return Ok(());
        }
        for field in self.item_type.template_fields() {
            let before = extract_parameters(self.value.text(field).unwrap_or_default());
            let after = extract_parameters(value.text(field).unwrap_or_default());
            if before != after {
                return Err(ItemError::TemplateParametersChanged {
                    field: field.clone(),
                });
            }
        }
        Ok(())
    }
}
