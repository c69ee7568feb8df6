use std::{future::Future, sync::Arc};

use chrono::{DateTime, Utc};
use cmdr_common::{
    AttributeId, FieldValue, ItemType, ItemUid, Library, LibraryItem, LibraryItemStatus,
    LibraryName, Version, VersionedItemMetadata,
};

use crate::domain::repository::query::ItemQuery;

pub mod query;

/// Storage of library items: one root per item plus one row per snapshot.
/// Deleted items are invisible to every lookup.
pub trait LibraryItemRepository: Clone + Send + Sync + 'static {
    fn find_library(
        &self,
        name: &LibraryName,
    ) -> impl Future<Output = Result<Option<Library>, RepositoryError>> + Send;

    /// Reserve the next uid for an item of the given type
    fn next_uid(
        &self,
        item_type: &ItemType,
    ) -> impl Future<Output = Result<ItemUid, RepositoryError>> + Send;

    /// Current snapshot
    fn find_latest(
        &self,
        item_type: &Arc<ItemType>,
        uid: &ItemUid,
    ) -> impl Future<Output = Result<Option<LibraryItem>, RepositoryError>> + Send;

    fn find_version(
        &self,
        item_type: &Arc<ItemType>,
        uid: &ItemUid,
        version: Version,
    ) -> impl Future<Output = Result<Option<LibraryItem>, RepositoryError>> + Send;

    /// Newest snapshot having the given status
    fn find_latest_with_status(
        &self,
        item_type: &Arc<ItemType>,
        uid: &ItemUid,
        status: LibraryItemStatus,
    ) -> impl Future<Output = Result<Option<LibraryItem>, RepositoryError>> + Send;

    /// Snapshot valid at the given instant
    fn find_at(
        &self,
        item_type: &Arc<ItemType>,
        uid: &ItemUid,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<LibraryItem>, RepositoryError>> + Send;

    /// All snapshots, newest first
    fn history(
        &self,
        item_type: &Arc<ItemType>,
        uid: &ItemUid,
    ) -> impl Future<Output = Result<Vec<LibraryItem>, RepositoryError>> + Send;

    /// Latest snapshot of every item matching the query, ordered by uid
    fn find_all(
        &self,
        item_type: &Arc<ItemType>,
        query: &ItemQuery,
    ) -> impl Future<Output = Result<Vec<LibraryItem>, RepositoryError>> + Send;

    /// Number of items matching the query, ignoring its paging
    fn count(
        &self,
        item_type: &Arc<ItemType>,
        query: &ItemQuery,
    ) -> impl Future<Output = Result<i64, RepositoryError>> + Send;

    /// Whether the current value of another item of this type holds `value` in `field`
    fn exists_with_value(
        &self,
        item_type: &ItemType,
        field: &AttributeId,
        value: &FieldValue,
        excluding: Option<&ItemUid>,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    /// Store a new item with its first snapshot
    fn create(
        &self,
        item: &LibraryItem,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Append the item's snapshot, closing the current one.
    /// Fails with `ConcurrentModification` when the current snapshot is not `expected_current`.
    fn save(
        &self,
        item: &LibraryItem,
        expected_current: &VersionedItemMetadata,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Mark the item deleted and close its current snapshot at `now`
    fn delete(
        &self,
        uid: &ItemUid,
        expected_current: &VersionedItemMetadata,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("library item not found")]
    NotFound,
    #[error("{0} already exists")]
    UniqueViolation(String),
    #[error("library item {0} was modified concurrently")]
    ConcurrentModification(ItemUid),
    #[error("database error: {0}")]
    DatabaseError(String),
}

/// Whether the stored current snapshot still is the one a change was based on
pub(crate) fn is_same_snapshot(
    stored: &VersionedItemMetadata,
    expected: &VersionedItemMetadata,
) -> bool {
    stored.status() == expected.status()
        && stored.version() == expected.version()
        && stored.start_date() == expected.start_date()
}
