use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
};

use chrono::{DateTime, Utc};
use cmdr_common::{
    AttributeId, FieldValue, ItemType, ItemTypeId, ItemUid, ItemValue, Library, LibraryItem,
    LibraryItemStatus, LibraryName, Version, VersionedItemMetadata,
};

use crate::domain::repository::{
    LibraryItemRepository, RepositoryError, is_same_snapshot, query::ItemQuery,
};

/// Repository keeping everything in process memory.
/// Used by tests and by `persistence.kind = memory` runs.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    store: Arc<Mutex<Store>>,
}

#[derive(Default)]
struct Store {
    libraries: BTreeMap<LibraryName, Library>,
    roots: BTreeMap<ItemUid, Root>,
    counters: BTreeMap<ItemTypeId, u64>,
}

struct Root {
    item_type: ItemTypeId,
    library: Library,
    is_deleted: bool,
    /// oldest first
    snapshots: Vec<Snapshot>,
}

#[derive(Clone)]
struct Snapshot {
    metadata: VersionedItemMetadata,
    value: ItemValue,
}

impl InMemoryRepository {
    pub fn with_libraries(libraries: Vec<Library>) -> Self {
        let store = Store {
            libraries: libraries
                .into_iter()
                .map(|library| (library.name.clone(), library))
                .collect(),
            ..Store::default()
        };
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Store>, RepositoryError> {
        self.store
            .lock()
            .map_err(|_| RepositoryError::DatabaseError("in-memory store is poisoned".to_string()))
    }

    fn find_one<P>(
        &self,
        item_type: &Arc<ItemType>,
        uid: &ItemUid,
        predicate: P,
    ) -> Result<Option<LibraryItem>, RepositoryError>
    where
        P: Fn(&VersionedItemMetadata) -> bool,
    {
        let store = self.lock()?;
        let item = store.visible(item_type, uid).and_then(|root| {
            root.snapshots
                .iter()
                .rev()
                .find(|snapshot| predicate(&snapshot.metadata))
                .map(|snapshot| root.item(uid, item_type, snapshot))
        });
        Ok(item)
    }
}

impl Store {
    /// Latest snapshot of every visible item matching the query, ignoring paging
    fn matching<'s>(
        &'s self,
        item_type: &'s Arc<ItemType>,
        query: &'s ItemQuery,
    ) -> impl Iterator<Item = LibraryItem> + 's {
        self.roots
            .iter()
            .filter(move |(_, root)| !root.is_deleted && root.item_type == item_type.id)
            .filter(move |(_, root)| {
                query
                    .library
                    .as_ref()
                    .is_none_or(|library| &root.library.name == library)
            })
            .filter_map(move |(uid, root)| {
                let snapshot = match query.status {
                    Some(status) => root.snapshots.iter().rev().find(|s| s.metadata.status() == status),
                    None => root.current(),
                };
                snapshot.map(|snapshot| root.item(uid, item_type, snapshot))
            })
    }

    fn visible(&self, item_type: &ItemType, uid: &ItemUid) -> Option<&Root> {
        self.roots
            .get(uid)
            .filter(|root| !root.is_deleted && root.item_type == item_type.id)
    }

    fn current_mut(
        &mut self,
        uid: &ItemUid,
        expected: &VersionedItemMetadata,
    ) -> Result<&mut Root, RepositoryError> {
        let root = self
            .roots
            .get_mut(uid)
            .filter(|root| !root.is_deleted)
            .ok_or(RepositoryError::NotFound)?;

        let unchanged = root
            .snapshots
            .last()
            .is_some_and(|current| current.metadata.is_current() && is_same_snapshot(&current.metadata, expected));
        if !unchanged {
            return Err(RepositoryError::ConcurrentModification(uid.clone()));
        }
        Ok(root)
    }
}

impl Root {
    fn current(&self) -> Option<&Snapshot> {
        self.snapshots.last().filter(|s| s.metadata.is_current())
    }

    fn close_current(&mut self, end_date: DateTime<Utc>) {
        if let Some(current) = self.snapshots.last_mut() {
            current.metadata = current.metadata.closed(end_date);
        }
    }

    fn item(&self, uid: &ItemUid, item_type: &Arc<ItemType>, snapshot: &Snapshot) -> LibraryItem {
        LibraryItem::from_repository_values(
            uid.clone(),
            item_type.clone(),
            self.library.clone(),
            snapshot.value.clone(),
            snapshot.metadata.clone(),
            self.is_deleted,
        )
    }
}

impl LibraryItemRepository for InMemoryRepository {
    async fn find_library(&self, name: &LibraryName) -> Result<Option<Library>, RepositoryError> {
        Ok(self.lock()?.libraries.get(name).cloned())
    }

    async fn next_uid(&self, item_type: &ItemType) -> Result<ItemUid, RepositoryError> {
        let mut store = self.lock()?;
        let counter = store.counters.entry(item_type.id.clone()).or_insert(0);
        *counter += 1;
        ItemUid::generate(&item_type.info.uid_prefix, *counter)
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))
    }

    async fn find_latest(
        &self,
        item_type: &Arc<ItemType>,
        uid: &ItemUid,
    ) -> Result<Option<LibraryItem>, RepositoryError> {
        self.find_one(item_type, uid, |metadata| metadata.is_current())
    }

    async fn find_version(
        &self,
        item_type: &Arc<ItemType>,
        uid: &ItemUid,
        version: Version,
    ) -> Result<Option<LibraryItem>, RepositoryError> {
        self.find_one(item_type, uid, |metadata| metadata.version() == version)
    }

    async fn find_latest_with_status(
        &self,
        item_type: &Arc<ItemType>,
        uid: &ItemUid,
        status: LibraryItemStatus,
    ) -> Result<Option<LibraryItem>, RepositoryError> {
        self.find_one(item_type, uid, |metadata| metadata.status() == status)
    }

    async fn find_at(
        &self,
        item_type: &Arc<ItemType>,
        uid: &ItemUid,
        at: DateTime<Utc>,
    ) -> Result<Option<LibraryItem>, RepositoryError> {
        self.find_one(item_type, uid, |metadata| {
            metadata.start_date() <= at && metadata.end_date().is_none_or(|end| at < end)
        })
    }

    async fn history(
        &self,
        item_type: &Arc<ItemType>,
        uid: &ItemUid,
    ) -> Result<Vec<LibraryItem>, RepositoryError> {
        let store = self.lock()?;
        let history = store
            .visible(item_type, uid)
            .map(|root| {
                root.snapshots
                    .iter()
                    .rev()
                    .map(|snapshot| root.item(uid, item_type, snapshot))
                    .collect()
            })
            .unwrap_or_default();
        Ok(history)
    }

    async fn find_all(
        &self,
        item_type: &Arc<ItemType>,
        query: &ItemQuery,
    ) -> Result<Vec<LibraryItem>, RepositoryError> {
        let store = self.lock()?;
        let offset = query.offset.unwrap_or(0).max(0) as usize;
        let limit = query.limit.map_or(usize::MAX, |limit| limit.max(0) as usize);

        Ok(store
            .matching(item_type, query)
            .skip(offset)
            .take(limit)
            .collect())
    }

    async fn count(
        &self,
        item_type: &Arc<ItemType>,
        query: &ItemQuery,
    ) -> Result<i64, RepositoryError> {
        let store = self.lock()?;
        let count = store.matching(item_type, query).count();
        i64::try_from(count).map_err(|e| RepositoryError::DatabaseError(e.to_string()))
    }

    async fn exists_with_value(
        &self,
        item_type: &ItemType,
        field: &AttributeId,
        value: &FieldValue,
        excluding: Option<&ItemUid>,
    ) -> Result<bool, RepositoryError> {
        let store = self.lock()?;
        let exists = store
            .roots
            .iter()
            .filter(|(uid, root)| {
                !root.is_deleted && root.item_type == item_type.id && Some(*uid) != excluding
            })
            .filter_map(|(_, root)| root.current())
            .any(|snapshot| snapshot.value.get(field) == Some(value));
        Ok(exists)
    }

    async fn create(&self, item: &LibraryItem) -> Result<(), RepositoryError> {
        let mut store = self.lock()?;
        if store.roots.contains_key(item.uid()) {
            return Err(RepositoryError::UniqueViolation(format!(
                "library item {}",
                item.uid()
            )));
        }

        let root = Root {
            item_type: item.item_type().id.clone(),
            library: item.library().clone(),
            is_deleted: false,
            snapshots: vec![Snapshot {
                metadata: item.metadata().clone(),
                value: item.value().clone(),
            }],
        };
        store.roots.insert(item.uid().clone(), root);
        Ok(())
    }

    async fn save(
        &self,
        item: &LibraryItem,
        expected_current: &VersionedItemMetadata,
    ) -> Result<(), RepositoryError> {
        let mut store = self.lock()?;
        let root = store.current_mut(item.uid(), expected_current)?;

        root.close_current(item.metadata().start_date());
        root.snapshots.push(Snapshot {
            metadata: item.metadata().clone(),
            value: item.value().clone(),
        });
        Ok(())
    }

    async fn delete(
        &self,
        uid: &ItemUid,
        expected_current: &VersionedItemMetadata,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut store = self.lock()?;
        let root = store.current_mut(uid, expected_current)?;

        root.close_current(now);
        root.is_deleted = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use cmdr_common::{
        FieldValue,
        test_utils::{attribute, author, library, make_named_type, timestamp},
    };

    use super::*;

    fn named(name: &str) -> ItemValue {
        ItemValue::default().with(attribute("name"), FieldValue::Text(name.to_string()))
    }

    async fn stored_item(repository: &InMemoryRepository) -> LibraryItem {
        let item_type = Arc::new(make_named_type("objective"));
        let uid = repository.next_uid(&item_type).await.unwrap();
        let item = LibraryItem::create(
            uid,
            item_type,
            library("Sponsor", true),
            named("Objective"),
            author("a"),
            timestamp(0),
        )
        .unwrap();
        repository.create(&item).await.unwrap();
        item
    }

    #[tokio::test]
    async fn rejects_stale_write() {
        let repository = InMemoryRepository::with_libraries(vec![library("Sponsor", true)]);
        let item = stored_item(&repository).await;
        let stale = item.metadata().clone();

        let mut first = item.clone();
        first.approve(author("a"), None, timestamp(1)).unwrap();
        repository.save(&first, &stale).await.unwrap();

        let mut second = item.clone();
        second
            .edit_draft(author("b"), "late", named("Objective 2"), timestamp(2))
            .unwrap();
        let err = repository.save(&second, &stale).await.unwrap_err();
        assert_eq!(err, RepositoryError::ConcurrentModification(item.uid().clone()));

        let latest = repository
            .find_latest(item.item_type(), item.uid())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.metadata().status(), LibraryItemStatus::Final);
    }

    #[tokio::test]
    async fn closes_previous_snapshot_at_new_start() {
        let repository = InMemoryRepository::default();
        let item = stored_item(&repository).await;

        let mut approved = item.clone();
        approved.approve(author("a"), None, timestamp(5)).unwrap();
        repository.save(&approved, item.metadata()).await.unwrap();

        let history = repository.history(item.item_type(), item.uid()).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].metadata().end_date(), Some(timestamp(5)));
        assert!(history[0].metadata().is_current());
    }

    #[tokio::test]
    async fn deleted_item_is_invisible() {
        let repository = InMemoryRepository::default();
        let item = stored_item(&repository).await;

        repository
            .delete(item.uid(), item.metadata(), timestamp(3))
            .await
            .unwrap();

        assert!(repository.find_latest(item.item_type(), item.uid()).await.unwrap().is_none());
        assert!(repository.history(item.item_type(), item.uid()).await.unwrap().is_empty());
        let exists = repository
            .exists_with_value(
                item.item_type(),
                &attribute("name"),
                &FieldValue::Text("Objective".to_string()),
                None,
            )
            .await
            .unwrap();
        assert!(!exists);
    }

    #[tokio::test]
    async fn uids_count_per_item_type() {
        let repository = InMemoryRepository::default();
        let objective = make_named_type("objective");
        let compound = make_named_type("compound");

        assert_eq!(repository.next_uid(&objective).await.unwrap().as_ref(), "Objective_000001");
        assert_eq!(repository.next_uid(&objective).await.unwrap().as_ref(), "Objective_000002");
        assert_eq!(repository.next_uid(&compound).await.unwrap().as_ref(), "Compound_000001");
    }

    #[tokio::test]
    async fn count_ignores_paging() {
        let repository = InMemoryRepository::default();
        let item = stored_item(&repository).await;
        stored_item(&repository).await;
        stored_item(&repository).await;

        let query = ItemQuery::new().paginate(2, 2);
        let page = repository.find_all(item.item_type(), &query).await.unwrap();
        let total = repository.count(item.item_type(), &query).await.unwrap();

        assert_eq!(page.len(), 1);
        assert_eq!(total, 3);

        let finals = ItemQuery::new().with_status(LibraryItemStatus::Final);
        assert_eq!(repository.count(item.item_type(), &finals).await.unwrap(), 0);
    }
}
