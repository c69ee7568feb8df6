use std::{borrow::Cow, sync::Arc};

use chrono::{DateTime, Utc};
use cmdr_common::{
    AttributeId, FieldValue, ITEM_ROOTS_TABLE_NAME, ITEM_VERSIONS_TABLE_NAME, ItemType, ItemUid,
    Library, LibraryItem, LibraryItemStatus, LibraryName,
    UID_COUNTERS_TABLE_NAME, Version, VersionedItemMetadata,
    database::{Database, qualified_table},
};
use sqlx::{
    Postgres, Row, Transaction,
    postgres::{PgArguments, PgRow},
    query::Query,
    types::Json,
};

use crate::{
    domain::repository::{
        LibraryItemRepository, RepositoryError, is_same_snapshot, query::ItemQuery,
    },
    infrastructure::persistence::{
        database_error,
        query::{Condition, ConditionValue, QueryBuilder, SortDirection, SqlParameter},
        result::{row_to_item, row_to_metadata},
        schema::{
            AUTHOR_COLUMN, CHANGE_DESCRIPTION_COLUMN, Column, END_DATE_COLUMN, IS_DELETED_COLUMN,
            IS_EDITABLE_COLUMN, ITEM_TYPE_COLUMN, LIBRARY_COLUMN, LIBRARY_NAME_COLUMN,
            MAJOR_VERSION_COLUMN, MINOR_VERSION_COLUMN, START_DATE_COLUMN, STATUS_COLUMN,
            Table, UID_COLUMN, VERSION_UID_COLUMN, item_columns,
        },
    },
};

/// Library items stored in the `cmdr_*` tables created by the migration tool
#[derive(Clone, Debug)]
pub struct PostgresLibraryItemRepository {
    database: Database,
}

impl PostgresLibraryItemRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    fn schema(&self) -> &str {
        self.database.database_schema()
    }

    async fn fetch_one(
        &self,
        item_type: &Arc<ItemType>,
        builder: QueryBuilder<'_>,
    ) -> Result<Option<LibraryItem>, RepositoryError> {
        let (sql, params) = builder.build();
        let row = bind(&sql, params)
            .fetch_optional(self.database.database_pool())
            .await
            .map_err(database_error)?;

        row.map(|row| row_to_item(&row, item_type)).transpose()
    }

    async fn fetch_all(
        &self,
        item_type: &Arc<ItemType>,
        builder: QueryBuilder<'_>,
    ) -> Result<Vec<LibraryItem>, RepositoryError> {
        let (sql, params) = builder.build();
        let rows = bind(&sql, params)
            .fetch_all(self.database.database_pool())
            .await
            .map_err(database_error)?;

        rows.iter().map(|row| row_to_item(row, item_type)).collect()
    }

    /// Lock the item root and compare its current snapshot with the one a change was based on
    async fn lock_current(
        &self,
        transaction: &mut Transaction<'_, Postgres>,
        uid: &ItemUid,
        expected_current: &VersionedItemMetadata,
    ) -> Result<(), RepositoryError> {
        let (sql, params) = root_lock_query(self.schema(), uid).build();
        let root = bind(&sql, params)
            .fetch_optional(&mut **transaction)
            .await
            .map_err(database_error)?;
        let is_deleted: bool = match root {
            Some(row) => row.try_get(0).map_err(database_error)?,
            None => return Err(RepositoryError::NotFound),
        };
        if is_deleted {
            return Err(RepositoryError::NotFound);
        }

        let (sql, params) = current_metadata_query(self.schema(), uid).build();
        let current = bind(&sql, params)
            .fetch_optional(&mut **transaction)
            .await
            .map_err(database_error)?
            .ok_or(RepositoryError::NotFound)?;

        if !is_same_snapshot(&row_to_metadata(&current)?, expected_current) {
            tracing::info!("Rejected stale write of library item {}", uid);
            return Err(RepositoryError::ConcurrentModification(uid.clone()));
        }
        Ok(())
    }

    async fn close_current(
        &self,
        transaction: &mut Transaction<'_, Postgres>,
        uid: &ItemUid,
        end_date: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let sql = close_current_sql(self.schema());
        sqlx::query(&sql)
            .bind(end_date)
            .bind(uid.to_string())
            .execute(&mut **transaction)
            .await
            .map_err(database_error)?;
        Ok(())
    }

    async fn insert_snapshot(
        &self,
        transaction: &mut Transaction<'_, Postgres>,
        item: &LibraryItem,
    ) -> Result<(), RepositoryError> {
        let sql = insert_snapshot_sql(self.schema());
        let metadata = item.metadata();
        sqlx::query(&sql)
            .bind(item.uid().to_string())
            .bind(metadata.status().as_str())
            .bind(to_integer(metadata.major_version())?)
            .bind(to_integer(metadata.minor_version())?)
            .bind(metadata.start_date())
            .bind(metadata.end_date())
            .bind(metadata.author_id().to_string())
            .bind(metadata.change_description().to_string())
            .bind(Json(item.value().clone()))
            .execute(&mut **transaction)
            .await
            .map_err(database_error)?;
        Ok(())
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, RepositoryError> {
        self.database
            .database_pool()
            .begin()
            .await
            .map_err(database_error)
    }
}

impl LibraryItemRepository for PostgresLibraryItemRepository {
    async fn find_library(&self, name: &LibraryName) -> Result<Option<Library>, RepositoryError> {
        let (sql, params) = library_query(self.schema(), name).build();
        let row = bind(&sql, params)
            .fetch_optional(self.database.database_pool())
            .await
            .map_err(database_error)?;

        row.map(|row| row_to_library(&row)).transpose()
    }

    async fn next_uid(&self, item_type: &ItemType) -> Result<ItemUid, RepositoryError> {
        let sql = next_uid_sql(self.schema());
        let (last_value,) = sqlx::query_as::<_, (i32,)>(&sql)
            .bind(item_type.id.to_string())
            .fetch_one(self.database.database_pool())
            .await
            .map_err(database_error)?;

        let sequence = u64::try_from(last_value)
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;
        ItemUid::generate(&item_type.info.uid_prefix, sequence)
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))
    }

    async fn find_latest(
        &self,
        item_type: &Arc<ItemType>,
        uid: &ItemUid,
    ) -> Result<Option<LibraryItem>, RepositoryError> {
        let builder = latest_query(self.schema(), item_type, uid);
        self.fetch_one(item_type, builder).await
    }

    async fn find_version(
        &self,
        item_type: &Arc<ItemType>,
        uid: &ItemUid,
        version: Version,
    ) -> Result<Option<LibraryItem>, RepositoryError> {
        let builder = version_query(self.schema(), item_type, uid, version)?;
        self.fetch_one(item_type, builder).await
    }

    async fn find_latest_with_status(
        &self,
        item_type: &Arc<ItemType>,
        uid: &ItemUid,
        status: LibraryItemStatus,
    ) -> Result<Option<LibraryItem>, RepositoryError> {
        let builder = status_query(self.schema(), item_type, uid, status);
        self.fetch_one(item_type, builder).await
    }

    async fn find_at(
        &self,
        item_type: &Arc<ItemType>,
        uid: &ItemUid,
        at: DateTime<Utc>,
    ) -> Result<Option<LibraryItem>, RepositoryError> {
        let builder = at_query(self.schema(), item_type, uid, at);
        self.fetch_one(item_type, builder).await
    }

    async fn history(
        &self,
        item_type: &Arc<ItemType>,
        uid: &ItemUid,
    ) -> Result<Vec<LibraryItem>, RepositoryError> {
        let builder = item_snapshots(self.schema(), item_type, uid)
            .order_by(Cow::Borrowed(&START_DATE_COLUMN), SortDirection::Descending);
        self.fetch_all(item_type, builder).await
    }

    async fn find_all(
        &self,
        item_type: &Arc<ItemType>,
        query: &ItemQuery,
    ) -> Result<Vec<LibraryItem>, RepositoryError> {
        let builder = listing_query(self.schema(), item_type, query)
            .limit(query.limit)
            .offset(query.offset);
        self.fetch_all(item_type, builder).await
    }

    async fn count(
        &self,
        item_type: &Arc<ItemType>,
        query: &ItemQuery,
    ) -> Result<i64, RepositoryError> {
        let (sql, params) = count_query(self.schema(), item_type, query);
        let row = bind(&sql, params)
            .fetch_one(self.database.database_pool())
            .await
            .map_err(database_error)?;
        row.try_get(0).map_err(database_error)
    }

    async fn exists_with_value(
        &self,
        item_type: &ItemType,
        field: &AttributeId,
        value: &FieldValue,
        excluding: Option<&ItemUid>,
    ) -> Result<bool, RepositoryError> {
        let sql = exists_with_value_sql(self.schema());
        let (exists,) = sqlx::query_as::<_, (bool,)>(&sql)
            .bind(item_type.id.to_string())
            .bind(field.to_string())
            .bind(Json(value.clone()))
            .bind(excluding.map(|uid| uid.to_string()))
            .fetch_one(self.database.database_pool())
            .await
            .map_err(database_error)?;
        Ok(exists)
    }

    async fn create(&self, item: &LibraryItem) -> Result<(), RepositoryError> {
        let mut transaction = self.begin().await?;

        let sql = insert_root_sql(self.schema());
        sqlx::query(&sql)
            .bind(item.uid().to_string())
            .bind(item.item_type().id.to_string())
            .bind(item.library().name.to_string())
            .execute(&mut *transaction)
            .await
            .map_err(database_error)?;
        self.insert_snapshot(&mut transaction, item).await?;

        transaction.commit().await.map_err(database_error)?;
        tracing::debug!("Created library item {}", item.uid());
        Ok(())
    }

    async fn save(
        &self,
        item: &LibraryItem,
        expected_current: &VersionedItemMetadata,
    ) -> Result<(), RepositoryError> {
        let mut transaction = self.begin().await?;

        self.lock_current(&mut transaction, item.uid(), expected_current)
            .await?;
        self.close_current(&mut transaction, item.uid(), item.metadata().start_date())
            .await?;
        self.insert_snapshot(&mut transaction, item).await?;

        transaction.commit().await.map_err(database_error)?;
        tracing::debug!(
            "Saved library item {} version {}",
            item.uid(),
            item.metadata().version()
        );
        Ok(())
    }

    async fn delete(
        &self,
        uid: &ItemUid,
        expected_current: &VersionedItemMetadata,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut transaction = self.begin().await?;

        self.lock_current(&mut transaction, uid, expected_current)
            .await?;
        self.close_current(&mut transaction, uid, now).await?;

        let sql = mark_deleted_sql(self.schema());
        sqlx::query(&sql)
            .bind(uid.to_string())
            .execute(&mut *transaction)
            .await
            .map_err(database_error)?;

        transaction.commit().await.map_err(database_error)?;
        tracing::debug!("Deleted library item {}", uid);
        Ok(())
    }
}

fn bind(sql: &str, params: Vec<SqlParameter>) -> Query<'_, Postgres, PgArguments> {
    tracing::debug!("{}", sql);
    params
        .into_iter()
        .fold(sqlx::query(sql), |query, param| param.bind_to_query(query))
}

/// Snapshots of visible items of one type, joined with their root and library
fn items_of_type<'a>(schema: &'a str, item_type: &ItemType) -> QueryBuilder<'a> {
    QueryBuilder::from(Table::versions(schema))
        .select(item_columns())
        .join(
            Table::roots(schema),
            Cow::Borrowed(&VERSION_UID_COLUMN),
            Cow::Borrowed(&UID_COLUMN),
        )
        .join(
            Table::libraries(schema),
            Cow::Borrowed(&LIBRARY_COLUMN),
            Cow::Borrowed(&LIBRARY_NAME_COLUMN),
        )
        .where_condition(Condition::Equals {
            column: Cow::Borrowed(&ITEM_TYPE_COLUMN),
            value: ConditionValue::Text(item_type.id.to_string()),
        })
        .where_condition(Condition::Equals {
            column: Cow::Borrowed(&IS_DELETED_COLUMN),
            value: ConditionValue::Boolean(false),
        })
}

/// Snapshots of one visible item
fn item_snapshots<'a>(schema: &'a str, item_type: &ItemType, uid: &ItemUid) -> QueryBuilder<'a> {
    items_of_type(schema, item_type).where_condition(uid_equals(&VERSION_UID_COLUMN, uid))
}

fn latest_query<'a>(schema: &'a str, item_type: &ItemType, uid: &ItemUid) -> QueryBuilder<'a> {
    item_snapshots(schema, item_type, uid).where_condition(Condition::IsNull {
        column: Cow::Borrowed(&END_DATE_COLUMN),
    })
}

fn version_query<'a>(
    schema: &'a str,
    item_type: &ItemType,
    uid: &ItemUid,
    version: Version,
) -> Result<QueryBuilder<'a>, RepositoryError> {
    Ok(item_snapshots(schema, item_type, uid)
        .where_condition(Condition::Equals {
            column: Cow::Borrowed(&MAJOR_VERSION_COLUMN),
            value: ConditionValue::Integer(to_integer(version.major)?),
        })
        .where_condition(Condition::Equals {
            column: Cow::Borrowed(&MINOR_VERSION_COLUMN),
            value: ConditionValue::Integer(to_integer(version.minor)?),
        })
        .order_by(Cow::Borrowed(&START_DATE_COLUMN), SortDirection::Descending)
        .limit(Some(1)))
}

fn status_query<'a>(
    schema: &'a str,
    item_type: &ItemType,
    uid: &ItemUid,
    status: LibraryItemStatus,
) -> QueryBuilder<'a> {
    item_snapshots(schema, item_type, uid)
        .where_condition(Condition::Equals {
            column: Cow::Borrowed(&STATUS_COLUMN),
            value: ConditionValue::Text(status.as_str().to_string()),
        })
        .order_by(Cow::Borrowed(&START_DATE_COLUMN), SortDirection::Descending)
        .limit(Some(1))
}

fn at_query<'a>(
    schema: &'a str,
    item_type: &ItemType,
    uid: &ItemUid,
    at: DateTime<Utc>,
) -> QueryBuilder<'a> {
    item_snapshots(schema, item_type, uid)
        .where_condition(Condition::LessThanOrEqual {
            column: Cow::Borrowed(&START_DATE_COLUMN),
            value: ConditionValue::Timestamp(at),
        })
        .where_condition(Condition::Or(
            Box::new(Condition::IsNull {
                column: Cow::Borrowed(&END_DATE_COLUMN),
            }),
            Box::new(Condition::GreaterThan {
                column: Cow::Borrowed(&END_DATE_COLUMN),
                value: ConditionValue::Timestamp(at),
            }),
        ))
        .order_by(Cow::Borrowed(&START_DATE_COLUMN), SortDirection::Descending)
        .limit(Some(1))
}

/// Newest matching snapshot per item, without paging
fn listing_query<'a>(schema: &'a str, item_type: &ItemType, query: &ItemQuery) -> QueryBuilder<'a> {
    let mut builder = items_of_type(schema, item_type)
        .distinct_on(vec![Cow::Borrowed(&VERSION_UID_COLUMN)])
        .order_by(Cow::Borrowed(&VERSION_UID_COLUMN), SortDirection::Ascending)
        .order_by(Cow::Borrowed(&START_DATE_COLUMN), SortDirection::Descending);

    match query.status {
        Some(status) => {
            builder = builder.where_condition(Condition::Equals {
                column: Cow::Borrowed(&STATUS_COLUMN),
                value: ConditionValue::Text(status.as_str().to_string()),
            });
        }
        None => {
            builder = builder.where_condition(Condition::IsNull {
                column: Cow::Borrowed(&END_DATE_COLUMN),
            });
        }
    }
    if let Some(library) = &query.library {
        builder = builder.where_condition(Condition::Equals {
            column: Cow::Borrowed(&LIBRARY_COLUMN),
            value: ConditionValue::Text(library.to_string()),
        });
    }
    builder
}

fn count_query(schema: &str, item_type: &ItemType, query: &ItemQuery) -> (String, Vec<SqlParameter>) {
    let (sql, params) = listing_query(schema, item_type, query).build();
    (
        format!("SELECT COUNT(*) FROM (\n{}\n) AS \"items\"", sql),
        params,
    )
}

fn library_query<'a>(schema: &'a str, name: &LibraryName) -> QueryBuilder<'a> {
    QueryBuilder::from(Table::libraries(schema))
        .select(vec![
            Cow::Borrowed(&LIBRARY_NAME_COLUMN),
            Cow::Borrowed(&IS_EDITABLE_COLUMN),
        ])
        .where_condition(Condition::Equals {
            column: Cow::Borrowed(&LIBRARY_NAME_COLUMN),
            value: ConditionValue::Text(name.to_string()),
        })
}

fn root_lock_query<'a>(schema: &'a str, uid: &ItemUid) -> QueryBuilder<'a> {
    QueryBuilder::from(Table::roots(schema))
        .select(vec![Cow::Borrowed(&IS_DELETED_COLUMN)])
        .where_condition(uid_equals(&UID_COLUMN, uid))
        .for_update()
}

fn current_metadata_query<'a>(schema: &'a str, uid: &ItemUid) -> QueryBuilder<'a> {
    QueryBuilder::from(Table::versions(schema))
        .select(
            [
                &STATUS_COLUMN,
                &MAJOR_VERSION_COLUMN,
                &MINOR_VERSION_COLUMN,
                &START_DATE_COLUMN,
                &END_DATE_COLUMN,
                &AUTHOR_COLUMN,
                &CHANGE_DESCRIPTION_COLUMN,
            ]
            .into_iter()
            .map(Cow::Borrowed)
            .collect(),
        )
        .where_condition(uid_equals(&VERSION_UID_COLUMN, uid))
        .where_condition(Condition::IsNull {
            column: Cow::Borrowed(&END_DATE_COLUMN),
        })
}

fn next_uid_sql(schema: &str) -> String {
    format!(
        "INSERT INTO {} AS c (\"item_type\", \"last_value\") VALUES ($1, 1) ON CONFLICT (\"item_type\") DO UPDATE SET \"last_value\" = c.\"last_value\" + 1 RETURNING \"last_value\"",
        qualified_table(schema, UID_COUNTERS_TABLE_NAME)
    )
}

fn exists_with_value_sql(schema: &str) -> String {
    format!(
        "SELECT EXISTS (SELECT 1 FROM {} AS \"v\" INNER JOIN {} AS \"r\" ON \"v\".\"uid\" = \"r\".\"uid\" WHERE \"r\".\"item_type\" = $1 AND \"r\".\"is_deleted\" = FALSE AND \"v\".\"end_date\" IS NULL AND \"v\".\"value\" -> 'fields' -> $2 = $3 AND \"r\".\"uid\" IS DISTINCT FROM $4)",
        qualified_table(schema, ITEM_VERSIONS_TABLE_NAME),
        qualified_table(schema, ITEM_ROOTS_TABLE_NAME),
    )
}

fn insert_root_sql(schema: &str) -> String {
    format!(
        "INSERT INTO {} (\"uid\", \"item_type\", \"library_name\", \"is_deleted\") VALUES ($1, $2, $3, FALSE)",
        qualified_table(schema, ITEM_ROOTS_TABLE_NAME)
    )
}

fn insert_snapshot_sql(schema: &str) -> String {
    format!(
        "INSERT INTO {} (\"uid\", \"status\", \"major_version\", \"minor_version\", \"start_date\", \"end_date\", \"author_id\", \"change_description\", \"value\") VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        qualified_table(schema, ITEM_VERSIONS_TABLE_NAME)
    )
}

fn close_current_sql(schema: &str) -> String {
    format!(
        "UPDATE {} SET \"end_date\" = $1 WHERE \"uid\" = $2 AND \"end_date\" IS NULL",
        qualified_table(schema, ITEM_VERSIONS_TABLE_NAME)
    )
}

fn mark_deleted_sql(schema: &str) -> String {
    format!(
        "UPDATE {} SET \"is_deleted\" = TRUE WHERE \"uid\" = $1",
        qualified_table(schema, ITEM_ROOTS_TABLE_NAME)
    )
}

fn uid_equals(column: &'static Column, uid: &ItemUid) -> Condition<'static> {
    Condition::Equals {
        column: Cow::Borrowed(column),
        value: ConditionValue::Text(uid.to_string()),
    }
}

fn row_to_library(row: &PgRow) -> Result<Library, RepositoryError> {
    let name: String = row.try_get(0).map_err(database_error)?;
    let is_editable: bool = row.try_get(1).map_err(database_error)?;
    let name = LibraryName::try_new(name)
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;
    Ok(Library::new(name, is_editable))
}

fn to_integer(value: u32) -> Result<i32, RepositoryError> {
    i32::try_from(value).map_err(|e| RepositoryError::DatabaseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use cmdr_common::test_utils::{make_named_type, timestamp};

    use super::*;

    fn compound() -> ItemType {
        make_named_type("compound")
    }

    fn uid() -> ItemUid {
        ItemUid::try_new("Compound_000001").unwrap()
    }

    #[test]
    fn latest_snapshot_of_visible_item() {
        let (sql, params) = latest_query("cmdr", &compound(), &uid()).build();

        assert!(sql.starts_with("SELECT \"r\".\"uid\", "));
        assert!(sql.contains("\nFROM \"cmdr\".\"cmdr_item_versions\" AS \"v\""));
        assert!(sql.contains(
            "\nINNER JOIN \"cmdr\".\"cmdr_item_roots\" AS \"r\" ON \"v\".\"uid\" = \"r\".\"uid\""
        ));
        assert!(sql.contains(
            "\nINNER JOIN \"cmdr\".\"cmdr_libraries\" AS \"l\" ON \"r\".\"library_name\" = \"l\".\"name\""
        ));
        assert!(sql.ends_with(
            "\nWHERE \"r\".\"item_type\" = $1 AND \"r\".\"is_deleted\" = $2 AND \"v\".\"uid\" = $3 AND \"v\".\"end_date\" IS NULL"
        ));
        assert_eq!(
            params,
            vec![
                SqlParameter::Text("compound".to_string()),
                SqlParameter::Boolean(false),
                SqlParameter::Text("Compound_000001".to_string()),
            ]
        );
    }

    #[test]
    fn version_lookup_takes_newest_matching_snapshot() {
        let (sql, params) = version_query("cmdr", &compound(), &uid(), Version::new(1, 0))
            .unwrap()
            .build();

        assert!(sql.contains("\"v\".\"major_version\" = $4 AND \"v\".\"minor_version\" = $5"));
        assert!(sql.ends_with("\nORDER BY \"v\".\"start_date\" DESC\nLIMIT 1"));
        assert_eq!(params[3..], [SqlParameter::Integer(1), SqlParameter::Integer(0)]);
    }

    #[test]
    fn status_lookup_takes_newest_matching_snapshot() {
        let (sql, params) =
            status_query("cmdr", &compound(), &uid(), LibraryItemStatus::Final).build();

        assert!(sql.contains("\"v\".\"status\" = $4"));
        assert!(sql.ends_with("\nORDER BY \"v\".\"start_date\" DESC\nLIMIT 1"));
        assert_eq!(params[3], SqlParameter::Text("Final".to_string()));
    }

    #[test]
    fn instant_lookup_matches_half_open_validity() {
        let at = timestamp(10);
        let (sql, params) = at_query("cmdr", &compound(), &uid(), at).build();

        assert!(sql.contains(
            "\"v\".\"start_date\" <= $4 AND (\"v\".\"end_date\" IS NULL OR \"v\".\"end_date\" > $5)"
        ));
        assert_eq!(
            params[3..],
            [SqlParameter::Timestamp(at), SqlParameter::Timestamp(at)]
        );
    }

    #[test]
    fn listing_keeps_one_row_per_item() {
        let query = ItemQuery::new()
            .with_status(LibraryItemStatus::Final)
            .with_library(LibraryName::try_new("Sponsor").unwrap())
            .paginate(2, 10);
        let (sql, params) = listing_query("cmdr", &compound(), &query)
            .limit(query.limit)
            .offset(query.offset)
            .build();

        assert!(sql.starts_with("SELECT DISTINCT ON (\"v\".\"uid\") "));
        assert!(sql.contains(
            "\"r\".\"is_deleted\" = $2 AND \"v\".\"status\" = $3 AND \"r\".\"library_name\" = $4"
        ));
        assert!(!sql.contains("IS NULL"));
        assert!(sql.ends_with(
            "\nORDER BY \"v\".\"uid\" ASC, \"v\".\"start_date\" DESC\nLIMIT 10\nOFFSET 10"
        ));
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn listing_without_status_reads_current_snapshots() {
        let (sql, params) = listing_query("cmdr", &compound(), &ItemQuery::new()).build();

        assert!(sql.contains("\"r\".\"is_deleted\" = $2 AND \"v\".\"end_date\" IS NULL"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn count_wraps_listing_without_paging() {
        let query = ItemQuery::new()
            .with_status(LibraryItemStatus::Draft)
            .paginate(3, 5);
        let (sql, params) = count_query("cmdr", &compound(), &query);

        assert!(sql.starts_with("SELECT COUNT(*) FROM (\nSELECT DISTINCT ON (\"v\".\"uid\") "));
        assert!(sql.ends_with("\n) AS \"items\""));
        assert!(!sql.contains("LIMIT"));
        assert!(!sql.contains("OFFSET"));
        assert_eq!(params[2], SqlParameter::Text("Draft".to_string()));
    }

    #[test]
    fn library_lookup() {
        let name = LibraryName::try_new("CDISC").unwrap();
        let (sql, params) = library_query("cmdr", &name).build();

        assert_eq!(
            sql,
            "SELECT \"l\".\"name\", \"l\".\"is_editable\"\nFROM \"cmdr\".\"cmdr_libraries\" AS \"l\"\nWHERE \"l\".\"name\" = $1"
        );
        assert_eq!(params, vec![SqlParameter::Text("CDISC".to_string())]);
    }

    #[test]
    fn stale_write_check_locks_root_then_reads_current() {
        let (lock, _) = root_lock_query("cmdr", &uid()).build();
        assert_eq!(
            lock,
            "SELECT \"r\".\"is_deleted\"\nFROM \"cmdr\".\"cmdr_item_roots\" AS \"r\"\nWHERE \"r\".\"uid\" = $1\nFOR UPDATE"
        );

        let (current, params) = current_metadata_query("cmdr", &uid()).build();
        assert!(current.starts_with("SELECT \"v\".\"status\", \"v\".\"major_version\""));
        assert!(current.ends_with("WHERE \"v\".\"uid\" = $1 AND \"v\".\"end_date\" IS NULL"));
        assert_eq!(params, vec![SqlParameter::Text("Compound_000001".to_string())]);
    }

    #[test]
    fn write_statements_target_schema_tables() {
        assert!(next_uid_sql("cmdr").starts_with("INSERT INTO \"cmdr\".\"cmdr_uid_counters\" AS c"));
        assert!(next_uid_sql("cmdr").ends_with("RETURNING \"last_value\""));
        assert!(insert_root_sql("cmdr").starts_with("INSERT INTO \"cmdr\".\"cmdr_item_roots\" "));
        assert!(insert_snapshot_sql("cmdr").contains("VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"));
        assert_eq!(
            close_current_sql("cmdr"),
            "UPDATE \"cmdr\".\"cmdr_item_versions\" SET \"end_date\" = $1 WHERE \"uid\" = $2 AND \"end_date\" IS NULL"
        );
        assert_eq!(
            mark_deleted_sql("cmdr"),
            "UPDATE \"cmdr\".\"cmdr_item_roots\" SET \"is_deleted\" = TRUE WHERE \"uid\" = $1"
        );
        assert!(exists_with_value_sql("cmdr").contains(
            "FROM \"cmdr\".\"cmdr_item_versions\" AS \"v\" INNER JOIN \"cmdr\".\"cmdr_item_roots\" AS \"r\""
        ));
    }

    #[test]
    fn versions_beyond_integer_range_are_rejected() {
        assert!(to_integer(u32::MAX).is_err());
        assert_eq!(to_integer(7), Ok(7));
    }
}
