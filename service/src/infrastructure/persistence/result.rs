use std::sync::Arc;

use chrono::{DateTime, Utc};
use cmdr_common::{
    AUTHOR_FIELD_NAME, AuthorId, CHANGE_DESCRIPTION_FIELD_NAME, END_DATE_FIELD_NAME,
    IS_DELETED_FIELD_NAME, IS_EDITABLE_FIELD_NAME, ItemType, ItemUid, ItemValue,
    LIBRARY_FIELD_NAME, Library, LibraryItem, LibraryItemStatus, LibraryName,
    MAJOR_VERSION_FIELD_NAME, MINOR_VERSION_FIELD_NAME, MetadataRecord, START_DATE_FIELD_NAME,
    STATUS_FIELD_NAME, UID_FIELD_NAME, VALUE_FIELD_NAME, VersionedItemMetadata,
};
use sqlx::{Row, postgres::PgRow, types::Json};

use crate::domain::repository::RepositoryError;

/// Restore a library item from a row selected with `schema::item_columns`
pub fn row_to_item(row: &PgRow, item_type: &Arc<ItemType>) -> Result<LibraryItem, RepositoryError> {
    let uid: String = get(row, UID_FIELD_NAME)?;
    let uid = ItemUid::try_new(uid).map_err(corrupted)?;

    let library_name: String = get(row, LIBRARY_FIELD_NAME)?;
    let library = Library::new(
        LibraryName::try_new(library_name).map_err(corrupted)?,
        get(row, IS_EDITABLE_FIELD_NAME)?,
    );

    let Json(value): Json<ItemValue> = get(row, VALUE_FIELD_NAME)?;
    let is_deleted: bool = get(row, IS_DELETED_FIELD_NAME)?;

    Ok(LibraryItem::from_repository_values(
        uid,
        item_type.clone(),
        library,
        value,
        row_to_metadata(row)?,
        is_deleted,
    ))
}

/// Restore the version metadata columns of a row
pub fn row_to_metadata(row: &PgRow) -> Result<VersionedItemMetadata, RepositoryError> {
    let status: String = get(row, STATUS_FIELD_NAME)?;
    let major_version: i32 = get(row, MAJOR_VERSION_FIELD_NAME)?;
    let minor_version: i32 = get(row, MINOR_VERSION_FIELD_NAME)?;
    let start_date: DateTime<Utc> = get(row, START_DATE_FIELD_NAME)?;
    let end_date: Option<DateTime<Utc>> = get(row, END_DATE_FIELD_NAME)?;
    let author_id: String = get(row, AUTHOR_FIELD_NAME)?;
    let change_description: String = get(row, CHANGE_DESCRIPTION_FIELD_NAME)?;

    let record = MetadataRecord {
        status: status.parse::<LibraryItemStatus>().map_err(corrupted)?,
        major_version: u32::try_from(major_version).map_err(corrupted)?,
        minor_version: u32::try_from(minor_version).map_err(corrupted)?,
        start_date,
        end_date,
        author_id: AuthorId::try_new(author_id).map_err(corrupted)?,
        change_description,
    };

    VersionedItemMetadata::from_repository_values(record).map_err(corrupted)
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column).map_err(|e| {
        RepositoryError::DatabaseError(format!("Failed to parse {}: {}", column, e))
    })
}

fn corrupted(error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::DatabaseError(format!("Stored library item is corrupted: {}", error))
}
