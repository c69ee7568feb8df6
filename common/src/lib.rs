mod domain;
mod infrastructure;

pub mod test_utils;

// Persisted library field names

pub const LIBRARY_NAME_FIELD_NAME: &str = "name";
pub const IS_EDITABLE_FIELD_NAME: &str = "is_editable";

// Persisted library item field names

pub const ID_FIELD_NAME: &str = "id";

pub const UID_FIELD_NAME: &str = "uid";
pub const ITEM_TYPE_FIELD_NAME: &str = "item_type";
pub const LIBRARY_FIELD_NAME: &str = "library_name";
pub const IS_DELETED_FIELD_NAME: &str = "is_deleted";

pub const STATUS_FIELD_NAME: &str = "status";
pub const MAJOR_VERSION_FIELD_NAME: &str = "major_version";
pub const MINOR_VERSION_FIELD_NAME: &str = "minor_version";
pub const START_DATE_FIELD_NAME: &str = "start_date";
pub const END_DATE_FIELD_NAME: &str = "end_date";
pub const AUTHOR_FIELD_NAME: &str = "author_id";
pub const CHANGE_DESCRIPTION_FIELD_NAME: &str = "change_description";
pub const VALUE_FIELD_NAME: &str = "value";

// Persisted table names

pub const LIBRARIES_TABLE_NAME: &str = "cmdr_libraries";
pub const ITEM_ROOTS_TABLE_NAME: &str = "cmdr_item_roots";
pub const ITEM_VERSIONS_TABLE_NAME: &str = "cmdr_item_versions";
pub const UID_COUNTERS_TABLE_NAME: &str = "cmdr_uid_counters";

pub const LAST_VALUE_FIELD_NAME: &str = "last_value";

// expose domain module

pub use domain::*;
pub use infrastructure::item_types::ItemTypesRegistryAdapter;

// expose database module

pub use infrastructure::database;
