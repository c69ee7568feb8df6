use cmdr_common::{
    AUTHOR_FIELD_NAME, CHANGE_DESCRIPTION_FIELD_NAME, END_DATE_FIELD_NAME, ID_FIELD_NAME,
    IS_DELETED_FIELD_NAME, IS_EDITABLE_FIELD_NAME, ITEM_ROOTS_TABLE_NAME, ITEM_TYPE_FIELD_NAME,
    ITEM_VERSIONS_TABLE_NAME, LAST_VALUE_FIELD_NAME, LIBRARIES_TABLE_NAME, LIBRARY_FIELD_NAME,
    LIBRARY_NAME_FIELD_NAME, MAJOR_VERSION_FIELD_NAME, MINOR_VERSION_FIELD_NAME,
    START_DATE_FIELD_NAME, STATUS_FIELD_NAME, UID_COUNTERS_TABLE_NAME, UID_FIELD_NAME,
    VALUE_FIELD_NAME,
};

use crate::domain::tables::{Column, ColumnType, ForeignKeyConstraint, Index, Table};

pub mod migration;
pub mod persistence;
pub mod tables;

/// Tables holding libraries and versioned library items, in dependency order.
pub fn library_item_tables() -> Vec<Table> {
    vec![
        libraries_table(),
        item_roots_table(),
        item_versions_table(),
        uid_counters_table(),
    ]
}

fn libraries_table() -> Table {
    let columns = vec![
        Column::primary_key(LIBRARY_NAME_FIELD_NAME, ColumnType::Varchar(100)),
        Column::new(
            IS_EDITABLE_FIELD_NAME,
            ColumnType::Boolean,
            true,
            false,
            Some("true"),
        ),
    ];
    Table::new(LIBRARIES_TABLE_NAME, columns, Vec::new(), Vec::new())
}

fn item_roots_table() -> Table {
    let columns = vec![
        Column::primary_key(UID_FIELD_NAME, ColumnType::Varchar(64)),
        Column::new(ITEM_TYPE_FIELD_NAME, ColumnType::Varchar(40), true, false, None),
        Column::new(LIBRARY_FIELD_NAME, ColumnType::Varchar(100), true, false, None),
        Column::new(
            IS_DELETED_FIELD_NAME,
            ColumnType::Boolean,
            true,
            false,
            Some("false"),
        ),
    ];
    let foreign_keys = vec![ForeignKeyConstraint::new(
        ITEM_ROOTS_TABLE_NAME,
        LIBRARY_FIELD_NAME,
        LIBRARIES_TABLE_NAME,
        LIBRARY_NAME_FIELD_NAME,
    )];
    let indexes = vec![
        Index::new(ITEM_ROOTS_TABLE_NAME, vec![ITEM_TYPE_FIELD_NAME], false),
        Index::new(ITEM_ROOTS_TABLE_NAME, vec![LIBRARY_FIELD_NAME], false),
    ];
    Table::new(ITEM_ROOTS_TABLE_NAME, columns, foreign_keys, indexes)
}

fn item_versions_table() -> Table {
    let columns = vec![
        Column::primary_key(ID_FIELD_NAME, ColumnType::Serial),
        Column::new(UID_FIELD_NAME, ColumnType::Varchar(64), true, false, None),
        Column::new(STATUS_FIELD_NAME, ColumnType::Varchar(16), true, false, None),
        Column::new(MAJOR_VERSION_FIELD_NAME, ColumnType::Integer, true, false, None),
        Column::new(MINOR_VERSION_FIELD_NAME, ColumnType::Integer, true, false, None),
        Column::new(START_DATE_FIELD_NAME, ColumnType::TimestampTZ, true, false, None),
        Column::new(END_DATE_FIELD_NAME, ColumnType::TimestampTZ, false, false, None),
        Column::new(AUTHOR_FIELD_NAME, ColumnType::Varchar(255), true, false, None),
        Column::new(
            CHANGE_DESCRIPTION_FIELD_NAME,
            ColumnType::Text,
            true,
            false,
            None,
        ),
        Column::new(VALUE_FIELD_NAME, ColumnType::Jsonb, true, false, None),
    ];
    let foreign_keys = vec![ForeignKeyConstraint::new(
        ITEM_VERSIONS_TABLE_NAME,
        UID_FIELD_NAME,
        ITEM_ROOTS_TABLE_NAME,
        UID_FIELD_NAME,
    )];
    let indexes = vec![
        Index::new(
            ITEM_VERSIONS_TABLE_NAME,
            vec![UID_FIELD_NAME, START_DATE_FIELD_NAME],
            false,
        ),
        // at most one current snapshot per item
        Index::new(ITEM_VERSIONS_TABLE_NAME, vec![UID_FIELD_NAME], true)
            .partial(format!("\"{}\" IS NULL", END_DATE_FIELD_NAME)),
    ];
    Table::new(ITEM_VERSIONS_TABLE_NAME, columns, foreign_keys, indexes)
}

fn uid_counters_table() -> Table {
    let columns = vec![
        Column::primary_key(ITEM_TYPE_FIELD_NAME, ColumnType::Varchar(40)),
        Column::new(LAST_VALUE_FIELD_NAME, ColumnType::Integer, true, false, Some("0")),
    ];
    Table::new(UID_COUNTERS_TABLE_NAME, columns, Vec::new(), Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_are_ordered_by_dependency() {
        let names: Vec<String> = library_item_tables().into_iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec![
                "cmdr_libraries",
                "cmdr_item_roots",
                "cmdr_item_versions",
                "cmdr_uid_counters"
            ]
        );
    }

    #[test]
    fn versions_reference_roots() {
        let versions = item_versions_table();
        let fk = &versions.foreign_keys[0];
        assert_eq!(fk.column_name, "uid");
        assert_eq!(fk.referenced_table_name, "cmdr_item_roots");
        assert!(versions.indexes.iter().any(|i| i.unique && i.predicate.is_some()));
    }
}
