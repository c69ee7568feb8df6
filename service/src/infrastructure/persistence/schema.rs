use std::borrow::Cow;

use cmdr_common::{
    AUTHOR_FIELD_NAME, CHANGE_DESCRIPTION_FIELD_NAME, END_DATE_FIELD_NAME, IS_DELETED_FIELD_NAME,
    IS_EDITABLE_FIELD_NAME, ITEM_ROOTS_TABLE_NAME, ITEM_TYPE_FIELD_NAME, ITEM_VERSIONS_TABLE_NAME,
    LIBRARIES_TABLE_NAME, LIBRARY_FIELD_NAME, LIBRARY_NAME_FIELD_NAME, MAJOR_VERSION_FIELD_NAME,
    MINOR_VERSION_FIELD_NAME, START_DATE_FIELD_NAME, STATUS_FIELD_NAME, UID_FIELD_NAME,
    VALUE_FIELD_NAME,
};

// Represents a table in database
#[derive(Debug, Clone)]
pub struct Table<'a> {
    pub schema: &'a str,
    pub name: &'a str,
    pub alias: &'static str,
}

impl<'a> Table<'a> {
    pub fn versions(schema: &'a str) -> Self {
        Self {
            schema,
            name: ITEM_VERSIONS_TABLE_NAME,
            alias: "v",
        }
    }

    pub fn roots(schema: &'a str) -> Self {
        Self {
            schema,
            name: ITEM_ROOTS_TABLE_NAME,
            alias: "r",
        }
    }

    pub fn libraries(schema: &'a str) -> Self {
        Self {
            schema,
            name: LIBRARIES_TABLE_NAME,
            alias: "l",
        }
    }

    /// Get qualified table name with alias
    pub fn qualified(&self) -> String {
        format!("\"{}\".\"{}\" AS \"{}\"", self.schema, self.name, self.alias)
    }
}

/// Represents one column in the database table
#[derive(Debug, Clone)]
pub struct Column {
    pub qualifier: &'static str,
    pub name: &'static str,
}

impl Column {
    /// Get qualified column name
    pub fn qualified(&self) -> String {
        format!("\"{}\".\"{}\"", self.qualifier, self.name)
    }
}

/// Column reference which can be either borrowed or owned
pub type ColumnRef<'a> = Cow<'a, Column>;

// Library item columns

pub const UID_COLUMN: Column = Column {
    qualifier: "r",
    name: UID_FIELD_NAME,
};
pub const ITEM_TYPE_COLUMN: Column = Column {
    qualifier: "r",
    name: ITEM_TYPE_FIELD_NAME,
};
pub const LIBRARY_COLUMN: Column = Column {
    qualifier: "r",
    name: LIBRARY_FIELD_NAME,
};
pub const IS_DELETED_COLUMN: Column = Column {
    qualifier: "r",
    name: IS_DELETED_FIELD_NAME,
};
pub const LIBRARY_NAME_COLUMN: Column = Column {
    qualifier: "l",
    name: LIBRARY_NAME_FIELD_NAME,
};
pub const IS_EDITABLE_COLUMN: Column = Column {
    qualifier: "l",
    name: IS_EDITABLE_FIELD_NAME,
};
pub const VERSION_UID_COLUMN: Column = Column {
    qualifier: "v",
    name: UID_FIELD_NAME,
};
pub const STATUS_COLUMN: Column = Column {
    qualifier: "v",
    name: STATUS_FIELD_NAME,
};
pub const MAJOR_VERSION_COLUMN: Column = Column {
    qualifier: "v",
    name: MAJOR_VERSION_FIELD_NAME,
};
pub const MINOR_VERSION_COLUMN: Column = Column {
    qualifier: "v",
    name: MINOR_VERSION_FIELD_NAME,
};
pub const START_DATE_COLUMN: Column = Column {
    qualifier: "v",
    name: START_DATE_FIELD_NAME,
};
pub const END_DATE_COLUMN: Column = Column {
    qualifier: "v",
    name: END_DATE_FIELD_NAME,
};
pub const AUTHOR_COLUMN: Column = Column {
    qualifier: "v",
    name: AUTHOR_FIELD_NAME,
};
pub const CHANGE_DESCRIPTION_COLUMN: Column = Column {
    qualifier: "v",
    name: CHANGE_DESCRIPTION_FIELD_NAME,
};
pub const VALUE_COLUMN: Column = Column {
    qualifier: "v",
    name: VALUE_FIELD_NAME,
};

/// Columns needed to restore a `LibraryItem`
pub fn item_columns() -> Vec<ColumnRef<'static>> {
    [
        &UID_COLUMN,
        &LIBRARY_COLUMN,
        &IS_DELETED_COLUMN,
        &IS_EDITABLE_COLUMN,
        &STATUS_COLUMN,
        &MAJOR_VERSION_COLUMN,
        &MINOR_VERSION_COLUMN,
        &START_DATE_COLUMN,
        &END_DATE_COLUMN,
        &AUTHOR_COLUMN,
        &CHANGE_DESCRIPTION_COLUMN,
        &VALUE_COLUMN,
    ]
    .into_iter()
    .map(Cow::Borrowed)
    .collect()
}
