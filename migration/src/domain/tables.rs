use std::fmt;

/// Represents table in a database, used for ddl generation
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub foreign_keys: Vec<ForeignKeyConstraint>,
    pub indexes: Vec<Index>,
}

/// Represents one column in the database table
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    pub not_null: bool,
    pub unique: bool,
    pub primary_key: bool,
    pub default_value: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Serial,
    Integer,
    Boolean,
    Text,
    Varchar(u32),
    TimestampTZ,
    Jsonb,
}

/// Represents foreign key constraint in the database table
pub struct ForeignKeyConstraint {
    pub table_name: String,
    pub column_name: String,
    pub referenced_table_name: String,
    pub referenced_column_name: String,
}

/// Represents an index in the database table
pub struct Index {
    pub table_name: String,
    pub columns: Vec<String>,
    pub unique: bool,
    /// `WHERE` clause of a partial index
    pub predicate: Option<String>,
}

impl Table {
    pub fn new(
        name: impl Into<String>,
        columns: Vec<Column>,
        foreign_keys: Vec<ForeignKeyConstraint>,
        indexes: Vec<Index>,
    ) -> Self {
        Self {
            name: name.into(),
            columns,
            foreign_keys,
            indexes,
        }
    }
}

impl Column {
    pub fn new(
        name: impl Into<String>,
        column_type: ColumnType,
        not_null: bool,
        unique: bool,
        default_value: Option<&str>,
    ) -> Self {
        Self {
            name: name.into(),
            column_type,
            not_null,
            unique,
            primary_key: false,
            default_value: default_value.map(String::from),
        }
    }

    pub fn primary_key(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            not_null: false,
            unique: false,
            primary_key: true,
            default_value: None,
        }
    }
}

impl ForeignKeyConstraint {
    pub fn new(
        table_name: impl Into<String>,
        column_name: impl Into<String>,
        referenced_table_name: impl Into<String>,
        referenced_column_name: impl Into<String>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            column_name: column_name.into(),
            referenced_table_name: referenced_table_name.into(),
            referenced_column_name: referenced_column_name.into(),
        }
    }
}

impl Index {
    pub fn new(table_name: impl Into<String>, columns: Vec<&str>, unique: bool) -> Self {
        Self {
            table_name: table_name.into(),
            columns: columns.into_iter().map(String::from).collect(),
            unique,
            predicate: None,
        }
    }

    pub fn partial(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Serial => write!(f, "SERIAL"),
            ColumnType::Integer => write!(f, "INTEGER"),
            ColumnType::Boolean => write!(f, "BOOLEAN"),
            ColumnType::Text => write!(f, "TEXT"),
            ColumnType::Varchar(size) => write!(f, "VARCHAR({})", size),
            ColumnType::TimestampTZ => write!(f, "TIMESTAMPTZ"),
            ColumnType::Jsonb => write!(f, "JSONB"),
        }
    }
}
