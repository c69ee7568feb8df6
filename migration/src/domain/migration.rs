use std::collections::HashSet;

use cmdr_common::{
    IS_EDITABLE_FIELD_NAME, LIBRARIES_TABLE_NAME, LIBRARY_NAME_FIELD_NAME, Library,
};

use crate::domain::{
    library_item_tables,
    persistence::Persistence,
    tables::{Column, ForeignKeyConstraint, Index, Table},
};

/// Named group of statements applied in a single transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStep {
    ctx: &'static str,
    ddls: Vec<String>,
}

impl MigrationStep {
    fn create_table(database_schema: &str, table: &Table) -> Self {
        Self {
            ctx: "CREATE TABLE",
            ddls: create_table_ddl(database_schema, table),
        }
    }

    fn seed_libraries(database_schema: &str, libraries: &[Library]) -> Self {
        Self {
            ctx: "SEED LIBRARIES",
            ddls: libraries
                .iter()
                .map(|library| upsert_library_sql(database_schema, library))
                .collect(),
        }
    }

    pub fn ctx(&self) -> &'static str {
        self.ctx
    }

    pub fn ddls(self) -> Vec<String> {
        self.ddls
    }
}

/// Create the missing tables, then upsert the configured libraries.
pub async fn migrate(
    persistence: &impl Persistence,
    libraries: &[Library],
) -> Result<(), anyhow::Error> {
    let actual_schema = persistence.load().await?;
    let steps = migration_steps(persistence.database_schema(), &actual_schema, libraries);

    tracing::info!("{} migration steps to apply", steps.len());
    persistence.apply_migration_steps(steps).await
}

pub fn migration_steps(
    database_schema: &str,
    actual_schema: &HashSet<String>,
    libraries: &[Library],
) -> Vec<MigrationStep> {
    let mut result = Vec::new();

    for table in library_item_tables() {
        if actual_schema.contains(&table.name) {
            tracing::debug!("Table {} already exists", table.name);
        } else {
            result.push(MigrationStep::create_table(database_schema, &table));
        }
    }

    if !libraries.is_empty() {
        result.push(MigrationStep::seed_libraries(database_schema, libraries));
    }

    result
}

fn create_table_ddl(schema: &str, table: &Table) -> Vec<String> {
    let mut columns = Vec::new();
    let mut pk_columns = Vec::new();

    for column in table.columns.iter() {
        columns.push(column_ddl(column));
        if column.primary_key {
            pk_columns.push(format!("\"{}\"", column.name));
        }
    }

    let columns_sql = columns.join(",\n    ");
    let pk_columns_sql = pk_columns.join(", ");

    let table_ddl = format!(
        "CREATE TABLE \"{}\".\"{}\" (\n    {},\n    PRIMARY KEY({})\n)",
        schema, table.name, columns_sql, pk_columns_sql
    );

    let mut ddls = vec![table_ddl];

    for fk in table.foreign_keys.iter() {
        ddls.push(create_fk_ddl(schema, fk));
    }

    for index in table.indexes.iter() {
        ddls.push(create_index_ddl(schema, index));
    }

    ddls
}

fn column_ddl(column: &Column) -> String {
    let mut sql = format!("\"{}\" {}", column.name, column.column_type);
    if column.not_null {
        sql.push_str(" NOT NULL");
    }
    if let Some(default_value) = &column.default_value {
        sql.push_str(format!(" DEFAULT {}", default_value).as_str());
    }
    if column.unique {
        sql.push_str(" UNIQUE");
    }
    sql
}

fn create_fk_ddl(schema: &str, fk: &ForeignKeyConstraint) -> String {
    format!(
        "ALTER TABLE \"{}\".\"{}\" ADD CONSTRAINT \"{}_{}_fkey\" FOREIGN KEY (\"{}\") REFERENCES \"{}\".\"{}\" (\"{}\")",
        schema,
        fk.table_name,
        fk.table_name,
        fk.column_name,
        fk.column_name,
        schema,
        fk.referenced_table_name,
        fk.referenced_column_name
    )
}

fn create_index_ddl(schema: &str, index: &Index) -> String {
    let columns_sql = index
        .columns
        .iter()
        .map(|column| format!("\"{}\"", column))
        .collect::<Vec<_>>()
        .join(", ");
    let mut sql = format!(
        "CREATE {}INDEX \"{}_{}_{}\" ON \"{}\".\"{}\" ({})",
        if index.unique { "UNIQUE " } else { "" },
        index.table_name,
        index.columns.join("_"),
        if index.predicate.is_some() { "current_idx" } else { "idx" },
        schema,
        index.table_name,
        columns_sql
    );
    if let Some(predicate) = &index.predicate {
        sql.push_str(format!(" WHERE {}", predicate).as_str());
    }
    sql
}

fn upsert_library_sql(schema: &str, library: &Library) -> String {
    format!(
        "INSERT INTO \"{schema}\".\"{table}\" (\"{name}\", \"{editable}\") VALUES ('{value}', {is_editable}) \
         ON CONFLICT (\"{name}\") DO UPDATE SET \"{editable}\" = EXCLUDED.\"{editable}\"",
        schema = schema,
        table = LIBRARIES_TABLE_NAME,
        name = LIBRARY_NAME_FIELD_NAME,
        editable = IS_EDITABLE_FIELD_NAME,
        value = library.name.as_ref().replace('\'', "''"),
        is_editable = library.is_editable,
    )
}

#[cfg(test)]
mod tests {
    use cmdr_common::test_utils::library;

    use super::*;
    use crate::domain::tables::ColumnType;

    #[test]
    fn creates_only_missing_tables() {
        let actual = HashSet::from(["cmdr_libraries".to_string(), "cmdr_item_roots".to_string()]);
        let steps = migration_steps("public", &actual, &[]);

        assert_eq!(steps.len(), 2);
        assert!(steps.iter().all(|s| s.ctx() == "CREATE TABLE"));
        let first = steps[0].clone().ddls();
        assert!(first[0].starts_with("CREATE TABLE \"public\".\"cmdr_item_versions\""));
    }

    #[test]
    fn seeds_configured_libraries_last() {
        let libraries = vec![library("Sponsor", true), library("O'Brien", false)];
        let steps = migration_steps("public", &HashSet::new(), &libraries);

        let seed = steps.last().unwrap().clone();
        assert_eq!(seed.ctx(), "SEED LIBRARIES");
        let sql = seed.ddls();
        assert_eq!(sql.len(), 2);
        assert!(sql[0].contains("VALUES ('Sponsor', true)"));
        assert!(sql[1].contains("VALUES ('O''Brien', false)"));
        assert!(sql[1].contains("ON CONFLICT (\"name\")"));
    }

    #[test]
    fn generates_table_ddl() {
        let table = Table::new(
            "cmdr_item_versions",
            vec![
                Column::primary_key("id", ColumnType::Serial),
                Column::new("uid", ColumnType::Varchar(64), true, false, None),
                Column::new("is_deleted", ColumnType::Boolean, true, false, Some("false")),
            ],
            vec![ForeignKeyConstraint::new(
                "cmdr_item_versions",
                "uid",
                "cmdr_item_roots",
                "uid",
            )],
            vec![Index::new("cmdr_item_versions", vec!["uid"], true).partial("\"end_date\" IS NULL")],
        );

        let ddls = create_table_ddl("cmdr", &table);
        assert_eq!(
            ddls[0],
            "CREATE TABLE \"cmdr\".\"cmdr_item_versions\" (\n    \"id\" SERIAL,\n    \"uid\" VARCHAR(64) NOT NULL,\n    \"is_deleted\" BOOLEAN NOT NULL DEFAULT false,\n    PRIMARY KEY(\"id\")\n)"
        );
        assert_eq!(
            ddls[1],
            "ALTER TABLE \"cmdr\".\"cmdr_item_versions\" ADD CONSTRAINT \"cmdr_item_versions_uid_fkey\" FOREIGN KEY (\"uid\") REFERENCES \"cmdr\".\"cmdr_item_roots\" (\"uid\")"
        );
        assert_eq!(
            ddls[2],
            "CREATE UNIQUE INDEX \"cmdr_item_versions_uid_current_idx\" ON \"cmdr\".\"cmdr_item_versions\" (\"uid\") WHERE \"end_date\" IS NULL"
        );
    }
}
