use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use sqlx::{
    Executor, PgPool,
    postgres::{PgConnectOptions, PgPoolOptions, PgSslMode},
};

/// Postgres pool plus the schema holding the library item tables.
#[derive(Clone, Debug)]
pub struct Database {
    database_pool: PgPool,
    database_schema: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub db: String,
    pub schema: String,
    pub credentials: DatabaseCredentials,
    pub connection: DatabaseConnection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConnection {
    pub min_connections: u32,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseCredentials {
    pub username: String,
    pub password: String,
}

fn default_port() -> u16 {
    5432
}

pub async fn connect(settings: &DatabaseSettings) -> Result<Database, anyhow::Error> {
    Database::new(settings).await
}

impl Database {
    async fn new(settings: &DatabaseSettings) -> Result<Self, anyhow::Error> {
        let credentials = &settings.credentials;
        let pg_connect_options = PgConnectOptions::new()
            .host(&settings.host)
            .port(settings.port)
            .username(&credentials.username)
            .password(&credentials.password)
            .database(&settings.db)
            .ssl_mode(PgSslMode::Prefer);

        let connection = &settings.connection;
        let pool = PgPoolOptions::new()
            .min_connections(connection.min_connections)
            .max_connections(connection.max_connections)
            .acquire_timeout(Duration::from_secs(connection.acquire_timeout_seconds))
            .connect_with(pg_connect_options)
            .await
            .with_context(|| {
                format!(
                    "failed to open database at {}:{}/{}",
                    settings.host, settings.port, settings.db
                )
            })?;

        tracing::info!(
            "Connected to database {}/{} (schema {})",
            settings.host,
            settings.db,
            settings.schema
        );

        Ok(Self {
            database_pool: pool,
            database_schema: settings.schema.to_owned(),
        })
    }

    /// Run the statements in one transaction, all or nothing.
    pub async fn execute_in_transaction(
        &self,
        queries: Vec<String>,
        ctx: &'static str,
    ) -> Result<(), anyhow::Error> {
        let mut transaction = self
            .database_pool
            .begin()
            .await
            .with_context(|| format!("failed to start {} transaction", ctx))?;

        tracing::info!("{}: {} statements", ctx, queries.len());

        for sql in queries {
            tracing::debug!("{}", sql);

            transaction
                .execute(sqlx::query(&sql))
                .await
                .with_context(|| format!("failed to execute {} query", ctx))?;
        }

        transaction
            .commit()
            .await
            .with_context(|| format!("failed to commit {} transaction", ctx))?;

        Ok(())
    }

    pub fn database_pool(&self) -> &PgPool {
        &self.database_pool
    }

    pub fn database_schema(&self) -> &str {
        &self.database_schema
    }

    /// Schema-qualified table name
    pub fn table(&self, table_name: &str) -> String {
        qualified_table(&self.database_schema, table_name)
    }
}

pub fn qualified_table(schema: &str, table_name: &str) -> String {
    format!("\"{}\".\"{}\"", schema, table_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualifies_table_with_schema() {
        assert_eq!(
            qualified_table("public", "cmdr_item_roots"),
            "\"public\".\"cmdr_item_roots\""
        );
    }

    #[test]
    fn settings_default_to_standard_port() {
        let settings: DatabaseSettings = serde_json::from_value(serde_json::json!({
            "host": "localhost",
            "db": "cmdr",
            "schema": "public",
            "credentials": { "username": "cmdr", "password": "secret" },
            "connection": { "min_connections": 1, "max_connections": 5, "acquire_timeout_seconds": 3 }
        }))
        .unwrap();
        assert_eq!(settings.port, 5432);
    }
}
