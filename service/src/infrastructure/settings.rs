use std::env;

use anyhow::Context;
use cmdr_common::{Library, LibraryName, database::DatabaseSettings};
use config::{Config, Environment, File};
use dotenvy::dotenv;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server_port: String,
    pub schema_config_path: String,
    #[serde(default)]
    pub persistence: PersistenceSettings,
    /// required by `postgres` persistence
    pub database: Option<DatabaseSettings>,
    /// libraries known to `memory` persistence
    #[serde(default)]
    pub libraries: Vec<LibrarySettings>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersistenceSettings {
    #[serde(default)]
    pub kind: PersistenceKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceKind {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibrarySettings {
    pub name: String,
    #[serde(default = "editable_by_default")]
    pub is_editable: bool,
}

fn editable_by_default() -> bool {
    true
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        let run_mode = load_env("RUN_MODE", "development");

        let s = Config::builder()
            .add_source(File::with_name("./config/default"))
            .add_source(File::with_name(&format!("./config/{run_mode}")).required(false))
            .add_source(Environment::with_prefix("app").separator("__"))
            .build()?;

        s.try_deserialize().with_context(|| "failed to read config")
    }

    pub fn database(&self) -> anyhow::Result<&DatabaseSettings> {
        self.database
            .as_ref()
            .context("database settings are required for postgres persistence")
    }

    pub fn libraries(&self) -> anyhow::Result<Vec<Library>> {
        self.libraries
            .iter()
            .map(|library| {
                let name = LibraryName::try_new(library.name.as_str())
                    .with_context(|| format!("invalid library name '{}'", library.name))?;
                Ok(Library::new(name, library.is_editable))
            })
            .collect()
    }
}

fn load_env(key: &str, default_value: &'static str) -> String {
    env::var(key).unwrap_or_else(|_| default_value.into())
}

#[cfg(test)]
mod tests {
    use config::FileFormat;

    use super::*;

    fn parse(yaml: &str) -> Settings {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn memory_persistence_needs_no_database() {
        let settings = parse(
            r#"
server_port: "3000"
schema_config_path: ./config/item_types
persistence:
  kind: memory
libraries:
  - name: Sponsor
  - name: CDISC
    is_editable: false
"#,
        );

        assert_eq!(settings.persistence.kind, PersistenceKind::Memory);
        assert!(settings.database().is_err());
        let libraries = settings.libraries().unwrap();
        assert!(libraries[0].is_editable);
        assert!(!libraries[1].is_editable);
    }

    #[test]
    fn postgres_is_the_default_persistence() {
        let settings = parse(
            r#"
server_port: "3000"
schema_config_path: ./config/item_types
"#,
        );

        assert_eq!(settings.persistence.kind, PersistenceKind::Postgres);
    }
}
