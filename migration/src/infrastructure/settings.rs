use std::env;

use anyhow::Context;
use cmdr_common::{Library, LibraryName, database::DatabaseSettings};
use config::{Config, Environment, File};
use dotenvy::dotenv;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    #[serde(default)]
    pub libraries: Vec<LibrarySettings>,
}

/// Library to create or update during migration
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
