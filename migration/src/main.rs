use cmdr_common::database;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    domain::migration::migrate,
    infrastructure::{persistence::PersistenceAdapter, settings::Settings},
};

pub mod domain;
pub mod infrastructure;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env()?;
    let libraries = settings.libraries()?;
    tracing::info!("Configuration loaded");

    let database = database::connect(&settings.database).await?;
    let persistence = PersistenceAdapter::new(database);

    // create library item tables and seed the configured libraries
    migrate(&persistence, &libraries).await?;
    tracing::info!("Database migrated");

    Ok(())
}
