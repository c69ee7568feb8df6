use std::sync::Arc;

use cmdr_common::{ItemTypesRegistryAdapter, SystemClock, database};
use crate::domain::service::LibraryItemService;
use crate::infrastructure::AppStateImpl;
use crate::infrastructure::http::{HttpServer, HttpServerConfig};
use crate::infrastructure::persistence::memory::InMemoryRepository;
use crate::infrastructure::persistence::postgres::PostgresLibraryItemRepository;
use crate::infrastructure::settings::{PersistenceKind, Settings};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod domain;
mod infrastructure;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let item_types = Arc::new(ItemTypesRegistryAdapter::load(&settings.schema_config_path)?);
    tracing::info!("Item types loaded");

    let server_config = HttpServerConfig {
        port: &settings.server_port,
    };

    match settings.persistence.kind {
        PersistenceKind::Postgres => {
            let database = database::connect(settings.database()?).await?;
            tracing::info!("Connected to DB");

            let repository = PostgresLibraryItemRepository::new(database);
            let service = LibraryItemService::new(repository, item_types, Arc::new(SystemClock));
            HttpServer::new(AppStateImpl::new(service), server_config)
                .await?
                .run()
                .await
        }
        PersistenceKind::Memory => {
            tracing::warn!("Library items are kept in memory and lost on exit");

            let repository = InMemoryRepository::with_libraries(settings.libraries()?);
            let service = LibraryItemService::new(repository, item_types, Arc::new(SystemClock));
            HttpServer::new(AppStateImpl::new(service), server_config)
                .await?
                .run()
                .await
        }
    }
}
