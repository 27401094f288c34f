pub mod api;
pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod seed;
pub mod store;

// Export API types
pub use api::handlers;
pub use api::routes;

pub use error::{EngineError, IndexingError, InheritanceError, PropagationError};

// Export logic types
pub use logic::{
    from_index_shape, project_schema, to_index_shape, Engine, InheritanceResolver, Propagator,
    RelationshipIndex, WriteOutcome,
};

// Export all model types
pub use model::*;

// Export store types
pub use store::{MemoryIndex, MemoryStore, PostgresStore, SearchIndex, Store};

use crate::config::{AppConfig, StorageBackend};
use std::sync::Arc;

/// Build the engine for the configured backend and serve the API until shutdown
pub async fn run_server(config: &AppConfig) -> anyhow::Result<()> {
    let index: Arc<dyn SearchIndex> = Arc::new(MemoryIndex::new());

    match config.storage.backend {
        StorageBackend::Memory => {
            let engine = Engine::new(Arc::new(MemoryStore::new()), index);
            serve_engine(Arc::new(engine), config).await
        }
        StorageBackend::Postgres => {
            let database_url = config.database_url()?;
            let max_connections = config.database.max_connections.unwrap_or(20);
            let store = PostgresStore::new(&database_url, max_connections).await?;
            store.migrate().await?;

            let engine = Engine::new(Arc::new(store), index);
            // The search index is process-local, rebuild it from storage
            let report = engine.reindex_all().await?;
            log::info!("Indexed {} stored documents", report.indexed);
            serve_engine(Arc::new(engine), config).await
        }
    }
}

async fn serve_engine<S: Store + 'static>(
    engine: Arc<Engine<S>>,
    config: &AppConfig,
) -> anyhow::Result<()> {
    use axum::serve;
    use tokio::net::TcpListener;

    engine.init().await?;

    // Load seed data for demonstration (optional)
    if std::env::var("LOAD_SEED_DATA").unwrap_or_default() == "true" {
        log::info!("Loading seed data...");
        seed::load_seed_data(engine.as_ref()).await?;
    }

    let app = routes::create_router::<S>().with_state(engine);

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    log::info!("Denormalization server running on http://{}", bind_address);

    serve(listener, app).await?;

    Ok(())
}
