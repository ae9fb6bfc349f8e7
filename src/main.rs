use recommender_api::{
    api::{create_router, AppState},
    config::{Config, StorageBackend},
    db::{create_pool, MemoryStore, PgStore},
    models::HyperparameterOverrides,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    let state = match config.storage {
        StorageBackend::Postgres => {
            let pool = create_pool(&config.database_url, config.db_max_connections).await?;
            let store = PgStore::new(pool);
            store.migrate().await?;
            tracing::info!("Connected to PostgreSQL");
            AppState::from_store(store, config.hyperparameters())
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on exit");
            AppState::from_store(MemoryStore::new(), config.hyperparameters())
        }
    };

    if config.recalculate_on_startup {
        state
            .recalculator
            .recalculate(&HyperparameterOverrides::default())
            .await?;
    }

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    tracing::info!(address = %config.bind_address(), "Recommendation service listening");
    axum::serve(listener, app).await?;

    Ok(())
}
