use anyhow::Result;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

mod clients;
mod config;
mod error;
mod logging;
mod models;
mod routes;
mod services;

use clients::reasoning::HttpReasoningClient;
use clients::session::StaticSessionProvider;
use services::conversation::ConversationManager;
use services::orchestrator::QueryOrchestrator;
use services::registry::DatasetRegistry;
use services::store::{ConversationStore, SqliteConversationStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    logging::init_logging()?;

    // Load configuration
    let config = config::Config::new()?;

    // Conversation persistence, on disk when configured
    let store: Arc<dyn ConversationStore> = match &config.conversation_db_path {
        Some(path) => Arc::new(SqliteConversationStore::open(path).await?),
        None => Arc::new(SqliteConversationStore::open_in_memory().await?),
    };

    // Wire the query pipeline
    let sessions = Arc::new(StaticSessionProvider::new(config.ai_access_token.clone()));
    let client = Arc::new(HttpReasoningClient::new(&config.ai_endpoint_url)?);
    let orchestrator = Arc::new(QueryOrchestrator::new(sessions, client));
    let registry = Arc::new(DatasetRegistry::new(config.dataset_cache_capacity));
    let manager = Arc::new(ConversationManager::new(
        store,
        orchestrator.clone(),
        registry.clone(),
    ));

    let port = config.port;
    let state = Arc::new(AppState {
        config,
        registry,
        orchestrator,
        manager,
    });

    // Build our application with its routes
    let app = Router::new()
        .merge(routes::routes())
        .merge(routes::datasets::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Run it
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// Application state
pub struct AppState {
    pub config: config::Config,
    pub registry: Arc<DatasetRegistry>,
    pub orchestrator: Arc<QueryOrchestrator>,
    pub manager: Arc<ConversationManager>,
}
