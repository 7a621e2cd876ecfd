//! Health chat server binary.
//!
//! Reads configuration from the environment (and `.env`), opens the SQLite
//! store and serves the chat page and admin endpoints.
//!
//! See [`health_chat::AppConfig`] for the variables it reads.

use std::sync::{Arc, Mutex};

use health_chat::{
    router, AppConfig, AppState, ChatService, ChatSettings, ConfiguredGraph, ExtractionMode,
};
use health_chat_core::{Database, TimeParser};
use health_chat_llm::{
    ConfiguredExtractor, KeywordEntityExtractor, LlmEntityExtractor, OpenAiClient,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("health_chat=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let db = Database::open(&config.db_path)?;
    tracing::info!("-- Opened database at {}", config.db_path.display());

    let model = Arc::new(OpenAiClient::new(config.llm.clone())?);
    let extractor = match config.extraction {
        ExtractionMode::Keyword => ConfiguredExtractor::Keyword(KeywordEntityExtractor),
        ExtractionMode::Llm => ConfiguredExtractor::Llm(LlmEntityExtractor::new(Arc::clone(&model))),
    };

    if config.graph.is_none() {
        tracing::info!("-- Knowledge graph disabled (NEO4J_URI not set)");
    }
    let graph = ConfiguredGraph::from_config(config.graph.clone())?;

    let settings = ChatSettings {
        time_parser: TimeParser::new(config.require_future_appointments),
        history_tokens: config.history_max_tokens,
    };

    let chat = ChatService::new(Arc::new(Mutex::new(db)), model, extractor, graph, settings);
    let app = router(AppState::new(chat));

    tracing::info!("-- Starting health chat on {}", config.addr);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
