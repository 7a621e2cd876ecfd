//! # Health Chat server
//!
//! Patient chat web app:
//! - chat page and message handling on axum
//! - replies through [`chat::ChatService`] (moderation, intents, LLM)
//! - optional Neo4j knowledge graph writes
//! - JSON admin endpoints
//!
//! The binary wires these from [`config::AppConfig`]; tests build the same
//! router with in-memory storage and scripted models.

#![warn(rust_2018_idioms)]

pub mod chat;
pub mod config;
pub mod graph;
pub mod page;
pub mod routes;

pub use chat::{ChatError, ChatPage, ChatResult, ChatService, ChatSettings};
pub use config::{AppConfig, ConfigError, ExtractionMode};
pub use graph::{
    ConfiguredGraph, DisabledGraph, GraphConfig, GraphError, GraphResult, GraphStatus,
    KnowledgeGraph, Neo4jGraph,
};
pub use routes::{router, AppState};
