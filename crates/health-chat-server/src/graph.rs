//! Knowledge graph writes.
//!
//! Entities found in patient messages are merged into a Neo4j graph as
//! `(:Patient {name})-[:HAS_ENTITY]->(:Entity {label, value})`. Writes go
//! through the Neo4j HTTP transactional endpoint, one request per message.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use health_chat_llm::EntityMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Cypher error {code}: {message}")]
    Cypher { code: String, message: String },
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Outcome of a connectivity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphStatus {
    Connected,
    Disabled,
}

impl fmt::Display for GraphStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphStatus::Connected => f.write_str("ok"),
            GraphStatus::Disabled => f.write_str("disabled"),
        }
    }
}

pub trait KnowledgeGraph: Send + Sync {
    /// Merge the patient node and one node plus edge per entity.
    fn save_entities(
        &self,
        patient_name: &str,
        entities: &EntityMap,
    ) -> impl Future<Output = GraphResult<()>> + Send;

    fn ping(&self) -> impl Future<Output = GraphResult<GraphStatus>> + Send;
}

/// Connection settings for [`Neo4jGraph`].
#[derive(Clone)]
pub struct GraphConfig {
    /// HTTP base URL, e.g. `http://localhost:7474`
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub timeout: Duration,
}

impl fmt::Debug for GraphConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphConfig")
            .field("uri", &self.uri)
            .field("user", &self.user)
            .field("database", &self.database)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Statement {
    pub statement: &'static str,
    pub parameters: serde_json::Value,
}

#[derive(Serialize)]
struct TxRequest<'a> {
    statements: &'a [Statement],
}

#[derive(Deserialize)]
struct TxResponse {
    #[serde(default)]
    errors: Vec<TxError>,
}

#[derive(Deserialize)]
struct TxError {
    code: String,
    message: String,
}

const MERGE_PATIENT: &str = "MERGE (p:Patient {name: $name})";
const MERGE_ENTITY: &str = "MERGE (e:Entity {label: $label, value: $value})";
const LINK_ENTITY: &str = "MATCH (p:Patient {name: $name}) \
MATCH (e:Entity {label: $label, value: $value}) \
MERGE (p)-[:HAS_ENTITY]->(e)";
const PING: &str = "RETURN 'Connection successful' AS message";

/// Statements for one save, in execution order.
pub fn entity_statements(patient_name: &str, entities: &EntityMap) -> Vec<Statement> {
    let mut statements = vec![Statement {
        statement: MERGE_PATIENT,
        parameters: json!({ "name": patient_name }),
    }];

    for (label, value) in entities {
        statements.push(Statement {
            statement: MERGE_ENTITY,
            parameters: json!({ "label": label, "value": value }),
        });
        statements.push(Statement {
            statement: LINK_ENTITY,
            parameters: json!({ "name": patient_name, "label": label, "value": value }),
        });
    }

    statements
}

pub struct Neo4jGraph {
    client: reqwest::Client,
    config: GraphConfig,
}

impl Neo4jGraph {
    pub fn new(config: GraphConfig) -> GraphResult<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn commit_url(&self) -> String {
        format!("{}/db/{}/tx/commit", self.config.uri, self.config.database)
    }

    async fn run(&self, statements: &[Statement]) -> GraphResult<()> {
        let url = self.commit_url();
        debug!(%url, count = statements.len(), "Running Cypher statements");

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.user, Some(&self.config.password))
            .json(&TxRequest { statements })
            .send()
            .await?
            .error_for_status()?;

        check_errors(response.json().await?)
    }
}

impl KnowledgeGraph for Neo4jGraph {
    async fn save_entities(&self, patient_name: &str, entities: &EntityMap) -> GraphResult<()> {
        self.run(&entity_statements(patient_name, entities)).await
    }

    async fn ping(&self) -> GraphResult<GraphStatus> {
        let statements = [Statement {
            statement: PING,
            parameters: json!({}),
        }];
        self.run(&statements).await?;
        Ok(GraphStatus::Connected)
    }
}

fn check_errors(response: TxResponse) -> GraphResult<()> {
    match response.errors.into_iter().next() {
        Some(TxError { code, message }) => Err(GraphError::Cypher { code, message }),
        None => Ok(()),
    }
}

/// Used when no graph is configured. Saves are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledGraph;

impl KnowledgeGraph for DisabledGraph {
    async fn save_entities(&self, _patient_name: &str, _entities: &EntityMap) -> GraphResult<()> {
        Ok(())
    }

    async fn ping(&self) -> GraphResult<GraphStatus> {
        Ok(GraphStatus::Disabled)
    }
}

/// Runtime choice between a live graph and none.
pub enum ConfiguredGraph {
    Neo4j(Neo4jGraph),
    Disabled(DisabledGraph),
}

impl ConfiguredGraph {
    pub fn from_config(config: Option<GraphConfig>) -> GraphResult<Self> {
        match config {
            Some(config) => Ok(Self::Neo4j(Neo4jGraph::new(config)?)),
            None => Ok(Self::Disabled(DisabledGraph)),
        }
    }
}

impl KnowledgeGraph for ConfiguredGraph {
    async fn save_entities(&self, patient_name: &str, entities: &EntityMap) -> GraphResult<()> {
        match self {
            Self::Neo4j(graph) => graph.save_entities(patient_name, entities).await,
            Self::Disabled(graph) => graph.save_entities(patient_name, entities).await,
        }
    }

    async fn ping(&self) -> GraphResult<GraphStatus> {
        match self {
            Self::Neo4j(graph) => graph.ping().await,
            Self::Disabled(graph) => graph.ping().await,
        }
    }
}
