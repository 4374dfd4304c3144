//! Session broker: the single-active-client WebSocket server.
//!
//! Accepts WebSocket connections and serves exactly one client at a time; a
//! newly accepted connection unconditionally displaces the current one, with
//! no grace period or drain. Within one connection messages are processed
//! strictly in arrival order: a reply is fully sent before the next message
//! is read.

mod protocol;
mod session;

pub use protocol::{Inbound, Outbound};
pub use session::{SessionId, SessionSlot};

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::catalog::SchemaCatalog;
use crate::config::ServerConfig;
use crate::db::DatabaseClient;
use crate::error::Result;
use crate::generator::{generate_sql_query, Intent, IntentClassifier, SqlGenerator};
use crate::query::{ExecutionOutcome, QueryExecutor};

/// Reply sent when the classifier decides the message is not a data question.
const CLARIFICATION_REPLY: &str =
    "I can only help with questions about your data. Try asking about the tables in your schema.";

/// Reply sent when generation flagged its own output, so nothing was executed.
const RETRY_HINT_REPLY: &str =
    "Could not turn that question into SQL. Try rephrasing it using table or column names from your schema.";

/// Reply sent when the generator itself failed.
const GENERATION_FAILED_REPLY: &str = "SQL generation failed.";

/// The single-active-client protocol server.
///
/// A single database connection and a single schema catalog are shared
/// process-wide; the catalog sits behind a mutex so context updates and
/// reads exclude each other. The single-session policy is enforced by
/// [`SessionSlot`], not assumed.
pub struct SessionBroker {
    catalog: Arc<Mutex<SchemaCatalog>>,
    db: Arc<dyn DatabaseClient>,
    generator: Arc<dyn SqlGenerator>,
    classifier: Arc<dyn IntentClassifier>,
    slot: SessionSlot,
    ping_interval: Duration,
    ping_timeout: Duration,
}

impl SessionBroker {
    /// Creates a new broker over the shared catalog and collaborators.
    pub fn new(
        catalog: Arc<Mutex<SchemaCatalog>>,
        db: Arc<dyn DatabaseClient>,
        generator: Arc<dyn SqlGenerator>,
        classifier: Arc<dyn IntentClassifier>,
        server: &ServerConfig,
    ) -> Self {
        Self {
            catalog,
            db,
            generator,
            classifier,
            slot: SessionSlot::new(),
            ping_interval: Duration::from_secs(server.ping_interval_secs),
            ping_timeout: Duration::from_secs(server.ping_timeout_secs),
        }
    }

    /// Runs the accept loop forever.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        let local_addr = listener
            .local_addr()
            .map_err(|e| crate::error::AskdbError::transport(e.to_string()))?;
        info!("WebSocket server listening on {local_addr}");

        loop {
            let (stream, peer_addr) = listener
                .accept()
                .await
                .map_err(|e| crate::error::AskdbError::transport(e.to_string()))?;
            debug!(%peer_addr, "New connection");

            let broker = Arc::clone(&self);
            tokio::spawn(async move {
                broker.handle_connection(stream).await;
            });
        }
    }

    /// Handles one WebSocket connection until it closes, times out, or is
    /// displaced by a newer one.
    async fn handle_connection(&self, stream: TcpStream) {
        let ws_stream = match tokio_tungstenite::accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                warn!("WebSocket handshake failed: {e}");
                return;
            }
        };

        let (id, mut close_rx) = self.slot.claim().await;
        debug!(session = id, "Session connected");

        let (mut write, mut read) = ws_stream.split();
        let mut ping_timer = tokio::time::interval(self.ping_interval);
        let mut last_pong = Instant::now();

        loop {
            tokio::select! {
                _ = close_rx.recv() => {
                    // Displaced by a newer connection; close is best-effort.
                    debug!(session = id, "Session displaced");
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }

                _ = ping_timer.tick() => {
                    if last_pong.elapsed() > self.ping_timeout {
                        warn!(session = id, "Keepalive timeout, closing connection");
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                    if write.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let outbound = self.dispatch(text.as_str()).await;

                            // A session evicted mid-request never receives
                            // the late reply; it is discarded.
                            if !self.slot.is_active(id).await {
                                debug!(session = id, "Discarding reply for evicted session");
                                break;
                            }

                            let json = match serde_json::to_string(&outbound) {
                                Ok(json) => json,
                                Err(e) => {
                                    warn!(session = id, "Failed to serialize reply: {e}");
                                    continue;
                                }
                            };
                            if write.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Pong(_))) => {
                            last_pong = Instant::now();
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            debug!(session = id, "Peer closed connection");
                            break;
                        }
                        // Pings are answered by the protocol layer; binary
                        // frames are ignored.
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            debug!(session = id, "Connection error: {e}");
                            break;
                        }
                    }
                }
            }
        }

        // No-op if a newer session already owns the slot.
        self.slot.release(id).await;
        debug!(session = id, "Session closed");
    }

    /// Parses one inbound frame and produces the reply, dispatching on which
    /// key is present. Unrecognized shapes (including unparsable JSON) get
    /// an empty envelope.
    pub async fn dispatch(&self, raw: &str) -> Outbound {
        let inbound: Inbound = serde_json::from_str(raw).unwrap_or_default();

        if let Some(question) = inbound.user_input {
            self.handle_user_input(&question).await
        } else if inbound.get_schema_context.is_some() {
            let catalog = self.catalog.lock().await;
            Outbound::SchemaContext {
                db_schema_context: catalog.export_payload(),
                get_schema_context: true,
            }
        } else if let Some(tables) = inbound.schema_context_update {
            let mut catalog = self.catalog.lock().await;
            let included = catalog.restrict_context(&tables);
            debug!(?included, "Schema context restricted");
            Outbound::ContextUpdated {
                schema_context_updated: included,
            }
        } else {
            Outbound::Empty {}
        }
    }

    /// Classifies, generates, and (when generation succeeds) executes one
    /// question, shaping the reply envelope.
    async fn handle_user_input(&self, question: &str) -> Outbound {
        if self.classifier.classify(question).await == Intent::Other {
            return Outbound::reply(CLARIFICATION_REPLY);
        }

        // Snapshot the catalog so the generator call does not hold the lock.
        let catalog = self.catalog.lock().await.clone();

        let sql = match generate_sql_query(question, &catalog, self.generator.as_ref()).await {
            Ok(sql) => sql,
            Err(e) => {
                warn!("Generation failed: {e}");
                return Outbound::reply_with_error(GENERATION_FAILED_REPLY, e.to_string());
            }
        };

        let executor = QueryExecutor::new(self.db.as_ref());
        match executor.execute(&sql).await {
            Ok(ExecutionOutcome::Skipped) => Outbound::reply(RETRY_HINT_REPLY),
            Ok(ExecutionOutcome::Rows(records)) => {
                Outbound::reply_with_rows(format!("Generated SQL: {sql}"), records)
            }
            Err(e) => {
                warn!("Execution failed: {e}");
                Outbound::reply_with_error(format!("Generated SQL: {sql}"), e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnDescriptor, TableDescriptor};
    use crate::db::{ColumnInfo, MockDatabaseClient, QueryResult, Value};
    use crate::generator::{FixedClassifier, KeywordClassifier, MockSqlGenerator};
    use serde_json::json;

    fn sample_tables() -> Vec<TableDescriptor> {
        vec![
            TableDescriptor::new("users")
                .with_column(ColumnDescriptor::new("id", "INT").primary())
                .with_column(ColumnDescriptor::new("name", "VARCHAR(50)")),
            TableDescriptor::new("orders")
                .with_column(ColumnDescriptor::new("id", "INT").primary())
                .with_column(ColumnDescriptor::new("user_id", "INT").relation()),
        ]
    }

    fn test_broker(db: MockDatabaseClient) -> SessionBroker {
        let catalog = SchemaCatalog::from_tables(sample_tables());
        SessionBroker::new(
            Arc::new(Mutex::new(catalog)),
            Arc::new(db),
            Arc::new(MockSqlGenerator::new()),
            Arc::new(KeywordClassifier::new()),
            &ServerConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_dispatch_user_input_returns_rows() {
        let scripted = QueryResult::with_data(
            vec![ColumnInfo::new("id", "integer")],
            vec![vec![Value::Int(1)]],
        );
        let broker = test_broker(MockDatabaseClient::new().with_result("FROM users", scripted));

        let out = broker.dispatch(r#"{"user_input": "Show all users"}"#).await;
        let json = serde_json::to_value(&out).unwrap();

        assert_eq!(json["reply"], "Generated SQL: SELECT * FROM users");
        assert_eq!(json["db_result"], json!([{"id": 1}]));
    }

    #[tokio::test]
    async fn test_dispatch_non_sql_intent_gets_clarification() {
        let broker = SessionBroker::new(
            Arc::new(Mutex::new(SchemaCatalog::from_tables(sample_tables()))),
            Arc::new(MockDatabaseClient::new()),
            Arc::new(MockSqlGenerator::new()),
            Arc::new(FixedClassifier(Intent::Other)),
            &ServerConfig::default(),
        );

        let out = broker.dispatch(r#"{"user_input": "hello"}"#).await;
        let json = serde_json::to_value(&out).unwrap();

        assert_eq!(json["reply"], CLARIFICATION_REPLY);
        assert!(json.get("db_result").is_none());
    }

    #[tokio::test]
    async fn test_dispatch_marker_output_skips_database() {
        let db = MockDatabaseClient::new();
        let catalog = SchemaCatalog::from_tables(sample_tables());
        let broker = SessionBroker::new(
            Arc::new(Mutex::new(catalog)),
            Arc::new(db),
            Arc::new(MockSqlGenerator::new()),
            Arc::new(KeywordClassifier::new()),
            &ServerConfig::default(),
        );

        // "widgets" matches nothing in the schema, so the pipeline emits
        // marker text and nothing may reach the database
        let out = broker.dispatch(r#"{"user_input": "Show all widgets"}"#).await;
        let json = serde_json::to_value(&out).unwrap();

        assert_eq!(json["reply"], RETRY_HINT_REPLY);
        assert!(json.get("db_result").is_none());
        assert!(json.get("error").is_none());
    }

    #[tokio::test]
    async fn test_dispatch_execution_failure_attaches_error() {
        let catalog = SchemaCatalog::from_tables(sample_tables());
        let broker = SessionBroker::new(
            Arc::new(Mutex::new(catalog)),
            Arc::new(crate::db::FailingDatabaseClient),
            Arc::new(MockSqlGenerator::new()),
            Arc::new(KeywordClassifier::new()),
            &ServerConfig::default(),
        );

        let out = broker.dispatch(r#"{"user_input": "Show all users"}"#).await;
        let json = serde_json::to_value(&out).unwrap();

        assert_eq!(json["reply"], "Generated SQL: SELECT * FROM users");
        assert!(json["error"].as_str().unwrap().contains("execution failed"));
    }

    #[tokio::test]
    async fn test_dispatch_get_schema_context() {
        let broker = test_broker(MockDatabaseClient::new());

        let out = broker.dispatch(r#"{"get_schema_context": true}"#).await;
        let json = serde_json::to_value(&out).unwrap();

        assert_eq!(json["get_schema_context"], true);
        assert_eq!(json["db_schema_context"]["tables"], json!(["users", "orders"]));
        assert_eq!(
            json["db_schema_context"]["schema_data"][0]["tableName"],
            "users"
        );
    }

    #[tokio::test]
    async fn test_dispatch_schema_context_update() {
        let broker = test_broker(MockDatabaseClient::new());

        let out = broker
            .dispatch(r#"{"schema_context_update": ["users", "widgets"]}"#)
            .await;
        let json = serde_json::to_value(&out).unwrap();

        assert_eq!(json["schema_context_updated"], json!(["users"]));

        // Subsequent export reflects the restriction
        let out = broker.dispatch(r#"{"get_schema_context": true}"#).await;
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["db_schema_context"]["tables"], json!(["users"]));
    }

    #[tokio::test]
    async fn test_dispatch_unknown_shape_gets_empty_envelope() {
        let broker = test_broker(MockDatabaseClient::new());

        let out = broker.dispatch(r#"{"mystery": 42}"#).await;
        assert_eq!(serde_json::to_value(&out).unwrap(), json!({}));
    }

    #[tokio::test]
    async fn test_dispatch_invalid_json_gets_empty_envelope() {
        let broker = test_broker(MockDatabaseClient::new());

        let out = broker.dispatch("not json at all").await;
        assert_eq!(serde_json::to_value(&out).unwrap(), json!({}));
    }
}
