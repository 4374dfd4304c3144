//! askdb - ask your database questions in plain language over a WebSocket.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use askdb::broker::SessionBroker;
use askdb::catalog::{ColumnDescriptor, SchemaCatalog, TableDescriptor};
use askdb::cli::Cli;
use askdb::config::{Config, ConnectionConfig};
use askdb::db::{self, DatabaseClient, MockDatabaseClient};
use askdb::error::{AskdbError, Result};
use askdb::generator::{
    GeneratorProvider, HttpGenerator, HttpGeneratorConfig, KeywordClassifier, MockSqlGenerator,
    SqlGenerator,
};

#[tokio::main]
async fn main() {
    // Load .env file if present (for PGPASSWORD etc.)
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();

    if cli.log_file {
        askdb::logging::init_file_logging();
    } else {
        askdb::logging::init_stderr_logging();
    }

    if let Err(e) = run(cli).await {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    let db = open_database(&cli, &config).await?;

    // Introspect once at startup. A failure here is not fatal: the server
    // still runs and answers questions with a schema-missing reply until
    // it is restarted against a reachable database.
    let mut catalog = SchemaCatalog::new();
    if let Err(e) = catalog.refresh(db.as_ref()).await {
        warn!("Schema introspection failed: {e}");
    } else {
        info!(
            "Schema loaded: {} table(s)",
            catalog.context_tables().len()
        );
    }

    let generator = build_generator(&cli, &config)?;

    let listen = cli.listen.as_deref().unwrap_or(&config.server.listen);
    let listener = TcpListener::bind(listen)
        .await
        .map_err(|e| AskdbError::transport(format!("Failed to bind {listen}: {e}")))?;

    let broker = Arc::new(SessionBroker::new(
        Arc::new(Mutex::new(catalog)),
        Arc::from(db),
        generator,
        Arc::new(KeywordClassifier::new()),
        &config.server,
    ));

    broker.serve(listener).await
}

/// Opens the database client: the mock backend when requested, otherwise a
/// PostgreSQL connection resolved from CLI args, config file, and environment.
async fn open_database(cli: &Cli, config: &Config) -> Result<Box<dyn DatabaseClient>> {
    if cli.mock_db {
        info!("Using mock database");
        return Ok(Box::new(MockDatabaseClient::with_tables(demo_tables())));
    }

    let connection = resolve_connection(cli, config)?.ok_or_else(|| {
        AskdbError::config(
            "No database connection configured. Pass a connection string or use --help",
        )
    })?;

    info!("Connecting to: {}", connection.display_string());
    db::connect(&connection).await
}

/// Resolves the final connection configuration from CLI args, config file, and environment.
fn resolve_connection(cli: &Cli, config: &Config) -> Result<Option<ConnectionConfig>> {
    // Start with CLI connection config if provided
    let mut connection = cli.to_connection_config()?;

    // If no CLI connection, try named connection from config
    if connection.is_none() {
        if let Some(name) = cli.connection_name() {
            connection = config.get_connection(Some(name)).cloned();
            if connection.is_none() {
                return Err(AskdbError::config(format!(
                    "Connection '{}' not found in config file",
                    name
                )));
            }
        }
    }

    // If still no connection, try default from config
    if connection.is_none() {
        connection = config.get_connection(None).cloned();
    }

    // Apply environment variable defaults
    if let Some(ref mut conn) = connection {
        conn.apply_env_defaults();
    }

    Ok(connection)
}

/// Builds the SQL generator from config, with the CLI provider override
/// taking precedence.
fn build_generator(cli: &Cli, config: &Config) -> Result<Arc<dyn SqlGenerator>> {
    let provider_str = cli
        .generator
        .as_deref()
        .unwrap_or(&config.generator.provider);
    let provider: GeneratorProvider = provider_str.parse().map_err(AskdbError::config)?;

    match provider {
        GeneratorProvider::Http => {
            let mut gen_config = HttpGeneratorConfig::new(config.generator.model.clone());
            if let Some(url) = &config.generator.base_url {
                gen_config = gen_config.with_url(url.clone());
            }
            info!(
                "Using HTTP generator: model '{}' at {}",
                gen_config.model, gen_config.base_url
            );
            Ok(Arc::new(HttpGenerator::new(gen_config)?))
        }
        GeneratorProvider::Mock => {
            info!("Using mock generator");
            Ok(Arc::new(MockSqlGenerator::new()))
        }
    }
}

/// A small fixed schema served by `--mock-db`.
fn demo_tables() -> Vec<TableDescriptor> {
    vec![
        TableDescriptor::new("users")
            .with_column(ColumnDescriptor::new("id", "INT").primary())
            .with_column(ColumnDescriptor::new("name", "VARCHAR(100)"))
            .with_column(ColumnDescriptor::new("email", "VARCHAR(255)")),
        TableDescriptor::new("orders")
            .with_column(ColumnDescriptor::new("id", "INT").primary())
            .with_column(ColumnDescriptor::new("user_id", "INT").relation())
            .with_column(ColumnDescriptor::new("total", "NUMERIC(10,2)"))
            .with_column(ColumnDescriptor::new("created_at", "TIMESTAMP")),
    ]
}
