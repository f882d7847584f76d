use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, error, info};
use native_tls::{Certificate, Identity, TlsConnector};
use postgres_native_tls::MakeTlsConnector;
use std::fs;
use std::path::Path;
use tokio_postgres::{Client, NoTls, Statement};

use crate::config::{DatabaseConfig, SslMode};
use crate::error::{AgentError, Result};
use crate::model::SummaryRecord;

/// Generic trait for summary persistence backends
#[async_trait]
pub trait SummarySink: Send + Sync + 'static {
    /// Persist one summary row atomically. A failed persist leaves no
    /// partial row behind.
    async fn persist(&mut self, record: &SummaryRecord) -> Result<()>;

    /// Check the connection health
    async fn health_check(&self) -> Result<bool>;

    /// Get a name for this sink
    fn name(&self) -> &str;
}

/// PostgreSQL sink backed by a single exclusively-owned connection.
/// There is exactly one writer, so no pool is involved; the connection
/// task is spawned onto the runtime and the client lives for the whole
/// agent run.
pub struct PostgresSink {
    client: Client,
    insert: Statement,
    table: String,
}

impl PostgresSink {
    /// Connect, verify the connection, ensure the summary table exists,
    /// and prepare the insert statement.
    pub async fn connect(config: &DatabaseConfig, table: impl Into<String>) -> Result<Self> {
        let table = table.into();

        let mut pg_config = tokio_postgres::Config::new();
        pg_config
            .host(&config.host)
            .port(config.port)
            .dbname(&config.name)
            .user(&config.username)
            .password(&config.password);

        let client = match config.ssl_mode {
            SslMode::Disable => {
                debug!("Connecting to PostgreSQL with SSL disabled");
                let (client, connection) = pg_config
                    .connect(NoTls)
                    .await
                    .map_err(|e| AgentError::Connection(format!("Failed to connect: {}", e)))?;
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        error!("Database connection error: {}", e);
                    }
                });
                client
            }
            _ => {
                debug!(
                    "Connecting to PostgreSQL with SSL enabled (mode: {:?})",
                    config.ssl_mode
                );
                let connector = build_tls_connector(config)?;
                let tls = MakeTlsConnector::new(connector);
                let (client, connection) = pg_config
                    .connect(tls)
                    .await
                    .map_err(|e| AgentError::Connection(format!("Failed to connect: {}", e)))?;
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        error!("Database connection error: {}", e);
                    }
                });
                client
            }
        };

        client
            .execute("SELECT 1", &[])
            .await
            .map_err(|e| AgentError::Connection(format!("Test query failed: {}", e)))?;

        client
            .execute(&create_table_sql(&table), &[])
            .await
            .map_err(|e| AgentError::Database(format!("Failed to ensure table: {}", e)))?;

        let insert = client
            .prepare(&insert_sql(&table))
            .await
            .map_err(|e| AgentError::Database(format!("Failed to prepare insert: {}", e)))?;

        info!(
            "Connected to PostgreSQL database: {}:{}/{}",
            config.host, config.port, config.name
        );

        Ok(Self {
            client,
            insert,
            table,
        })
    }
}

#[async_trait]
impl SummarySink for PostgresSink {
    async fn persist(&mut self, record: &SummaryRecord) -> Result<()> {
        let tx = self
            .client
            .transaction()
            .await
            .map_err(|e| AgentError::Database(format!("Failed to begin transaction: {}", e)))?;

        let row = match tx
            .query_one(
                &self.insert,
                &[
                    &record.clients_reporting,
                    &record.avg_bandwidth_mbps,
                    &record.avg_latency_ms,
                    &record.avg_packet_loss_percent,
                    &record.quality_score,
                ],
            )
            .await
        {
            Ok(row) => row,
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    error!("Rollback after failed insert also failed: {}", rb);
                }
                return Err(
                    AgentError::Database(format!("Failed to insert summary: {}", e)).into(),
                );
            }
        };

        tx.commit()
            .await
            .map_err(|e| AgentError::Database(format!("Failed to commit summary: {}", e)))?;

        let recorded_at: DateTime<Utc> = row.get(0);
        debug!(
            "Summary row committed to {} (recorded_at: {})",
            self.table, recorded_at
        );
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        let row = self
            .client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| AgentError::Database(e.to_string()))?;

        let value: i32 = row.get(0);
        Ok(value == 1)
    }

    fn name(&self) -> &str {
        &self.table
    }
}

fn create_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (
            id BIGSERIAL PRIMARY KEY,
            clients_reporting BIGINT NOT NULL,
            avg_bandwidth_mbps DOUBLE PRECISION NOT NULL,
            avg_latency_ms DOUBLE PRECISION NOT NULL,
            avg_packet_loss_percent DOUBLE PRECISION NOT NULL,
            quality_score DOUBLE PRECISION NOT NULL,
            recorded_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
        table
    )
}

fn insert_sql(table: &str) -> String {
    format!(
        "INSERT INTO {} (clients_reporting, avg_bandwidth_mbps, avg_latency_ms, \
         avg_packet_loss_percent, quality_score) VALUES ($1, $2, $3, $4, $5) \
         RETURNING recorded_at",
        table
    )
}

/// Build a TLS connector from a database config
fn build_tls_connector(config: &DatabaseConfig) -> Result<TlsConnector> {
    let mut builder = TlsConnector::builder();

    if let Some(ca_cert_path) = &config.ca_cert {
        let ca_cert = load_certificate(ca_cert_path)?;
        builder.add_root_certificate(ca_cert);
    }

    if let Some(client_cert_path) = &config.client_cert {
        match &config.client_key {
            Some(client_key_path) => {
                let identity = load_identity(client_cert_path, client_key_path)?;
                builder.identity(identity);
            }
            None => {
                return Err(AgentError::Tls("Client key not provided".to_string()).into());
            }
        }
    }

    match config.ssl_mode {
        SslMode::VerifyCa | SslMode::VerifyFull => {
            builder.danger_accept_invalid_certs(false);
        }
        _ => {
            builder.danger_accept_invalid_certs(true);
        }
    }

    builder
        .build()
        .map_err(|e| AgentError::Tls(e.to_string()).into())
}

/// Load a certificate from a file
fn load_certificate<P: AsRef<Path>>(path: P) -> Result<Certificate> {
    let cert_data = fs::read(path)?;
    Certificate::from_pem(&cert_data)
        .map_err(|e| AgentError::Tls(format!("Invalid certificate format: {}", e)).into())
}

/// Load an identity from certificate and key files
fn load_identity<P: AsRef<Path>>(cert_path: P, key_path: P) -> Result<Identity> {
    let cert_data = fs::read(cert_path)?;
    let key_data = fs::read(key_path)?;
    Identity::from_pkcs8(&cert_data, &key_data)
        .map_err(|e| AgentError::Tls(format!("Invalid certificate or key format: {}", e)).into())
}

/// In-memory sink for tests: records rows, and can be told to fail the next
/// persists to exercise the loop's failure handling. A failed persist rolls
/// back its simulated unit of work exactly once.
pub struct MemorySink {
    records: Vec<SummaryRecord>,
    persist_calls: usize,
    fail_next: usize,
    rollbacks: usize,
    name: String,
}

impl MemorySink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            records: Vec::new(),
            persist_calls: 0,
            fail_next: 0,
            rollbacks: 0,
            name: name.into(),
        }
    }

    /// Make the next `n` persist calls fail (and roll back).
    pub fn fail_next_persists(&mut self, n: usize) {
        self.fail_next = n;
    }

    pub fn records(&self) -> &[SummaryRecord] {
        &self.records
    }

    pub fn persist_calls(&self) -> usize {
        self.persist_calls
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks
    }
}

#[async_trait]
impl SummarySink for MemorySink {
    async fn persist(&mut self, record: &SummaryRecord) -> Result<()> {
        self.persist_calls += 1;

        if self.fail_next > 0 {
            self.fail_next -= 1;
            self.rollbacks += 1;
            return Err(AgentError::Database("injected persist failure".to_string()).into());
        }

        self.records.push(record.clone());
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
