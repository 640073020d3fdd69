//! PostgreSQL/Redshift warehouse adapter
//!
//! Works against PostgreSQL-compatible warehouses (Amazon Redshift being
//! the deployment target). Three pieces of SQL matter:
//!
//! - watermark read/write against the job-metadata table
//! - the bulk copy: `COPY <table> (<cols>) FROM 's3://…' CSV IGNOREHEADER 1`
//!   with the staging credentials inlined, Redshift style
//! - the dedup delete retaining the max-`updatedAt` row per id
//!
//! Table names come from configuration, never from user input; they are
//! interpolated into SQL because identifiers cannot be bound as
//! parameters.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let warehouse = PostgresWarehouse::connect(
//!     "warehouse.internal", 5439, "analytics", "etl", "password",
//!     "deliveries.delivery_attempts", "etl.job_metadata",
//! ).await?
//! .with_copy_credentials(access_key_id, secret_access_key);
//! ```

use chrono::{DateTime, Utc};
use wareflow_core::{StagedBatchRef, TableSpec};

#[cfg(feature = "postgres")]
use tracing::{debug, info};

use crate::adapter::{WarehouseAdapter, WarehouseError};

#[cfg(feature = "postgres")]
use tokio_postgres::{Client, NoTls};

#[cfg(feature = "postgres")]
use postgres_native_tls::MakeTlsConnector;

#[cfg(feature = "postgres")]
use native_tls::TlsConnector;

/// PostgreSQL/Redshift warehouse adapter
pub struct PostgresWarehouse {
    /// Fully qualified target table
    table: String,

    /// Fully qualified job-metadata table
    metadata_table: String,

    /// Credentials inlined into the COPY statement
    copy_credentials: Option<(String, String)>,

    /// PostgreSQL client (only available with postgres feature)
    #[cfg(feature = "postgres")]
    client: Client,

    /// Placeholder for when feature is disabled
    #[cfg(not(feature = "postgres"))]
    _phantom: std::marker::PhantomData<()>,
}

impl PostgresWarehouse {
    /// Connect with direct credentials, no TLS
    #[cfg(feature = "postgres")]
    pub async fn connect(
        host: &str,
        port: u16,
        database: &str,
        user: &str,
        password: &str,
        table: impl Into<String>,
        metadata_table: impl Into<String>,
    ) -> Result<Self, WarehouseError> {
        let config = format!(
            "host={} port={} dbname={} user={} password={}",
            host, port, database, user, password
        );

        let (client, connection) = tokio_postgres::connect(&config, NoTls)
            .await
            .map_err(|e| {
                WarehouseError::AuthenticationError(format!(
                    "Failed to connect to warehouse at {}:{}: {}",
                    host, port, e
                ))
            })?;

        let host = host.to_string();
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(host = %host, "warehouse connection error: {}", e);
            }
        });

        Ok(Self {
            table: table.into(),
            metadata_table: metadata_table.into(),
            copy_credentials: None,
            client,
        })
    }

    /// Create adapter without postgres feature (returns error)
    #[cfg(not(feature = "postgres"))]
    pub async fn connect(
        _host: &str,
        _port: u16,
        _database: &str,
        _user: &str,
        _password: &str,
        table: impl Into<String>,
        metadata_table: impl Into<String>,
    ) -> Result<Self, WarehouseError> {
        let _ = (table.into(), metadata_table.into());
        Err(WarehouseError::ConfigError(
            "PostgreSQL support not compiled. Rebuild with: cargo build --features postgres"
                .to_string(),
        ))
    }

    /// Connect with direct credentials over TLS
    #[cfg(feature = "postgres")]
    pub async fn connect_with_tls(
        host: &str,
        port: u16,
        database: &str,
        user: &str,
        password: &str,
        table: impl Into<String>,
        metadata_table: impl Into<String>,
    ) -> Result<Self, WarehouseError> {
        let config = format!(
            "host={} port={} dbname={} user={} password={}",
            host, port, database, user, password
        );

        let connector = TlsConnector::builder().build().map_err(|e| {
            WarehouseError::ConfigError(format!("Failed to create TLS connector: {}", e))
        })?;
        let tls = MakeTlsConnector::new(connector);

        let (client, connection) = tokio_postgres::connect(&config, tls).await.map_err(|e| {
            WarehouseError::AuthenticationError(format!(
                "Failed to connect to warehouse at {}:{} with TLS: {}",
                host, port, e
            ))
        })?;

        let host = host.to_string();
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(host = %host, "warehouse TLS connection error: {}", e);
            }
        });

        Ok(Self {
            table: table.into(),
            metadata_table: metadata_table.into(),
            copy_credentials: None,
            client,
        })
    }

    /// Create adapter without postgres feature (returns error)
    #[cfg(not(feature = "postgres"))]
    pub async fn connect_with_tls(
        _host: &str,
        _port: u16,
        _database: &str,
        _user: &str,
        _password: &str,
        table: impl Into<String>,
        metadata_table: impl Into<String>,
    ) -> Result<Self, WarehouseError> {
        let _ = (table.into(), metadata_table.into());
        Err(WarehouseError::ConfigError(
            "PostgreSQL support not compiled. Rebuild with: cargo build --features postgres"
                .to_string(),
        ))
    }

    /// Provide the staging credentials the COPY statement runs with
    pub fn with_copy_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.copy_credentials = Some((access_key_id.into(), secret_access_key.into()));
        self
    }

    /// The fully qualified target table
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Build the bulk-copy statement for a staged batch
    ///
    /// The column list names every target column explicitly, quoted, in
    /// declared order, so the staged CSV maps positionally.
    #[cfg(feature = "postgres")]
    fn copy_statement(
        &self,
        staged: &StagedBatchRef,
        spec: &TableSpec,
    ) -> Result<String, WarehouseError> {
        let (access_key_id, secret_access_key) =
            self.copy_credentials.as_ref().ok_or_else(|| {
                WarehouseError::ConfigError(
                    "COPY credentials not configured for the staging bucket".to_string(),
                )
            })?;

        let column_list = spec
            .column_names()
            .iter()
            .map(|name| quote_ident(name))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(format!(
            "COPY {} ({})\nFROM '{}'\nACCESS_KEY_ID '{}'\nSECRET_ACCESS_KEY '{}'\nCSV\nIGNOREHEADER 1",
            self.table,
            column_list,
            staged.uri(),
            access_key_id,
            secret_access_key,
        ))
    }
}

/// Quote a column identifier (mixed-case names like `updatedAt` must not
/// fold)
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name)
}

/// Dedup statement: drop every row whose (id, updatedAt) is not the
/// group maximum
fn keep_max_statement(table: &str) -> String {
    format!(
        "DELETE FROM {t} WHERE (\"id\", \"updatedAt\") NOT IN \
         (SELECT \"id\", MAX(\"updatedAt\") FROM {t} GROUP BY \"id\")",
        t = table
    )
}

/// Statements collapsing exact (id, updatedAt) duplicates left behind by
/// re-copied batches
///
/// The duplicated rows are identical in every column, so no predicate can
/// single one out — and Redshift has no row identifier like `ctid` to
/// break the tie with. The duplicated groups are instead rebuilt from a
/// DISTINCT snapshot through a temp table; runs on both PostgreSQL and
/// Redshift.
fn collapse_ties_statements(table: &str) -> [String; 4] {
    [
        format!(
            "CREATE TEMP TABLE wareflow_dedup_ties AS \
             SELECT DISTINCT * FROM {t} WHERE (\"id\", \"updatedAt\") IN \
             (SELECT \"id\", \"updatedAt\" FROM {t} \
              GROUP BY \"id\", \"updatedAt\" HAVING COUNT(*) > 1)",
            t = table
        ),
        format!(
            "DELETE FROM {t} WHERE (\"id\", \"updatedAt\") IN \
             (SELECT \"id\", \"updatedAt\" FROM wareflow_dedup_ties)",
            t = table
        ),
        format!("INSERT INTO {t} SELECT * FROM wareflow_dedup_ties", t = table),
        "DROP TABLE wareflow_dedup_ties".to_string(),
    ]
}

#[async_trait::async_trait]
impl WarehouseAdapter for PostgresWarehouse {
    fn name(&self) -> &'static str {
        "PostgreSQL"
    }

    #[cfg(feature = "postgres")]
    async fn get_watermark(
        &self,
        job_name: &str,
    ) -> Result<Option<DateTime<Utc>>, WarehouseError> {
        let query = format!(
            "SELECT last_updated_at FROM {} WHERE job_name = $1",
            self.metadata_table
        );

        let row = self
            .client
            .query_opt(&query, &[&job_name])
            .await
            .map_err(|e| WarehouseError::MetadataError(format!("watermark read failed: {}", e)))?;

        let watermark = row.map(|r| r.get::<_, DateTime<Utc>>(0));
        debug!(job = %job_name, watermark = ?watermark, "watermark read");
        Ok(watermark)
    }

    #[cfg(not(feature = "postgres"))]
    async fn get_watermark(
        &self,
        _job_name: &str,
    ) -> Result<Option<DateTime<Utc>>, WarehouseError> {
        Err(WarehouseError::ConfigError(
            "PostgreSQL support not compiled. Rebuild with: cargo build --features postgres"
                .to_string(),
        ))
    }

    #[cfg(feature = "postgres")]
    async fn set_watermark(
        &self,
        job_name: &str,
        watermark: DateTime<Utc>,
    ) -> Result<(), WarehouseError> {
        let statement = format!(
            "UPDATE {} SET last_updated_at = $1 WHERE job_name = $2",
            self.metadata_table
        );

        self.client
            .execute(&statement, &[&watermark, &job_name])
            .await
            .map_err(|e| WarehouseError::MetadataError(format!("watermark write failed: {}", e)))?;

        info!(job = %job_name, watermark = %watermark, "watermark advanced");
        Ok(())
    }

    #[cfg(not(feature = "postgres"))]
    async fn set_watermark(
        &self,
        _job_name: &str,
        _watermark: DateTime<Utc>,
    ) -> Result<(), WarehouseError> {
        Err(WarehouseError::ConfigError(
            "PostgreSQL support not compiled. Rebuild with: cargo build --features postgres"
                .to_string(),
        ))
    }

    #[cfg(feature = "postgres")]
    async fn copy_from_staging(
        &self,
        staged: &StagedBatchRef,
        spec: &TableSpec,
    ) -> Result<(), WarehouseError> {
        let statement = self.copy_statement(staged, spec)?;

        self.client
            .batch_execute(&statement)
            .await
            .map_err(|e| WarehouseError::CopyError(format!("bulk copy failed: {}", e)))?;

        info!(table = %self.table, uri = %staged.uri(), "bulk copy complete");
        Ok(())
    }

    #[cfg(not(feature = "postgres"))]
    async fn copy_from_staging(
        &self,
        _staged: &StagedBatchRef,
        _spec: &TableSpec,
    ) -> Result<(), WarehouseError> {
        Err(WarehouseError::ConfigError(
            "PostgreSQL support not compiled. Rebuild with: cargo build --features postgres"
                .to_string(),
        ))
    }

    #[cfg(feature = "postgres")]
    async fn delete_duplicates(&self) -> Result<u64, WarehouseError> {
        let mut removed = self
            .client
            .execute(&keep_max_statement(&self.table), &[])
            .await
            .map_err(|e| WarehouseError::DedupError(format!("dedup delete failed: {}", e)))?;

        let [snapshot, delete, restore, cleanup] = collapse_ties_statements(&self.table);

        self.client
            .execute(&snapshot, &[])
            .await
            .map_err(|e| WarehouseError::DedupError(format!("tie snapshot failed: {}", e)))?;

        let deleted = self
            .client
            .execute(&delete, &[])
            .await
            .map_err(|e| WarehouseError::DedupError(format!("tie delete failed: {}", e)))?;

        let restored = self
            .client
            .execute(&restore, &[])
            .await
            .map_err(|e| WarehouseError::DedupError(format!("tie restore failed: {}", e)))?;

        self.client
            .execute(&cleanup, &[])
            .await
            .map_err(|e| WarehouseError::DedupError(format!("tie cleanup failed: {}", e)))?;

        removed += deleted.saturating_sub(restored);

        info!(table = %self.table, removed, "duplicates removed");
        Ok(removed)
    }

    #[cfg(not(feature = "postgres"))]
    async fn delete_duplicates(&self) -> Result<u64, WarehouseError> {
        Err(WarehouseError::ConfigError(
            "PostgreSQL support not compiled. Rebuild with: cargo build --features postgres"
                .to_string(),
        ))
    }

    #[cfg(feature = "postgres")]
    async fn test_connection(&self) -> Result<(), WarehouseError> {
        self.client
            .query("SELECT 1", &[])
            .await
            .map_err(|e| WarehouseError::QueryError(format!("Connection test failed: {}", e)))?;
        Ok(())
    }

    #[cfg(not(feature = "postgres"))]
    async fn test_connection(&self) -> Result<(), WarehouseError> {
        Err(WarehouseError::ConfigError(
            "PostgreSQL support not compiled. Rebuild with: cargo build --features postgres"
                .to_string(),
        ))
    }
}
