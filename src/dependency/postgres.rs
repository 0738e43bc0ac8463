//! PostgreSQL schema store.
//!
//! # Design Decisions
//! - The pool connects lazily; the first probe is the first connection attempt
//! - Migration lock is a session-level `pg_advisory_lock` on one dedicated connection
//! - A lock dropped without release detaches its connection so closing it frees the lock
//! - Each step runs in a transaction together with its `schema_migrations` row

use std::time::Duration;

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use sqlx::{Connection, Executor, Postgres};

use crate::config::DatabaseConfig;
use crate::dependency::store::{ProbeResult, SchemaLock, SchemaStore, StoreError};
use crate::migration::{MigrationStep, SchemaVersion};

const CREATE_VERSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version BIGINT PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed => StoreError::Connection(e.to_string()),
            other => StoreError::Query(other.to_string()),
        }
    }
}

/// Classify a probe failure: transport problems are unreachable, anything
/// the server itself answered with is unhealthy.
fn classify(e: sqlx::Error) -> ProbeResult {
    match e {
        sqlx::Error::Database(db) => ProbeResult::Unhealthy(db.message().to_string()),
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Configuration(_) => ProbeResult::Unreachable(e.to_string()),
        other => ProbeResult::Unhealthy(other.to_string()),
    }
}

/// PostgreSQL-backed schema store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a lazily-connecting store.
    ///
    /// `acquire_timeout` bounds how long one probe may wait for a connection.
    pub fn connect_lazy(
        config: &DatabaseConfig,
        acquire_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_lazy(&config.url)
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl SchemaStore for PostgresStore {
    async fn probe(&self) -> ProbeResult {
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => ProbeResult::Healthy,
            Err(e) => classify(e),
        }
    }

    async fn lock(&self, key: i64) -> Result<Box<dyn SchemaLock>, StoreError> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query("SELECT pg_advisory_lock($1)")
            .bind(key)
            .execute(&mut *conn)
            .await
            .map_err(|e| StoreError::Lock(e.to_string()))?;

        let mut lock = PgSchemaLock {
            conn: Some(conn),
            key,
        };
        lock.conn()?
            .execute(sqlx::raw_sql(CREATE_VERSION_TABLE))
            .await?;

        Ok(Box::new(lock))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

struct PgSchemaLock {
    conn: Option<PoolConnection<Postgres>>,
    key: i64,
}

impl PgSchemaLock {
    fn conn(&mut self) -> Result<&mut PgConnection, StoreError> {
        self.conn.as_deref_mut().ok_or(StoreError::Closed)
    }
}

#[async_trait]
impl SchemaLock for PgSchemaLock {
    async fn current_version(&mut self) -> Result<SchemaVersion, StoreError> {
        let version: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
                .fetch_one(self.conn()?)
                .await?;

        u32::try_from(version)
            .map(SchemaVersion::new)
            .map_err(|_| StoreError::Query(format!("recorded version {version} is out of range")))
    }

    async fn apply_step(&mut self, step: &MigrationStep) -> Result<(), StoreError> {
        let mut tx = self.conn()?.begin().await?;

        (&mut *tx).execute(sqlx::raw_sql(step.sql)).await?;
        sqlx::query("INSERT INTO schema_migrations (version, name) VALUES ($1, $2)")
            .bind(i64::from(step.version.get()))
            .bind(step.name)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn release(mut self: Box<Self>) -> Result<(), StoreError> {
        let key = self.key;
        let unlocked: bool = sqlx::query_scalar("SELECT pg_advisory_unlock($1)")
            .bind(key)
            .fetch_one(self.conn()?)
            .await
            .map_err(|e| StoreError::Lock(e.to_string()))?;

        if !unlocked {
            return Err(StoreError::Lock(format!(
                "advisory lock {key} was not held by this session"
            )));
        }

        // Unlocked cleanly; hand the connection back to the pool.
        self.conn.take();
        Ok(())
    }
}

impl Drop for PgSchemaLock {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            tracing::warn!(key = self.key, "Migration lock dropped while held; closing its connection");
            drop(conn.detach());
        }
    }
}
