//! Database service for voucher-service.
//!
//! `Database` owns the SQLite pool. It is built once by the application,
//! migrated, handed to the ledger behind the [`VoucherStore`] trait, and
//! closed on shutdown so the WAL is checkpointed.

use crate::config::DatabaseConfig;
use crate::models::{NewVoucher, Voucher, VoucherStatus};
use crate::services::metrics::DB_QUERY_DURATION;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

const VOUCHER_COLUMNS: &str = "id, amount, currency, beneficiary, category, expires_at, status, created_at, redeemed_at, invoice_number";

/// Persistence operations the ledger relies on.
#[async_trait]
pub trait VoucherStore: Send + Sync {
    /// Insert a new voucher in `valid` state. A duplicate id is `AppError::Conflict`.
    async fn insert_voucher(&self, voucher: &NewVoucher) -> Result<Voucher, AppError>;

    async fn get_voucher(&self, id: &str) -> Result<Option<Voucher>, AppError>;

    /// Atomically mark an unredeemed voucher as redeemed.
    ///
    /// Returns `None` when no row was updated: either the id is unknown or
    /// the voucher was already redeemed.
    async fn redeem_voucher(
        &self,
        id: &str,
        redeemed_at: DateTime<Utc>,
        invoice_number: Option<&str>,
    ) -> Result<Option<Voucher>, AppError>;

    async fn ping(&self) -> Result<(), AppError>;
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the SQLite database described by `config`.
    #[instrument(skip(config), fields(service = "voucher-service", path = %config.path().display()))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        if !config.dir.as_os_str().is_empty() && !config.dir.exists() {
            info!(dir = %config.dir.display(), "Creating database directory");
            tokio::fs::create_dir_all(&config.dir).await.map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!(
                    "Failed to create database directory {}: {}",
                    config.dir.display(),
                    e
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(config.path())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!(
            max_connections = config.max_connections,
            "SQLite connection pool established"
        );

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Close every pooled connection. Further queries fail.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("SQLite connection pool closed");
    }
}

#[async_trait]
impl VoucherStore for Database {
    #[instrument(skip(self, voucher), fields(voucher_id = %voucher.id))]
    async fn insert_voucher(&self, voucher: &NewVoucher) -> Result<Voucher, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_voucher"])
            .start_timer();

        let query = format!(
            r#"
            INSERT INTO vouchers (id, amount, currency, beneficiary, category, expires_at, status, created_at, redeemed_at, invoice_number)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, NULL, ?)
            RETURNING {VOUCHER_COLUMNS}
            "#
        );

        let inserted = sqlx::query_as::<_, Voucher>(&query)
            .bind(&voucher.id)
            .bind(voucher.amount)
            .bind(&voucher.currency)
            .bind(&voucher.beneficiary)
            .bind(&voucher.category)
            .bind(voucher.expires_at)
            .bind(VoucherStatus::Valid)
            .bind(voucher.created_at)
            .bind(&voucher.invoice_number)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                    AppError::Conflict(anyhow::anyhow!(
                        "Voucher with id '{}' already exists",
                        voucher.id
                    ))
                }
                _ => AppError::DatabaseError(anyhow::anyhow!("Failed to insert voucher: {}", e)),
            })?;

        timer.observe_duration();

        Ok(inserted)
    }

    #[instrument(skip(self))]
    async fn get_voucher(&self, id: &str) -> Result<Option<Voucher>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_voucher"])
            .start_timer();

        let query = format!("SELECT {VOUCHER_COLUMNS} FROM vouchers WHERE id = ?");
        let voucher = sqlx::query_as::<_, Voucher>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get voucher: {}", e)))?;

        timer.observe_duration();

        Ok(voucher)
    }

    #[instrument(skip(self))]
    async fn redeem_voucher(
        &self,
        id: &str,
        redeemed_at: DateTime<Utc>,
        invoice_number: Option<&str>,
    ) -> Result<Option<Voucher>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["redeem_voucher"])
            .start_timer();

        // Check and write in one statement so concurrent redeems cannot both win.
        let query = format!(
            r#"
            UPDATE vouchers
            SET status = ?, redeemed_at = ?, invoice_number = COALESCE(?, invoice_number)
            WHERE id = ? AND status = ?
            RETURNING {VOUCHER_COLUMNS}
            "#
        );

        let voucher = sqlx::query_as::<_, Voucher>(&query)
            .bind(VoucherStatus::Redeemed)
            .bind(redeemed_at)
            .bind(invoice_number)
            .bind(id)
            .bind(VoucherStatus::Valid)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to redeem voucher: {}", e))
            })?;

        timer.observe_duration();

        Ok(voucher)
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.health_check().await
    }
}

#[cfg(test)]
pub(crate) async fn open_temp_database(dir: &std::path::Path) -> Database {
    let db = Database::connect(&DatabaseConfig {
        dir: dir.join("db"),
        file: "vouchers-test.db".to_string(),
        max_connections: 4,
    })
    .await
    .expect("Failed to open test database");
    db.run_migrations().await.expect("Failed to migrate");
    db
}
