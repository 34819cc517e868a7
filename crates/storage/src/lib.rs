use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

use shared::domain::{ContactQuery, PaymentSettings, QueryId};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct NewContactQuery<'a> {
    pub full_name: &'a str,
    pub phone_number: &'a str,
    pub subject: &'a str,
    pub message: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPaymentSettings {
    pub settings: PaymentSettings,
    pub qr_public_id: Option<String>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn insert_contact_query(&self, query: NewContactQuery<'_>) -> Result<QueryId> {
        let rec = sqlx::query(
            "INSERT INTO contact_queries (full_name, phone_number, subject, message, submitted_at)
             VALUES (?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(query.full_name)
        .bind(query.phone_number)
        .bind(query.subject)
        .bind(query.message)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .context("failed to insert contact query")?;
        let id = QueryId(rec.get::<i64, _>(0));
        debug!(query_id = id.0, "contact query stored");
        Ok(id)
    }

    /// Returns every contact query, newest first.
    pub async fn list_contact_queries(&self) -> Result<Vec<ContactQuery>> {
        let rows = sqlx::query(
            "SELECT id, full_name, phone_number, subject, message, submitted_at
             FROM contact_queries
             ORDER BY submitted_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| ContactQuery {
                id: QueryId(r.get::<i64, _>(0)),
                full_name: r.get::<String, _>(1),
                phone_number: r.get::<String, _>(2),
                subject: r.get::<String, _>(3),
                message: r.get::<String, _>(4),
                submitted_at: r.get::<DateTime<Utc>, _>(5),
            })
            .collect())
    }

    /// Deletes a contact query; `false` when no row had that id.
    pub async fn delete_contact_query(&self, id: QueryId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM contact_queries WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn load_payment_settings(&self) -> Result<Option<StoredPaymentSettings>> {
        let row = sqlx::query(
            "SELECT upi_id, upi_name, qr_code_url, qr_public_id, updated_at
             FROM payment_settings
             WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| StoredPaymentSettings {
            settings: PaymentSettings {
                upi_id: r.get::<String, _>(0),
                upi_name: r.get::<String, _>(1),
                qr_code: r.get::<Option<String>, _>(2),
                updated_at: Some(r.get::<DateTime<Utc>, _>(4)),
            },
            qr_public_id: r.get::<Option<String>, _>(3),
        }))
    }

    /// Upserts the UPI id and display name, leaving the QR code untouched.
    pub async fn save_payment_details(&self, upi_id: &str, upi_name: &str) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO payment_settings (id, upi_id, upi_name, created_at, updated_at)
             VALUES (1, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET upi_id=excluded.upi_id, upi_name=excluded.upi_name, updated_at=excluded.updated_at",
        )
        .bind(upi_id)
        .bind(upi_name)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("failed to save payment settings")?;
        Ok(())
    }

    /// Records a new QR code and returns the store id of the one it replaced.
    pub async fn set_qr_code(&self, url: &str, public_id: &str) -> Result<Option<String>> {
        let previous = self.current_qr_public_id().await?;
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO payment_settings (id, qr_code_url, qr_public_id, created_at, updated_at)
             VALUES (1, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET qr_code_url=excluded.qr_code_url, qr_public_id=excluded.qr_public_id, updated_at=excluded.updated_at",
        )
        .bind(url)
        .bind(public_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("failed to save qr code")?;
        Ok(previous)
    }

    /// Clears the QR code and returns the store id it pointed at.
    pub async fn clear_qr_code(&self) -> Result<Option<String>> {
        let previous = self.current_qr_public_id().await?;
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO payment_settings (id, created_at, updated_at)
             VALUES (1, ?, ?)
             ON CONFLICT(id) DO UPDATE SET qr_code_url=NULL, qr_public_id=NULL, updated_at=excluded.updated_at",
        )
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("failed to clear qr code")?;
        Ok(previous)
    }

    async fn current_qr_public_id(&self) -> Result<Option<String>> {
        let row = sqlx::query("SELECT qr_public_id FROM payment_settings WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.and_then(|r| r.get::<Option<String>, _>(0)))
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
