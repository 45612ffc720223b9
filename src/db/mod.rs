//! Database Module
//!
//! Handles SQLite connection pool and migrations

pub mod models;
pub mod repository;

use crate::utils::AppError;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::str::FromStr;

/// Database service — owns a SQLite connection pool
#[derive(Clone)]
pub struct DbService {
    pub pool: SqlitePool,
}

impl DbService {
    /// Create a new database service with WAL mode
    pub async fn new(db_path: &str) -> Result<Self, AppError> {
        // Build connection options: WAL, foreign keys, normal sync
        // busy_timeout: 写冲突时等待 5s 而非立即失败 (锁槽等待上限)
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))
            .map_err(|e| AppError::database(format!("Invalid database path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_millis(5000))
            .pragma("foreign_keys", "ON")
            .optimize_on_close(true, None);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| AppError::database(format!("Failed to open database: {e}")))?;

        tracing::info!("Database connection established (SQLite WAL, busy_timeout=5000ms)");

        // Run migrations (ignore previously applied but now removed migrations)
        sqlx::migrate!("./migrations")
            .set_ignore_missing(true)
            .run(&pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to apply migrations: {e}")))?;
        tracing::info!("Database migrations applied");

        Ok(Self { pool })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared test fixtures: real SQLite files in temp dirs.

    use super::DbService;
    use chrono::Utc;
    use tempfile::TempDir;

    /// Open a fresh migrated database. Keep the TempDir alive for the
    /// duration of the test.
    pub async fn test_db() -> (DbService, TempDir) {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("test.db");
        let db = DbService::new(path.to_str().expect("utf8 path"))
            .await
            .expect("open test db");
        (db, dir)
    }

    pub async fn seed_user(db: &DbService, id: &str, role: &str) {
        sqlx::query("INSERT INTO users (id, email, name, role, created_at) VALUES (?1, ?2, ?3, ?4, ?5)")
            .bind(id)
            .bind(format!("{id}@example.com"))
            .bind(format!("User {id}"))
            .bind(role)
            .bind(Utc::now())
            .execute(&db.pool)
            .await
            .expect("seed user");
    }

    pub async fn seed_product(
        db: &DbService,
        id: &str,
        price_cents: i64,
        discount_percent: i64,
        stock: i64,
    ) {
        sqlx::query(
            "INSERT INTO products (id, name, price_cents, discount_percent, currency, stock, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, 'usd', ?5, 1, ?6)",
        )
        .bind(id)
        .bind(format!("Product {id}"))
        .bind(price_cents)
        .bind(discount_percent)
        .bind(stock)
        .bind(Utc::now())
        .execute(&db.pool)
        .await
        .expect("seed product");
    }

    pub async fn stock_of(db: &DbService, product_id: &str) -> i64 {
        let (stock,): (i64,) = sqlx::query_as("SELECT stock FROM products WHERE id = ?1")
            .bind(product_id)
            .fetch_one(&db.pool)
            .await
            .expect("stock");
        stock
    }
}
