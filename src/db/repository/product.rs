//! Product Repository

use sqlx::{SqliteConnection, SqlitePool};

use super::RepoResult;
use crate::db::models::Product;

#[derive(Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Find all active products
    pub async fn find_all(&self) -> RepoResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT id, name, price_cents, discount_percent, currency, stock, is_active
             FROM products WHERE is_active = 1 ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    /// Find product by id
    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            "SELECT id, name, price_cents, discount_percent, currency, stock, is_active
             FROM products WHERE id = ?1 AND is_active = 1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    /// Find product by id inside an open transaction
    ///
    /// 下单事务里用这个版本读取价格快照，保证价格和库存预留
    /// 落在同一个原子步骤里。
    pub async fn find_by_id_tx(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> RepoResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            "SELECT id, name, price_cents, discount_percent, currency, stock, is_active
             FROM products WHERE id = ?1 AND is_active = 1",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(product)
    }
}
