//! Inventory Ledger
//!
//! 库存台账：原子的 "为商品 P 预留 N 件" 原语。
//!
//! 递减是单条条件 UPDATE (`stock >= qty` 守卫)，由数据库行级原子性
//! 保证同一商品上的并发预留可串行化。整批全有或全无：任何一件失败
//! 都会让外层事务回滚，已执行的递减一并撤销。

use sqlx::SqliteConnection;

use super::{RepoError, RepoResult};

/// 一次预留中的一行
#[derive(Debug, Clone)]
pub struct ReserveLine {
    pub product_id: String,
    pub quantity: i64,
}

pub struct InventoryLedger;

impl InventoryLedger {
    /// Reserve stock for every line, all-or-nothing.
    ///
    /// Must be called inside the order-creation transaction; errors abort
    /// the whole reservation via rollback. `rows_affected == 0` is
    /// disambiguated with an existence probe: missing product vs. not
    /// enough stock.
    pub async fn reserve(conn: &mut SqliteConnection, lines: &[ReserveLine]) -> RepoResult<()> {
        for line in lines {
            if line.quantity <= 0 {
                return Err(RepoError::Validation(format!(
                    "Quantity must be positive for product {}",
                    line.product_id
                )));
            }

            let result = sqlx::query(
                "UPDATE products SET stock = stock - ?1
                 WHERE id = ?2 AND is_active = 1 AND stock >= ?1",
            )
            .bind(line.quantity)
            .bind(&line.product_id)
            .execute(&mut *conn)
            .await?;

            if result.rows_affected() == 0 {
                let exists: Option<(i64,)> =
                    sqlx::query_as("SELECT 1 FROM products WHERE id = ?1 AND is_active = 1")
                        .bind(&line.product_id)
                        .fetch_optional(&mut *conn)
                        .await?;

                return Err(match exists {
                    Some(_) => RepoError::InsufficientStock(line.product_id.clone()),
                    None => RepoError::NotFound(format!("Product {}", line.product_id)),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::{seed_product, stock_of, test_db};

    fn line(product_id: &str, quantity: i64) -> ReserveLine {
        ReserveLine {
            product_id: product_id.to_string(),
            quantity,
        }
    }

    #[tokio::test]
    async fn reserves_stock_and_decrements_once() {
        let (db, _dir) = test_db().await;
        seed_product(&db, "p1", 1000, 0, 5).await;

        let mut tx = db.pool.begin().await.unwrap();
        InventoryLedger::reserve(&mut tx, &[line("p1", 2)])
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(stock_of(&db, "p1").await, 3);
    }

    #[tokio::test]
    async fn fails_on_insufficient_stock() {
        let (db, _dir) = test_db().await;
        seed_product(&db, "p1", 1000, 0, 1).await;

        let mut tx = db.pool.begin().await.unwrap();
        let err = InventoryLedger::reserve(&mut tx, &[line("p1", 2)])
            .await
            .unwrap_err();
        drop(tx); // rollback

        assert!(matches!(err, RepoError::InsufficientStock(p) if p == "p1"));
        assert_eq!(stock_of(&db, "p1").await, 1);
    }

    #[tokio::test]
    async fn fails_on_unknown_product() {
        let (db, _dir) = test_db().await;

        let mut tx = db.pool.begin().await.unwrap();
        let err = InventoryLedger::reserve(&mut tx, &[line("ghost", 1)])
            .await
            .unwrap_err();
        drop(tx);

        assert!(matches!(err, RepoError::NotFound(_)));
    }

    #[tokio::test]
    async fn batch_is_all_or_nothing() {
        let (db, _dir) = test_db().await;
        seed_product(&db, "p1", 1000, 0, 5).await;
        seed_product(&db, "p2", 500, 0, 1).await;

        // p1 succeeds, p2 fails -> rollback must restore p1
        let mut tx = db.pool.begin().await.unwrap();
        let err = InventoryLedger::reserve(&mut tx, &[line("p1", 3), line("p2", 2)])
            .await
            .unwrap_err();
        tx.rollback().await.unwrap();

        assert!(matches!(err, RepoError::InsufficientStock(p) if p == "p2"));
        assert_eq!(stock_of(&db, "p1").await, 5);
        assert_eq!(stock_of(&db, "p2").await, 1);
    }

    #[tokio::test]
    async fn concurrent_reservations_never_oversell() {
        let (db, _dir) = test_db().await;
        seed_product(&db, "p1", 1000, 0, 3).await;

        // Two carts of 2 against stock 3: at most one commits
        let db_a = db.clone();
        let db_b = db.clone();

        let reserve = |db: crate::db::DbService| async move {
            let mut tx = db.pool.begin().await.unwrap();
            let res = InventoryLedger::reserve(&mut tx, &[line("p1", 2)]).await;
            match res {
                Ok(()) => {
                    tx.commit().await.unwrap();
                    true
                }
                Err(_) => {
                    tx.rollback().await.unwrap();
                    false
                }
            }
        };

        let (a, b) = tokio::join!(reserve(db_a), reserve(db_b));

        let stock = stock_of(&db, "p1").await;
        assert!(stock >= 0, "stock must never go negative");
        let winners = [a, b].iter().filter(|w| **w).count();
        assert!(winners <= 1, "at most one reservation may win");
        assert_eq!(stock, 3 - 2 * winners as i64);
    }
}
