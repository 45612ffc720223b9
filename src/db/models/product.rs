//! Product Model

use serde::{Deserialize, Serialize};

use crate::utils::money::cents_to_string;

/// Product entity
///
/// `stock` 是稀缺可变资源，只能通过库存台账的条件递减修改，
/// 应用层禁止先读后写。
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: String,
    pub name: String,
    /// Price in cents
    pub price_cents: i64,
    /// Discount in percentage (e.g., 10 = 10%)
    pub discount_percent: i64,
    pub currency: String,
    pub stock: i64,
    pub is_active: bool,
}

/// API 视图：金额序列化为两位小数字符串
#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    pub id: String,
    pub name: String,
    pub price: String,
    pub discount_percent: i64,
    pub currency: String,
    pub stock: i64,
}

impl From<Product> for ProductView {
    fn from(p: Product) -> Self {
        Self {
            id: p.id,
            name: p.name,
            price: cents_to_string(p.price_cents),
            discount_percent: p.discount_percent,
            currency: p.currency,
            stock: p.stock,
        }
    }
}
