//! 金额工具
//!
//! 金额一律以整数分 (minor units) 存储，序列化为两位小数字符串。
//! 折扣计算使用 rust_decimal 保证精度。

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// 分 -> 两位小数字符串，如 1800 -> "18.00"
pub fn cents_to_string(cents: i64) -> String {
    Decimal::new(cents, 2).to_string()
}

/// 下单时的单价快照：`price * (1 - discount/100)`，四舍五入到分
///
/// `discount_percent` 已由 schema 约束在 0..=100。
pub fn discounted_unit_price_cents(price_cents: i64, discount_percent: i64) -> i64 {
    let price = Decimal::new(price_cents, 0);
    let factor = Decimal::new(100 - discount_percent, 2);
    (price * factor)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(price_cents)
}

/// 货币代码校验：三位 ASCII 字母
pub fn is_valid_currency(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_cents_with_two_decimals() {
        assert_eq!(cents_to_string(1800), "18.00");
        assert_eq!(cents_to_string(0), "0.00");
        assert_eq!(cents_to_string(905), "9.05");
    }

    #[test]
    fn applies_discount_exactly() {
        // 10.00 with 10% off -> 9.00
        assert_eq!(discounted_unit_price_cents(1000, 10), 900);
        assert_eq!(discounted_unit_price_cents(1000, 0), 1000);
        assert_eq!(discounted_unit_price_cents(1000, 100), 0);
    }

    #[test]
    fn rounds_half_cent_away_from_zero() {
        // 9.99 with 10% off = 8.991 -> 8.99
        assert_eq!(discounted_unit_price_cents(999, 10), 899);
        // 0.05 with 50% off = 0.025 -> 0.03
        assert_eq!(discounted_unit_price_cents(5, 50), 3);
    }

    #[test]
    fn validates_currency_codes() {
        assert!(is_valid_currency("usd"));
        assert!(is_valid_currency("EUR"));
        assert!(!is_valid_currency("us"));
        assert!(!is_valid_currency("usdd"));
        assert!(!is_valid_currency("u1d"));
    }
}
