//! Database Models

pub mod order;
pub mod product;
pub mod user;

pub use order::{
    Address, NewOrder, NewOrderItem, NewSubOrder, OrderDetail, OrderItemDetail, OrderItemRow,
    OrderRow, OrderStatus, OrderSummary, SubOrderDetail, SubOrderRow,
};
pub use product::{Product, ProductView};
pub use user::User;
