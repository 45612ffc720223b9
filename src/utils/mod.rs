//! Utilities Module

pub mod error;
pub mod logger;
pub mod money;

pub use error::{AppError, AppResponse, AppResult, ok};
