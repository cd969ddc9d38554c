pub mod auth;
pub mod error;
pub mod geo;
pub mod listing;
pub mod logging;
pub mod models;
pub mod orm;
pub mod payments;
pub mod reports;
pub mod router;
pub mod settings;
pub mod storage;
pub mod template;
pub mod views;

pub use error::{AppError, AppResult};
