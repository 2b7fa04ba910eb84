pub mod api_error;
pub mod app;
pub mod auth_handlers;
pub mod config;
pub mod db;
pub mod franchise_handlers;
pub mod metrics;
pub mod order_handlers;
pub mod user_handlers;

pub use app::{api_router, AppState};
