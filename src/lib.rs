//! Boutique Commerce
//!
//! Order lifecycle for a small online shop.
//!
//! ## Features
//! - Product catalog with a stock ledger and out-of-stock alerts
//! - Session carts and checkout with stock reservation
//! - Phone verification by SMS one-time code
//! - Order state tracking with customer notifications
//! - PDF invoices with a chain of rendering backends
//! - Sales analytics for the back office

pub mod config;
pub mod domain;
pub mod error;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;

pub use config::AppConfig;
pub use error::AppError;
pub use state::AppState;
