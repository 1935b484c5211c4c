//! Persistence capabilities.
//!
//! Services depend on these traits only. [`postgres::PgStore`] is the
//! production implementation; [`memory::MemoryStore`] backs tests and local
//! runs without a database.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{Carrier, Cart, Customer, Order, Product};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("value out of range: {0}")]
    OutOfRange(String),

    #[error("data corruption: {0}")]
    DataCorruption(String),
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn product(&self, id: Uuid) -> Result<Option<Product>, StoreError>;
    async fn products(&self) -> Result<Vec<Product>, StoreError>;
    async fn out_of_stock_products(&self) -> Result<Vec<Product>, StoreError>;
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError>;
    /// Writes name and price only; stock is left to the ledger operations.
    async fn update_product_details(&self, product: &Product) -> Result<(), StoreError>;
    /// Adds `quantity` to the stored stock in place and returns the updated
    /// product, or `None` when it does not exist.
    async fn add_stock(&self, id: Uuid, quantity: u32) -> Result<Option<Product>, StoreError>;
    async fn carrier(&self, id: Uuid) -> Result<Option<Carrier>, StoreError>;
    async fn carriers(&self) -> Result<Vec<Carrier>, StoreError>;
    async fn insert_carrier(&self, carrier: &Carrier) -> Result<(), StoreError>;
}

/// Session-keyed carts.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Missing sessions yield an empty cart.
    async fn load_cart(&self, session: &str) -> Result<Cart, StoreError>;
    async fn save_cart(&self, session: &str, cart: &Cart) -> Result<(), StoreError>;
    async fn remove_cart(&self, session: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist a new order, its line items and the products' new stock as one
    /// unit. Either all of it is written or none of it.
    async fn commit_checkout(&self, order: &Order, products: &[Product]) -> Result<(), StoreError>;
    async fn order(&self, id: Uuid) -> Result<Option<Order>, StoreError>;
    async fn order_by_reference(&self, reference: &str) -> Result<Option<Order>, StoreError>;
    /// Newest first.
    async fn orders(&self, limit: u32, offset: u32) -> Result<Vec<Order>, StoreError>;
    async fn orders_created_between(&self, since: DateTime<Utc>, until: DateTime<Utc>) -> Result<Vec<Order>, StoreError>;
    async fn all_orders(&self) -> Result<Vec<Order>, StoreError>;
    async fn save_order_state(&self, order: &Order) -> Result<(), StoreError>;
}

#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn customer(&self, id: Uuid) -> Result<Option<Customer>, StoreError>;
    async fn insert_customer(&self, customer: &Customer) -> Result<(), StoreError>;
    /// Writes phone number, verification flag and the OTP pair.
    async fn save_phone_verification(&self, customer: &Customer) -> Result<(), StoreError>;
}

/// Everything the application needs from storage.
pub trait Store: CatalogStore + CartStore + OrderStore + CustomerStore {}

impl<T> Store for T where T: CatalogStore + CartStore + OrderStore + CustomerStore {}
