//! In-memory store.
//!
//! Mirrors the Postgres implementation's observable behavior, including
//! the unique order reference and the write-back of checkout stock.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{CartStore, CatalogStore, CustomerStore, OrderStore, StoreError};
use crate::domain::aggregates::{Carrier, Cart, Customer, Order, Product};

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    products: HashMap<Uuid, Product>,
    carriers: HashMap<Uuid, Carrier>,
    carts: HashMap<String, Cart>,
    orders: Vec<Order>,
    customers: HashMap<Uuid, Customer>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }
}

fn sorted_by_creation(mut products: Vec<Product>) -> Vec<Product> {
    products.sort_by_key(|p| (p.created_at(), p.id()));
    products
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        Ok(self.inner.lock().await.products.get(&id).cloned())
    }

    async fn products(&self) -> Result<Vec<Product>, StoreError> {
        Ok(sorted_by_creation(self.inner.lock().await.products.values().cloned().collect()))
    }

    async fn out_of_stock_products(&self) -> Result<Vec<Product>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(sorted_by_creation(inner.products.values().filter(|p| p.is_out_of_stock()).cloned().collect()))
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.products.contains_key(&product.id()) {
            return Err(StoreError::Conflict(format!("product {} already exists", product.id())));
        }
        inner.products.insert(product.id(), product.clone());
        Ok(())
    }

    async fn update_product_details(&self, product: &Product) -> Result<(), StoreError> {
        if let Some(stored) = self.inner.lock().await.products.get_mut(&product.id()) {
            let stock = stored.stock();
            *stored = Product::restore(product.id(), product.name().to_string(), product.price(), stock, stored.created_at(), product.updated_at());
        }
        Ok(())
    }

    async fn add_stock(&self, id: Uuid, quantity: u32) -> Result<Option<Product>, StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(product) = inner.products.get_mut(&id) else { return Ok(None) };
        product.restock(quantity).map_err(|e| StoreError::OutOfRange(format!("product {id}: {e}")))?;
        product.take_events();
        Ok(Some(product.clone()))
    }

    async fn carrier(&self, id: Uuid) -> Result<Option<Carrier>, StoreError> {
        Ok(self.inner.lock().await.carriers.get(&id).cloned())
    }

    async fn carriers(&self) -> Result<Vec<Carrier>, StoreError> {
        let mut carriers: Vec<Carrier> = self.inner.lock().await.carriers.values().cloned().collect();
        carriers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(carriers)
    }

    async fn insert_carrier(&self, carrier: &Carrier) -> Result<(), StoreError> {
        self.inner.lock().await.carriers.insert(carrier.id, carrier.clone());
        Ok(())
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn load_cart(&self, session: &str) -> Result<Cart, StoreError> {
        Ok(self.inner.lock().await.carts.get(session).cloned().unwrap_or_default())
    }

    async fn save_cart(&self, session: &str, cart: &Cart) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if cart.is_empty() {
            inner.carts.remove(session);
        } else {
            inner.carts.insert(session.to_string(), cart.clone());
        }
        Ok(())
    }

    async fn remove_cart(&self, session: &str) -> Result<(), StoreError> {
        self.inner.lock().await.carts.remove(session);
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn commit_checkout(&self, order: &Order, products: &[Product]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.orders.iter().any(|o| o.reference() == order.reference()) {
            return Err(StoreError::Conflict(format!("order reference {} already exists", order.reference())));
        }
        for product in products {
            inner.products.insert(product.id(), product.clone());
        }
        inner.orders.push(order.clone());
        Ok(())
    }

    async fn order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.inner.lock().await.orders.iter().find(|o| o.id() == id).cloned())
    }

    async fn order_by_reference(&self, reference: &str) -> Result<Option<Order>, StoreError> {
        Ok(self.inner.lock().await.orders.iter().find(|o| o.reference().as_str() == reference).cloned())
    }

    async fn orders(&self, limit: u32, offset: u32) -> Result<Vec<Order>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.orders.iter().rev().skip(offset as usize).take(limit as usize).cloned().collect())
    }

    async fn orders_created_between(&self, since: DateTime<Utc>, until: DateTime<Utc>) -> Result<Vec<Order>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.orders.iter().filter(|o| o.created_at() >= since && o.created_at() <= until).cloned().collect())
    }

    async fn all_orders(&self) -> Result<Vec<Order>, StoreError> {
        Ok(self.inner.lock().await.orders.clone())
    }

    async fn save_order_state(&self, order: &Order) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let stored = inner.orders.iter_mut().find(|o| o.id() == order.id())
            .ok_or_else(|| StoreError::Conflict(format!("order {} does not exist", order.id())))?;
        *stored = order.clone();
        Ok(())
    }
}

#[async_trait]
impl CustomerStore for MemoryStore {
    async fn customer(&self, id: Uuid) -> Result<Option<Customer>, StoreError> {
        Ok(self.inner.lock().await.customers.get(&id).cloned())
    }

    async fn insert_customer(&self, customer: &Customer) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.customers.values().any(|c| c.email().eq_ignore_ascii_case(customer.email())) {
            return Err(StoreError::Conflict(format!("email {} already registered", customer.email())));
        }
        inner.customers.insert(customer.id(), customer.clone());
        Ok(())
    }

    async fn save_phone_verification(&self, customer: &Customer) -> Result<(), StoreError> {
        self.inner.lock().await.customers.insert(customer.id(), customer.clone());
        Ok(())
    }
}
