//! Product Aggregate
//!
//! Stock is only ever changed through [`Product::decrement_stock`] and
//! [`Product::restock`], so it cannot go below zero or past [`MAX_STOCK`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;
use crate::domain::value_objects::{Money, Quantity};
use crate::domain::events::{DomainEvent, ProductEvent};

/// Largest stock a product may hold; matches the `INTEGER` column.
pub const MAX_STOCK: u32 = i32::MAX as u32;
/// Largest unit price in minor units. `MAX_PRICE * MAX_STOCK` stays inside `i64`.
pub const MAX_PRICE: i64 = 1_000_000_000;

fn check_price(price: Money) -> Result<(), ProductError> {
    match price.minor() {
        p if p < 0 => Err(ProductError::NegativePrice),
        p if p > MAX_PRICE => Err(ProductError::PriceTooHigh(MAX_PRICE)),
        _ => Ok(()),
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Product {
    id: Uuid,
    name: String,
    price: Money,
    stock: Quantity,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

impl Product {
    pub fn create(name: impl Into<String>, price: Money, stock: u32) -> Result<Self, ProductError> {
        let name = name.into();
        if name.trim().is_empty() { return Err(ProductError::MissingName); }
        check_price(price)?;
        if stock > MAX_STOCK { return Err(ProductError::StockLimit { limit: MAX_STOCK }); }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7(), name, price, stock: Quantity::new(stock),
            created_at: now, updated_at: now, events: vec![],
        })
    }

    /// Rebuild a product loaded from storage.
    pub fn restore(id: Uuid, name: String, price: Money, stock: u32, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        Self { id, name, price, stock: Quantity::new(stock), created_at, updated_at, events: vec![] }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn price(&self) -> Money { self.price }
    pub fn stock(&self) -> u32 { self.stock.value() }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    pub fn has_enough_stock(&self, requested: u32) -> bool { self.stock.value() >= requested }
    pub fn is_out_of_stock(&self) -> bool { self.stock.is_zero() }

    /// Remove `qty` units. Raises `OutOfStock` when this call empties the shelf.
    pub fn decrement_stock(&mut self, qty: u32) -> Result<(), ProductError> {
        let was_in_stock = !self.stock.is_zero();
        self.stock = self.stock.subtract(qty).ok_or(ProductError::InsufficientStock {
            requested: qty,
            available: self.stock.value(),
        })?;
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::StockDecremented {
            product_id: self.id, quantity: qty, remaining: self.stock.value(),
        }));
        if was_in_stock && self.stock.is_zero() {
            self.raise_event(DomainEvent::Product(ProductEvent::OutOfStock { product_id: self.id, name: self.name.clone() }));
        }
        Ok(())
    }

    pub fn restock(&mut self, qty: u32) -> Result<(), ProductError> {
        self.stock = self.stock.checked_add(qty)
            .filter(|s| s.value() <= MAX_STOCK)
            .ok_or(ProductError::StockLimit { limit: MAX_STOCK })?;
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::Restocked { product_id: self.id, quantity: qty }));
        Ok(())
    }

    pub fn rename(&mut self, name: impl Into<String>) -> Result<(), ProductError> {
        let name = name.into();
        if name.trim().is_empty() { return Err(ProductError::MissingName); }
        self.name = name;
        self.touch();
        Ok(())
    }

    pub fn update_price(&mut self, new_price: Money) -> Result<(), ProductError> {
        check_price(new_price)?;
        self.price = new_price;
        self.touch();
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductError {
    #[error("product name is required")]
    MissingName,
    #[error("price cannot be negative")]
    NegativePrice,
    #[error("price cannot exceed {0} minor units")]
    PriceTooHigh(i64),
    #[error("stock cannot exceed {limit} units")]
    StockLimit { limit: u32 },
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: u32, available: u32 },
}
