//! Domain events
use crate::domain::value_objects::{Money, OrderState};
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DomainEvent {
    Product(ProductEvent),
    Order(OrderEvent),
}

impl DomainEvent {
    /// Subject the event is published under.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Product(ProductEvent::StockDecremented { .. }) => "product.stock_decremented",
            Self::Product(ProductEvent::OutOfStock { .. }) => "product.out_of_stock",
            Self::Product(ProductEvent::Restocked { .. }) => "product.restocked",
            Self::Order(OrderEvent::Placed { .. }) => "order.placed",
            Self::Order(OrderEvent::StateChanged { .. }) => "order.state_changed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProductEvent {
    StockDecremented { product_id: Uuid, quantity: u32, remaining: u32 },
    OutOfStock { product_id: Uuid, name: String },
    Restocked { product_id: Uuid, quantity: u32 },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: Uuid, reference: String, customer_id: Uuid, total: Money },
    StateChanged { order_id: Uuid, reference: String, from: OrderState, to: OrderState },
}
