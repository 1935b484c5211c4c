//! Order Aggregate
//!
//! Orders copy everything they need at checkout time (delivery address,
//! carrier, product names and prices) so later catalog or account edits never
//! change a placed order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::aggregates::product::Product;
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::{Money, OrderReference, OrderState};

#[derive(Clone, Debug, Serialize)]
pub struct Order {
    id: Uuid,
    reference: OrderReference,
    customer_id: Uuid,
    created_at: DateTime<Utc>,
    delivery: String,
    carrier_name: String,
    carrier_price: Money,
    items: Vec<LineItem>,
    total: Money,
    state: OrderState,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: Uuid,
    pub product: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub total: Money,
}

impl LineItem {
    /// Snapshot the product's current name and price.
    pub fn snapshot(product: &Product, quantity: u32) -> Self {
        Self {
            id: Uuid::now_v7(),
            product: product.name().to_string(),
            quantity,
            unit_price: product.price(),
            total: product.price().multiply(quantity),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub company: Option<String>,
    pub street: String,
    pub postal_code: String,
    pub city: String,
    pub country: String,
}

impl DeliveryAddress {
    /// One line per field; an empty company is left out.
    pub fn snapshot(&self) -> String {
        let mut lines = vec![format!("{} {}", self.first_name, self.last_name), self.phone.clone()];
        if let Some(company) = self.company.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            lines.push(company.to_string());
        }
        lines.extend([self.street.clone(), self.postal_code.clone(), self.city.clone(), self.country.clone()]);
        lines.join("\n")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Carrier {
    pub id: Uuid,
    pub name: String,
    pub price: Money,
}

/// A state write that actually changed the value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct StateChange {
    pub from: OrderState,
    pub to: OrderState,
}

impl StateChange {
    pub fn describe(&self) -> String { format!("{} → {}", self.from.label(), self.to.label()) }
}

impl Order {
    pub fn place(customer_id: Uuid, address: &DeliveryAddress, carrier: &Carrier, items: Vec<LineItem>, created_at: DateTime<Utc>) -> Self {
        let mut order = Self {
            id: Uuid::now_v7(),
            reference: OrderReference::generate(created_at),
            customer_id,
            created_at,
            delivery: address.snapshot(),
            carrier_name: carrier.name.clone(),
            carrier_price: carrier.price,
            total: Money::ZERO,
            items,
            state: OrderState::Unpaid,
            events: vec![],
        };
        order.recalculate();
        order.raise_event(DomainEvent::Order(OrderEvent::Placed {
            order_id: order.id, reference: order.reference.to_string(), customer_id, total: order.total,
        }));
        order
    }

    /// Rebuild an order loaded from storage. The stored total is kept as is.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: Uuid, reference: OrderReference, customer_id: Uuid, created_at: DateTime<Utc>, delivery: String,
        carrier_name: String, carrier_price: Money, items: Vec<LineItem>, total: Money, state: OrderState,
    ) -> Self {
        Self { id, reference, customer_id, created_at, delivery, carrier_name, carrier_price, items, total, state, events: vec![] }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn reference(&self) -> &OrderReference { &self.reference }
    pub fn customer_id(&self) -> Uuid { self.customer_id }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn delivery(&self) -> &str { &self.delivery }
    pub fn carrier_name(&self) -> &str { &self.carrier_name }
    pub fn carrier_price(&self) -> Money { self.carrier_price }
    pub fn items(&self) -> &[LineItem] { &self.items }
    pub fn total(&self) -> Money { self.total }
    pub fn state(&self) -> OrderState { self.state }
    pub fn subtotal(&self) -> Money { self.items.iter().map(|i| i.total).sum() }

    /// Set a new state. Returns the change only when the value differs.
    /// Any state may follow any other; there is no enforced flow.
    pub fn transition_to(&mut self, state: OrderState) -> Option<StateChange> {
        if self.state == state { return None; }
        let change = StateChange { from: self.state, to: state };
        self.state = state;
        self.raise_event(DomainEvent::Order(OrderEvent::StateChanged {
            order_id: self.id, reference: self.reference.to_string(), from: change.from, to: change.to,
        }));
        Some(change)
    }

    fn recalculate(&mut self) { self.total = self.subtotal() + self.carrier_price; }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(company: Option<&str>) -> DeliveryAddress {
        DeliveryAddress {
            first_name: "Ada".into(), last_name: "Lovelace".into(), phone: "+33612345678".into(),
            company: company.map(Into::into), street: "12 rue des Lilas".into(), postal_code: "75011".into(),
            city: "Paris".into(), country: "FR".into(),
        }
    }

    fn carrier() -> Carrier { Carrier { id: Uuid::new_v4(), name: "Colissimo".into(), price: Money::from_minor(690) } }

    fn placed() -> Order {
        let boots = Product::create("Boots", Money::from_minor(8900), 5).unwrap();
        let socks = Product::create("Socks", Money::from_minor(450), 5).unwrap();
        Order::place(Uuid::new_v4(), &address(None), &carrier(), vec![LineItem::snapshot(&boots, 1), LineItem::snapshot(&socks, 3)], Utc::now())
    }

    #[test]
    fn test_order_total_includes_carrier() {
        let order = placed();
        assert_eq!(order.subtotal(), Money::from_minor(8900 + 1350));
        assert_eq!(order.total(), order.items().iter().map(|i| i.total).sum::<Money>() + order.carrier_price());
        assert_eq!(order.state(), OrderState::Unpaid);
        assert_eq!(order.carrier_name(), "Colissimo");
    }

    #[test]
    fn test_line_item_snapshot_is_stable() {
        let mut product = Product::create("Scarf", Money::from_minor(2000), 3).unwrap();
        let item = LineItem::snapshot(&product, 2);
        product.rename("Wool scarf").unwrap();
        product.update_price(Money::from_minor(2500)).unwrap();
        assert_eq!(item.product, "Scarf");
        assert_eq!(item.unit_price, Money::from_minor(2000));
        assert_eq!(item.total, Money::from_minor(4000));
    }

    #[test]
    fn test_delivery_snapshot() {
        assert_eq!(address(None).snapshot(), "Ada Lovelace\n+33612345678\n12 rue des Lilas\n75011\nParis\nFR");
        assert_eq!(address(Some("  ")).snapshot(), address(None).snapshot());
        assert!(address(Some("Analytical Engines")).snapshot().contains("\nAnalytical Engines\n"));
    }

    #[test]
    fn test_placing_raises_only_placed_event() {
        let mut order = placed();
        let events = order.take_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], DomainEvent::Order(OrderEvent::Placed { .. })));
    }

    #[test]
    fn test_transition_reports_change_once() {
        let mut order = placed();
        let change = order.transition_to(OrderState::Paid).unwrap();
        assert_eq!(change.describe(), "Unpaid → Paid");
        assert_eq!(order.transition_to(OrderState::Paid), None);
    }

    #[test]
    fn test_backward_transition_is_not_blocked() {
        let mut order = placed();
        order.transition_to(OrderState::Shipped);
        let change = order.transition_to(OrderState::Unpaid).unwrap();
        assert_eq!(change, StateChange { from: OrderState::Shipped, to: OrderState::Unpaid });
    }
}
