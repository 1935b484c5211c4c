//! Turning a cart into an order.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartDetails, DeliveryAddress, LineItem, Order, Product, ProductError};
use crate::services::events::EventPublisher;
use crate::services::mail::Notifier;
use crate::store::{CartStore, CatalogStore, CustomerStore, OrderStore, Store, StoreError};

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("insufficient stock for {product}: requested {requested}, available {available}")]
    InsufficientStock { product: String, requested: u32, available: u32 },

    #[error("customer {0} not found")]
    CustomerNotFound(Uuid),

    #[error("carrier {0} not found")]
    CarrierNotFound(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Resolve every product in `cart` against the catalog, at current prices.
pub async fn cart_details(store: &dyn Store, cart: &Cart) -> Result<CartDetails, StoreError> {
    let mut products = HashMap::new();
    for id in cart.product_ids() {
        if let Some(product) = store.product(id).await? {
            products.insert(id, product);
        }
    }
    Ok(cart.details(|id| products.remove(&id)))
}

#[derive(Clone)]
pub struct CheckoutService {
    store: Arc<dyn Store>,
    notifier: Notifier,
    events: EventPublisher,
}

impl CheckoutService {
    pub fn new(store: Arc<dyn Store>, notifier: Notifier, events: EventPublisher) -> Self {
        Self { store, notifier, events }
    }

    pub async fn place_order(&self, session: &str, customer_id: Uuid, address: &DeliveryAddress, carrier_id: Uuid) -> Result<Order, CheckoutError> {
        let cart = self.store.load_cart(session).await?;
        let details = cart_details(self.store.as_ref(), &cart).await?;
        if details.lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let customer = self.store.customer(customer_id).await?.ok_or(CheckoutError::CustomerNotFound(customer_id))?;
        let carrier = self.store.carrier(carrier_id).await?.ok_or(CheckoutError::CarrierNotFound(carrier_id))?;

        if let Some(line) = details.lines.iter().find(|l| !l.product.has_enough_stock(l.quantity)) {
            tracing::info!(session = %session, product_id = %line.product.id(), "Checkout rejected, insufficient stock");
            return Err(CheckoutError::InsufficientStock {
                product: line.product.name().to_string(),
                requested: line.quantity,
                available: line.product.stock(),
            });
        }

        let mut products: Vec<Product> = Vec::with_capacity(details.lines.len());
        let mut items = Vec::with_capacity(details.lines.len());
        let mut sold_out = Vec::new();
        for line in details.lines {
            let mut product = line.product;
            product.decrement_stock(line.quantity).map_err(|e| stock_error(&product, e))?;
            if product.is_out_of_stock() {
                sold_out.push(product.clone());
            }
            items.push(LineItem::snapshot(&product, line.quantity));
            products.push(product);
        }

        let mut order = Order::place(customer.id(), address, &carrier, items, Utc::now());
        self.store.commit_checkout(&order, &products).await?;
        self.store.remove_cart(session).await?;

        tracing::info!(
            order = %order.reference(),
            customer_id = %customer.id(),
            total = %order.total(),
            lines = order.items().len(),
            "Order placed"
        );

        for product in &sold_out {
            self.notifier.low_stock_alert(product).await;
        }
        self.notifier.order_confirmation(&order, &customer).await;
        let mut events = order.take_events();
        for product in &mut products {
            events.extend(product.take_events());
        }
        self.events.publish_all(events).await;

        Ok(order)
    }
}

fn stock_error(product: &Product, error: ProductError) -> CheckoutError {
    match error {
        ProductError::InsufficientStock { requested, available } => {
            CheckoutError::InsufficientStock { product: product.name().to_string(), requested, available }
        }
        other => CheckoutError::Store(StoreError::DataCorruption(format!("product {}: {other}", product.id()))),
    }
}
