//! Order state changes and what follows them.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{Order, StateChange};
use crate::domain::value_objects::OrderState;
use crate::services::events::EventPublisher;
use crate::services::invoice::{Invoice, InvoiceRenderer, RenderError};
use crate::services::mail::{Attachment, Notifier};
use crate::store::{CustomerStore, OrderStore, Store, StoreError};

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order {0} not found")]
    NotFound(String),

    #[error("customer {0} not found")]
    CustomerNotFound(Uuid),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of [`OrderService::transition_order`]. `change` is `None` when the
/// order already was in the requested state.
#[derive(Clone, Debug)]
pub struct StateTransition {
    pub order: Order,
    pub change: Option<StateChange>,
}

/// Tells the customer about a state change, with the invoice attached.
#[derive(Clone)]
pub struct OrderStateWatcher {
    store: Arc<dyn Store>,
    notifier: Notifier,
    invoices: Arc<InvoiceRenderer>,
    attach_invoices: bool,
}

impl OrderStateWatcher {
    pub fn new(store: Arc<dyn Store>, notifier: Notifier, invoices: Arc<InvoiceRenderer>, attach_invoices: bool) -> Self {
        Self { store, notifier, invoices, attach_invoices }
    }

    /// Never fails: every problem is logged and the rest carries on.
    pub async fn state_changed(&self, order: &Order, change: StateChange) {
        let customer = match self.store.customer(order.customer_id()).await {
            Ok(Some(customer)) => customer,
            Ok(None) => {
                tracing::warn!(order = %order.reference(), customer_id = %order.customer_id(), "Order owner not found, no email sent");
                return;
            }
            Err(e) => {
                tracing::error!(order = %order.reference(), error = %e, "Failed to load order owner, no email sent");
                return;
            }
        };

        let attachment = if self.attach_invoices {
            match self.invoices.render(order, &customer, change.to.label()).await {
                Ok(invoice) => Some(Attachment::pdf(format!("invoice-{}.pdf", order.reference()), invoice.bytes)),
                Err(e) => {
                    tracing::error!(order = %order.reference(), error = %e, "Invoice rendering failed, sending without it");
                    None
                }
            }
        } else {
            None
        };

        self.notifier.order_state_changed(order, &customer, change, attachment).await;
    }
}

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
    watcher: OrderStateWatcher,
    invoices: Arc<InvoiceRenderer>,
    events: EventPublisher,
}

impl OrderService {
    pub fn new(store: Arc<dyn Store>, watcher: OrderStateWatcher, invoices: Arc<InvoiceRenderer>, events: EventPublisher) -> Self {
        Self { store, watcher, invoices, events }
    }

    async fn load(&self, order_id: Uuid) -> Result<Order, OrderError> {
        self.store.order(order_id).await?.ok_or_else(|| OrderError::NotFound(order_id.to_string()))
    }

    /// Move an order to `state`. Persists and notifies only on an actual change.
    pub async fn transition_order(&self, order_id: Uuid, state: OrderState) -> Result<StateTransition, OrderError> {
        let mut order = self.load(order_id).await?;
        let Some(change) = order.transition_to(state) else {
            tracing::debug!(order = %order.reference(), state = %state, "Order already in requested state");
            return Ok(StateTransition { order, change: None });
        };

        self.store.save_order_state(&order).await?;
        tracing::info!(order = %order.reference(), transition = %change.describe(), "Order state changed");

        self.watcher.state_changed(&order, change).await;
        self.events.publish_all(order.take_events()).await;
        Ok(StateTransition { order, change: Some(change) })
    }

    /// Render a fresh invoice for the back office.
    pub async fn regenerate_invoice(&self, order_id: Uuid) -> Result<Invoice, OrderError> {
        let order = self.load(order_id).await?;
        let customer = self.store.customer(order.customer_id()).await?
            .ok_or(OrderError::CustomerNotFound(order.customer_id()))?;
        Ok(self.invoices.render_with_note(&order, &customer, order.state().label(), "Generated manually").await?)
    }

    /// Invoice download for the customer, looked up by reference.
    pub async fn invoice_for_reference(&self, reference: &str) -> Result<Invoice, OrderError> {
        let order = self.store.order_by_reference(reference).await?
            .ok_or_else(|| OrderError::NotFound(reference.to_string()))?;
        let customer = self.store.customer(order.customer_id()).await?
            .ok_or(OrderError::CustomerNotFound(order.customer_id()))?;
        Ok(self.invoices.render(&order, &customer, order.state().label()).await?)
    }
}
