//! Application services: the workflows that sit between the HTTP layer and the
//! domain, plus the adapters for mail, SMS, PDF and event delivery.

pub mod analytics;
pub mod checkout;
pub mod events;
pub mod invoice;
pub mod mail;
pub mod orders;
pub mod phone;
pub mod sms;
pub mod stock;

#[cfg(test)]
pub(crate) mod testing;

pub use analytics::SalesAnalytics;
pub use checkout::{CheckoutError, CheckoutService};
pub use events::EventPublisher;
pub use invoice::{Invoice, InvoiceRenderer};
pub use mail::Notifier;
pub use orders::{OrderService, OrderStateWatcher, StateTransition};
pub use phone::{OtpDelivery, PhoneVerifier};
pub use stock::StockNotifier;
