//! Shared application state.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{
    invoice::InvoiceRenderer,
    mail::{MailTransport, NotifierSettings},
    phone::SmsSender,
    sms::SmsTransport,
    CheckoutService, EventPublisher, Notifier, OrderService, OrderStateWatcher, PhoneVerifier, SalesAnalytics,
    StockNotifier,
};
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub notifier: Notifier,
    pub events: EventPublisher,
    pub checkout: CheckoutService,
    pub orders: OrderService,
    pub phone: PhoneVerifier,
    pub stock: StockNotifier,
    pub analytics: SalesAnalytics,
}

/// Outbound adapters chosen at startup.
pub struct Transports {
    pub mail: Arc<dyn MailTransport>,
    pub sms: Option<Arc<dyn SmsTransport>>,
    pub invoices: InvoiceRenderer,
    pub events: EventPublisher,
}

impl AppState {
    pub fn new(config: &AppConfig, store: Arc<dyn Store>, transports: Transports) -> Self {
        let Transports { mail, sms, invoices, events } = transports;
        let notifier = Notifier::new(mail, NotifierSettings::from_config(config));
        let invoices = Arc::new(invoices);

        let sms = match (sms, &config.sms) {
            (Some(transport), Some(sms_config)) => Some(SmsSender { transport, from_number: sms_config.from_number.clone() }),
            _ => None,
        };

        let watcher = OrderStateWatcher::new(store.clone(), notifier.clone(), invoices.clone(), config.invoice.attach_to_emails);
        Self {
            checkout: CheckoutService::new(store.clone(), notifier.clone(), events.clone()),
            orders: OrderService::new(store.clone(), watcher, invoices, events.clone()),
            phone: PhoneVerifier::new(store.clone(), sms, config.shop_name.clone()),
            stock: StockNotifier::new(store.clone(), notifier.clone()),
            analytics: SalesAnalytics::new(store.clone()),
            store,
            notifier,
            events,
        }
    }
}
