//! Out-of-stock alerting.

use std::sync::Arc;

use crate::services::mail::Notifier;
use crate::store::{CatalogStore, Store, StoreError};

#[derive(Clone)]
pub struct StockNotifier {
    store: Arc<dyn Store>,
    notifier: Notifier,
}

impl StockNotifier {
    pub fn new(store: Arc<dyn Store>, notifier: Notifier) -> Self { Self { store, notifier } }

    /// Send one alert per product with no stock left. Returns how many were sent.
    pub async fn alert_out_of_stock(&self) -> Result<usize, StoreError> {
        let products = self.store.out_of_stock_products().await?;
        for product in &products {
            self.notifier.low_stock_alert(product).await;
        }
        tracing::info!(count = products.len(), "Out-of-stock sweep finished");
        Ok(products.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::Product;
    use crate::domain::value_objects::Money;
    use crate::services::testing::{notifier, RecordingMailer};
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_alerts_once_per_empty_product() {
        let store = Arc::new(MemoryStore::new());
        for (name, stock) in [("Hat", 0), ("Belt", 3), ("Scarf", 0)] {
            store.insert_product(&Product::create(name, Money::from_minor(1000), stock).unwrap()).await.unwrap();
        }
        let mailer = Arc::new(RecordingMailer::default());
        let sweep = StockNotifier::new(store, notifier(mailer.clone(), 0));

        assert_eq!(sweep.alert_out_of_stock().await.unwrap(), 2);
        let mut subjects: Vec<String> = mailer.sent().into_iter().map(|m| m.subject).collect();
        subjects.sort();
        assert_eq!(subjects, vec!["Stock alert: Hat is out of stock", "Stock alert: Scarf is out of stock"]);
    }

    #[tokio::test]
    async fn test_nothing_to_report() {
        let mailer = Arc::new(RecordingMailer::default());
        let sweep = StockNotifier::new(Arc::new(MemoryStore::new()), notifier(mailer.clone(), 0));
        assert_eq!(sweep.alert_out_of_stock().await.unwrap(), 0);
        assert_eq!(mailer.attempts(), 0);
    }
}
