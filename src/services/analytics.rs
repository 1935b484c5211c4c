//! Sales figures for the back office.
//!
//! Only orders that reached `Preparing` count as sales. Amounts are line
//! totals, so shipping is excluded.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::domain::aggregates::Order;
use crate::domain::value_objects::{Money, OrderState};
use crate::store::{CatalogStore, OrderStore, Store, StoreError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DailySales {
    pub date: NaiveDate,
    pub total_sales: Money,
    pub order_count: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct GlobalStats {
    pub total_sales: Money,
    pub order_count: u32,
    pub average_basket: Money,
    pub out_of_stock: u32,
}

fn counts_as_sale(order: &Order) -> bool { order.state() >= OrderState::Preparing }

/// Per-day totals, oldest first. Days without sales are absent.
pub fn daily_sales<'a>(orders: impl IntoIterator<Item = &'a Order>) -> Vec<DailySales> {
    let mut days: BTreeMap<NaiveDate, (Money, u32)> = BTreeMap::new();
    for order in orders.into_iter().filter(|o| counts_as_sale(o) && !o.items().is_empty()) {
        let day = days.entry(order.created_at().date_naive()).or_insert((Money::ZERO, 0));
        day.0 = day.0 + order.subtotal();
        day.1 += 1;
    }
    days.into_iter()
        .map(|(date, (total_sales, order_count))| DailySales { date, total_sales, order_count })
        .collect()
}

pub fn global_stats<'a>(orders: impl IntoIterator<Item = &'a Order>, out_of_stock: u32) -> GlobalStats {
    let (total_sales, order_count) = orders.into_iter()
        .filter(|o| counts_as_sale(o))
        .fold((Money::ZERO, 0u32), |(total, count), o| (total + o.subtotal(), count + 1));
    let average_basket = if order_count == 0 {
        Money::ZERO
    } else {
        Money::from_minor(total_sales.minor() / i64::from(order_count))
    };
    GlobalStats { total_sales, order_count, average_basket, out_of_stock }
}

#[derive(Clone)]
pub struct SalesAnalytics {
    store: Arc<dyn Store>,
}

impl SalesAnalytics {
    pub fn new(store: Arc<dyn Store>) -> Self { Self { store } }

    pub async fn daily_sales(&self, since: DateTime<Utc>, until: DateTime<Utc>) -> Result<Vec<DailySales>, StoreError> {
        Ok(daily_sales(&self.store.orders_created_between(since, until).await?))
    }

    pub async fn global_stats(&self) -> Result<GlobalStats, StoreError> {
        let orders = self.store.all_orders().await?;
        let out_of_stock = u32::try_from(self.store.out_of_stock_products().await?.len()).unwrap_or(u32::MAX);
        Ok(global_stats(&orders, out_of_stock))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;
    use crate::domain::aggregates::{Carrier, DeliveryAddress, LineItem, Product};

    fn order(day: u32, state: OrderState, lines: &[(i64, u32)]) -> Order {
        let carrier = Carrier { id: Uuid::new_v4(), name: "Relay".into(), price: Money::from_minor(500) };
        let items = lines.iter()
            .map(|&(price, qty)| LineItem::snapshot(&Product::create("Item", Money::from_minor(price), 10).unwrap(), qty))
            .collect();
        let created = Utc.with_ymd_and_hms(2024, 3, day, 10, 0, 0).unwrap();
        let mut order = Order::place(Uuid::new_v4(), &DeliveryAddress::default(), &carrier, items, created);
        order.transition_to(state);
        order
    }

    #[test]
    fn test_daily_sales_ignores_early_states() {
        let orders = vec![
            order(2, OrderState::Shipped, &[(1000, 2)]),
            order(1, OrderState::Preparing, &[(1500, 1)]),
            order(2, OrderState::Preparing, &[(300, 1), (200, 1)]),
            order(2, OrderState::Paid, &[(9999, 1)]),
            order(3, OrderState::Unpaid, &[(9999, 1)]),
        ];
        let days = daily_sales(&orders);
        assert_eq!(days, vec![
            DailySales { date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), total_sales: Money::from_minor(1500), order_count: 1 },
            DailySales { date: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(), total_sales: Money::from_minor(2500), order_count: 2 },
        ]);
    }

    #[test]
    fn test_global_stats() {
        let orders = vec![
            order(1, OrderState::Preparing, &[(1000, 1)]),
            order(1, OrderState::Shipped, &[(1000, 1), (1, 1)]),
            order(1, OrderState::Paid, &[(5000, 1)]),
        ];
        let stats = global_stats(&orders, 4);
        assert_eq!(stats.total_sales, Money::from_minor(2001));
        assert_eq!(stats.order_count, 2);
        assert_eq!(stats.average_basket, Money::from_minor(1000));
        assert_eq!(stats.out_of_stock, 4);
    }

    #[test]
    fn test_no_sales() {
        assert_eq!(global_stats(&Vec::<Order>::new(), 0), GlobalStats::default());
        assert!(daily_sales(&Vec::<Order>::new()).is_empty());
    }
}
