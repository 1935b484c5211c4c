//! Postgres store.
//!
//! Checkout runs in a single transaction. Stock is written back as the value
//! computed in memory by the caller; no row lock is taken between the stock
//! check and the write, so two concurrent checkouts can oversell.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use super::{CartStore, CatalogStore, CustomerStore, OrderStore, StoreError};
use crate::domain::aggregates::{Carrier, Cart, CartItem, Customer, LineItem, Order, OtpChallenge, Product};
use crate::domain::value_objects::{Money, OrderReference, OrderState, OtpCode};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow { id: Uuid, name: String, price: i64, stock: i32, created_at: DateTime<Utc>, updated_at: DateTime<Utc> }

#[derive(Debug, sqlx::FromRow)]
struct CarrierRow { id: Uuid, name: String, price: i64 }

#[derive(Debug, sqlx::FromRow)]
struct CartItemRow { product_id: Uuid, quantity: i32 }

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid, reference: String, customer_id: Uuid, created_at: DateTime<Utc>, delivery: String,
    carrier_name: String, carrier_price: i64, total: i64, state: i16,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow { id: Uuid, order_id: Uuid, product: String, quantity: i32, price: i64, total: i64 }

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: Uuid, email: String, full_name: String, phone_number: Option<String>, is_phone_verified: bool,
    otp_code: Option<String>, otp_expires: Option<DateTime<Utc>>, created_at: DateTime<Utc>,
}

const ORDER_COLUMNS: &str = "id, reference, customer_id, created_at, delivery, carrier_name, carrier_price, total, state";

fn count(value: i32, what: &str) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::DataCorruption(format!("negative {what}: {value}")))
}

fn stored_count<T>(value: T, what: &str) -> Result<i32, StoreError>
where
    T: Copy + std::fmt::Display + TryInto<i32>,
{
    value.try_into().map_err(|_| StoreError::OutOfRange(format!("{what} {value} exceeds {}", i32::MAX)))
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;
    fn try_from(r: ProductRow) -> Result<Self, StoreError> {
        Ok(Product::restore(r.id, r.name, Money::from_minor(r.price), count(r.stock, "stock")?, r.created_at, r.updated_at))
    }
}

impl From<CarrierRow> for Carrier {
    fn from(r: CarrierRow) -> Self { Carrier { id: r.id, name: r.name, price: Money::from_minor(r.price) } }
}

impl TryFrom<CustomerRow> for Customer {
    type Error = StoreError;
    fn try_from(r: CustomerRow) -> Result<Self, StoreError> {
        let otp = match (r.otp_code, r.otp_expires) {
            (Some(code), Some(expires_at)) => Some(OtpChallenge { code: OtpCode::from_stored(code), expires_at }),
            (None, None) => None,
            _ => return Err(StoreError::DataCorruption(format!("customer {} has half an OTP", r.id))),
        };
        Ok(Customer::restore(r.id, r.email, r.full_name, r.phone_number, r.is_phone_verified, otp, r.created_at))
    }
}

fn map_unique(e: sqlx::Error, what: &str) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() {
            return StoreError::Conflict(format!("{what} already exists"));
        }
    }
    StoreError::Database(e)
}

impl PgStore {
    /// Connect and run pending migrations.
    pub async fn connect(database_url: &SecretString, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url.expose_secret())
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self { Self { pool } }

    async fn hydrate_orders(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, StoreError> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let item_rows = sqlx::query_as::<_, OrderItemRow>(
            "SELECT id, order_id, product, quantity, price, total FROM order_items WHERE order_id = ANY($1) ORDER BY order_id, position",
        )
        .bind(ids.as_slice())
        .fetch_all(&self.pool)
        .await?;

        let mut items: HashMap<Uuid, Vec<LineItem>> = HashMap::new();
        for r in item_rows {
            items.entry(r.order_id).or_default().push(LineItem {
                id: r.id, product: r.product, quantity: count(r.quantity, "quantity")?,
                unit_price: Money::from_minor(r.price), total: Money::from_minor(r.total),
            });
        }

        rows.into_iter().map(|r| {
            let state = OrderState::try_from(r.state).map_err(|e| StoreError::DataCorruption(format!("order {}: {e}", r.id)))?;
            Ok(Order::restore(
                r.id, OrderReference::from_stored(r.reference), r.customer_id, r.created_at, r.delivery,
                r.carrier_name, Money::from_minor(r.carrier_price), items.remove(&r.id).unwrap_or_default(),
                Money::from_minor(r.total), state,
            ))
        }).collect()
    }

    async fn first_order(&self, rows: Vec<OrderRow>) -> Result<Option<Order>, StoreError> {
        Ok(self.hydrate_orders(rows).await?.into_iter().next())
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        sqlx::query_as::<_, ProductRow>("SELECT id, name, price, stock, created_at, updated_at FROM products WHERE id = $1")
            .bind(id).fetch_optional(&self.pool).await?
            .map(Product::try_from).transpose()
    }

    async fn products(&self) -> Result<Vec<Product>, StoreError> {
        sqlx::query_as::<_, ProductRow>("SELECT id, name, price, stock, created_at, updated_at FROM products ORDER BY created_at, id")
            .fetch_all(&self.pool).await?
            .into_iter().map(Product::try_from).collect()
    }

    async fn out_of_stock_products(&self) -> Result<Vec<Product>, StoreError> {
        sqlx::query_as::<_, ProductRow>("SELECT id, name, price, stock, created_at, updated_at FROM products WHERE stock = 0 ORDER BY created_at, id")
            .fetch_all(&self.pool).await?
            .into_iter().map(Product::try_from).collect()
    }

    async fn insert_product(&self, p: &Product) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO products (id, name, price, stock, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6)")
            .bind(p.id()).bind(p.name()).bind(p.price().minor()).bind(stored_count(p.stock(), "stock")?).bind(p.created_at()).bind(p.updated_at())
            .execute(&self.pool).await.map_err(|e| map_unique(e, "product"))?;
        Ok(())
    }

    async fn update_product_details(&self, p: &Product) -> Result<(), StoreError> {
        sqlx::query("UPDATE products SET name = $2, price = $3, updated_at = $4 WHERE id = $1")
            .bind(p.id()).bind(p.name()).bind(p.price().minor()).bind(p.updated_at())
            .execute(&self.pool).await?;
        Ok(())
    }

    async fn add_stock(&self, id: Uuid, quantity: u32) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query_as::<_, ProductRow>(
            "UPDATE products SET stock = stock + $2, updated_at = NOW() WHERE id = $1 AND stock::BIGINT + $2 <= $3 \
             RETURNING id, name, price, stock, created_at, updated_at",
        )
        .bind(id).bind(i64::from(quantity)).bind(i64::from(i32::MAX))
        .fetch_optional(&self.pool).await?;
        match row {
            Some(row) => Ok(Some(Product::try_from(row)?)),
            None if self.product(id).await?.is_some() => {
                Err(StoreError::OutOfRange(format!("stock of product {id} would exceed {}", i32::MAX)))
            }
            None => Ok(None),
        }
    }

    async fn carrier(&self, id: Uuid) -> Result<Option<Carrier>, StoreError> {
        Ok(sqlx::query_as::<_, CarrierRow>("SELECT id, name, price FROM carriers WHERE id = $1")
            .bind(id).fetch_optional(&self.pool).await?.map(Carrier::from))
    }

    async fn carriers(&self) -> Result<Vec<Carrier>, StoreError> {
        Ok(sqlx::query_as::<_, CarrierRow>("SELECT id, name, price FROM carriers ORDER BY name")
            .fetch_all(&self.pool).await?.into_iter().map(Carrier::from).collect())
    }

    async fn insert_carrier(&self, c: &Carrier) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO carriers (id, name, price) VALUES ($1, $2, $3)")
            .bind(c.id).bind(&c.name).bind(c.price.minor())
            .execute(&self.pool).await.map_err(|e| map_unique(e, "carrier"))?;
        Ok(())
    }
}

#[async_trait]
impl CartStore for PgStore {
    async fn load_cart(&self, session: &str) -> Result<Cart, StoreError> {
        let rows = sqlx::query_as::<_, CartItemRow>("SELECT product_id, quantity FROM cart_items WHERE session_id = $1 ORDER BY position")
            .bind(session).fetch_all(&self.pool).await?;
        let items = rows.into_iter()
            .map(|r| Ok(CartItem { product_id: r.product_id, quantity: count(r.quantity, "cart quantity")? }))
            .collect::<Result<Vec<_>, StoreError>>()?;
        Ok(Cart::from_items(items))
    }

    async fn save_cart(&self, session: &str, cart: &Cart) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM cart_items WHERE session_id = $1").bind(session).execute(&mut *tx).await?;
        for (position, item) in cart.items().iter().enumerate() {
            sqlx::query("INSERT INTO cart_items (id, session_id, product_id, quantity, position, created_at) VALUES ($1, $2, $3, $4, $5, NOW())")
                .bind(Uuid::now_v7()).bind(session).bind(item.product_id).bind(stored_count(item.quantity, "quantity")?)
                .bind(stored_count(position, "cart position")?)
                .execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn remove_cart(&self, session: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM cart_items WHERE session_id = $1").bind(session).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn commit_checkout(&self, order: &Order, products: &[Product]) -> Result<(), StoreError> {
        // Dropping `tx` on any early return rolls everything back.
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO orders (id, reference, customer_id, created_at, delivery, carrier_name, carrier_price, total, state) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)")
            .bind(order.id()).bind(order.reference().as_str()).bind(order.customer_id()).bind(order.created_at())
            .bind(order.delivery()).bind(order.carrier_name()).bind(order.carrier_price().minor())
            .bind(order.total().minor()).bind(order.state().code())
            .execute(&mut *tx).await.map_err(|e| map_unique(e, "order reference"))?;

        for (position, item) in order.items().iter().enumerate() {
            sqlx::query("INSERT INTO order_items (id, order_id, position, product, quantity, price, total) VALUES ($1, $2, $3, $4, $5, $6, $7)")
                .bind(item.id).bind(order.id()).bind(stored_count(position, "line position")?)
                .bind(&item.product).bind(stored_count(item.quantity, "quantity")?).bind(item.unit_price.minor()).bind(item.total.minor())
                .execute(&mut *tx).await?;
        }

        for p in products {
            sqlx::query("UPDATE products SET stock = $2, updated_at = $3 WHERE id = $1")
                .bind(p.id()).bind(stored_count(p.stock(), "stock")?).bind(p.updated_at())
                .execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id).fetch_all(&self.pool).await?;
        self.first_order(rows).await
    }

    async fn order_by_reference(&self, reference: &str) -> Result<Option<Order>, StoreError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE reference = $1"))
            .bind(reference).fetch_all(&self.pool).await?;
        self.first_order(rows).await
    }

    async fn orders(&self, limit: u32, offset: u32) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2"))
            .bind(i64::from(limit)).bind(i64::from(offset)).fetch_all(&self.pool).await?;
        self.hydrate_orders(rows).await
    }

    async fn orders_created_between(&self, since: DateTime<Utc>, until: DateTime<Utc>) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE created_at BETWEEN $1 AND $2 ORDER BY created_at"))
            .bind(since).bind(until).fetch_all(&self.pool).await?;
        self.hydrate_orders(rows).await
    }

    async fn all_orders(&self) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at"))
            .fetch_all(&self.pool).await?;
        self.hydrate_orders(rows).await
    }

    async fn save_order_state(&self, order: &Order) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE orders SET state = $2 WHERE id = $1")
            .bind(order.id()).bind(order.state().code())
            .execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!("order {} does not exist", order.id())));
        }
        Ok(())
    }
}

#[async_trait]
impl CustomerStore for PgStore {
    async fn customer(&self, id: Uuid) -> Result<Option<Customer>, StoreError> {
        sqlx::query_as::<_, CustomerRow>(
            "SELECT id, email, full_name, phone_number, is_phone_verified, otp_code, otp_expires, created_at FROM customers WHERE id = $1",
        )
        .bind(id).fetch_optional(&self.pool).await?
        .map(Customer::try_from).transpose()
    }

    async fn insert_customer(&self, c: &Customer) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO customers (id, email, full_name, phone_number, is_phone_verified, created_at) VALUES ($1, $2, $3, $4, $5, $6)")
            .bind(c.id()).bind(c.email()).bind(c.full_name()).bind(c.phone_number()).bind(c.is_phone_verified()).bind(c.created_at())
            .execute(&self.pool).await.map_err(|e| map_unique(e, "email"))?;
        Ok(())
    }

    async fn save_phone_verification(&self, c: &Customer) -> Result<(), StoreError> {
        let otp = c.otp();
        sqlx::query("UPDATE customers SET phone_number = $2, is_phone_verified = $3, otp_code = $4, otp_expires = $5 WHERE id = $1")
            .bind(c.id()).bind(c.phone_number()).bind(c.is_phone_verified())
            .bind(otp.map(|o| o.code.as_str().to_string())).bind(otp.map(|o| o.expires_at))
            .execute(&self.pool).await?;
        Ok(())
    }
}
