//! Checkout and order lookup.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::{DeliveryAddress, Order};
use crate::error::{AppError, Result};
use crate::routes::{pdf_response, ListParams};
use crate::state::AppState;
use crate::store::OrderStore;

#[derive(Debug, Deserialize, Validate)]
pub struct AddressInput {
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[validate(length(min = 6, max = 32))]
    pub phone: String,
    pub company: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub street: String,
    #[validate(length(min = 1, max = 20))]
    pub postal_code: String,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 2, max = 100))]
    pub country: String,
}

impl From<AddressInput> for DeliveryAddress {
    fn from(a: AddressInput) -> Self {
        Self {
            first_name: a.first_name, last_name: a.last_name, phone: a.phone, company: a.company,
            street: a.street, postal_code: a.postal_code, city: a.city, country: a.country,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutRequest {
    pub customer_id: Uuid,
    pub carrier_id: Uuid,
    #[validate]
    pub address: AddressInput,
}

pub async fn checkout(State(s): State<AppState>, Path(session): Path<String>, Json(req): Json<CheckoutRequest>) -> Result<(StatusCode, Json<Order>)> {
    req.validate()?;
    let address = DeliveryAddress::from(req.address);
    let order = s.checkout.place_order(&session, req.customer_id, &address, req.carrier_id).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list_orders(State(s): State<AppState>, Query(p): Query<ListParams>) -> Result<Json<Vec<Order>>> {
    let (limit, offset) = p.window();
    Ok(Json(s.store.orders(limit, offset).await?))
}

pub async fn get_order(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Order>> {
    let order = s.store.order(id).await?.ok_or_else(|| AppError::NotFound(format!("order {id}")))?;
    Ok(Json(order))
}

pub async fn download_invoice(State(s): State<AppState>, Path(reference): Path<String>) -> Result<Response> {
    Ok(pdf_response(s.orders.invoice_for_reference(&reference).await?))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::{json, Value};

    use crate::domain::aggregates::{Carrier, Cart, CartItem, Customer, Product};
    use crate::domain::value_objects::Money;
    use crate::routes::test_support::TestApp;
    use crate::store::{CartStore, CatalogStore, CustomerStore};

    async fn seeded(app: &TestApp, stock: u32, quantity: u32) -> (Product, Value) {
        let product = Product::create("Lamp", Money::from_minor(4000), stock).unwrap();
        app.store.insert_product(&product).await.unwrap();
        let customer = Customer::register("ada@example.com", "Ada Lovelace", None);
        app.store.insert_customer(&customer).await.unwrap();
        let carrier = Carrier { id: uuid::Uuid::new_v4(), name: "Relay".into(), price: Money::from_minor(300) };
        app.store.insert_carrier(&carrier).await.unwrap();

        let cart = Cart::from_items([CartItem { product_id: product.id(), quantity }]);
        app.store.save_cart("s1", &cart).await.unwrap();

        let body = json!({
            "customer_id": customer.id(),
            "carrier_id": carrier.id,
            "address": {
                "first_name": "Ada", "last_name": "Lovelace", "phone": "+33612345678", "company": null,
                "street": "12 rue des Lilas", "postal_code": "75011", "city": "Paris", "country": "FR"
            }
        });
        (product, body)
    }

    #[tokio::test]
    async fn test_checkout_and_invoice_download() {
        let app = TestApp::new();
        let (_, body) = seeded(&app, 3, 2).await;

        let (status, order) = app.json(Method::POST, "/api/v1/checkout/s1", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(order["total"], 8300);
        assert_eq!(order["state"], 0);

        let (status, listed) = app.json(Method::GET, "/api/v1/orders", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let reference = order["reference"].as_str().unwrap();
        let (status, pdf) = app.call(Method::GET, &format!("/api/v1/orders/by-reference/{reference}/invoice"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(pdf.starts_with(b"%PDF-"));
    }

    #[tokio::test]
    async fn test_checkout_conflict_on_stock() {
        let app = TestApp::new();
        let (product, body) = seeded(&app, 1, 2).await;

        let (status, message) = app.call(Method::POST, "/api/v1/checkout/s1", Some(body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(String::from_utf8(message).unwrap(), "insufficient stock for Lamp: 1 available, 2 requested");
        assert_eq!(app.store.product(product.id()).await.unwrap().unwrap().stock(), 1);
    }

    #[tokio::test]
    async fn test_checkout_validates_address() {
        let app = TestApp::new();
        let (_, mut body) = seeded(&app, 3, 1).await;
        body["address"]["city"] = json!("");
        let (status, _) = app.call(Method::POST, "/api/v1/checkout/s1", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
