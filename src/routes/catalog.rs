//! Products and carriers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::{Carrier, Product};
use crate::domain::value_objects::Money;
use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::store::CatalogStore;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProduct {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(range(min = 0, max = 1_000_000_000))]
    pub price: i64,
    #[validate(range(max = 2_147_483_647))]
    pub stock: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProduct {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(range(min = 0, max = 1_000_000_000))]
    pub price: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct Restock {
    #[validate(range(min = 1, max = 2_147_483_647))]
    pub quantity: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCarrier {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(range(min = 0, max = 1_000_000_000))]
    pub price: i64,
}

async fn load_product(s: &AppState, id: Uuid) -> Result<Product> {
    s.store.product(id).await?.ok_or_else(|| AppError::NotFound(format!("product {id}")))
}

pub async fn list_products(State(s): State<AppState>) -> Result<Json<Vec<Product>>> {
    Ok(Json(s.store.products().await?))
}

pub async fn get_product(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Product>> {
    Ok(Json(load_product(&s, id).await?))
}

pub async fn create_product(State(s): State<AppState>, Json(req): Json<CreateProduct>) -> Result<(StatusCode, Json<Product>)> {
    req.validate()?;
    let product = Product::create(req.name, Money::from_minor(req.price), req.stock)?;
    s.store.insert_product(&product).await?;
    tracing::info!(product_id = %product.id(), name = %product.name(), "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(State(s): State<AppState>, Path(id): Path<Uuid>, Json(req): Json<UpdateProduct>) -> Result<Json<Product>> {
    req.validate()?;
    let mut product = load_product(&s, id).await?;
    if let Some(name) = req.name { product.rename(name)?; }
    if let Some(price) = req.price { product.update_price(Money::from_minor(price))?; }
    s.store.update_product_details(&product).await?;
    load_product(&s, id).await.map(Json)
}

pub async fn restock_product(State(s): State<AppState>, Path(id): Path<Uuid>, Json(req): Json<Restock>) -> Result<Json<Product>> {
    req.validate()?;
    let mut product = load_product(&s, id).await?;
    product.restock(req.quantity)?;
    let stored = s.store.add_stock(id, req.quantity).await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;
    tracing::info!(product_id = %id, quantity = req.quantity, stock = stored.stock(), "Product restocked");
    s.events.publish_all(product.take_events()).await;
    Ok(Json(stored))
}

pub async fn list_carriers(State(s): State<AppState>) -> Result<Json<Vec<Carrier>>> {
    Ok(Json(s.store.carriers().await?))
}

pub async fn create_carrier(State(s): State<AppState>, Json(req): Json<CreateCarrier>) -> Result<(StatusCode, Json<Carrier>)> {
    req.validate()?;
    let carrier = Carrier { id: Uuid::now_v7(), name: req.name, price: Money::from_minor(req.price) };
    s.store.insert_carrier(&carrier).await?;
    Ok((StatusCode::CREATED, Json(carrier)))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::routes::test_support::TestApp;

    #[tokio::test]
    async fn test_product_lifecycle() {
        let app = TestApp::new();
        let (status, created) = app.json(Method::POST, "/api/v1/products", Some(json!({"name": "Belt", "price": 3500, "stock": 0}))).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap().to_string();

        let (status, updated) = app.json(Method::PUT, &format!("/api/v1/products/{id}"), Some(json!({"price": 3000}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["price"], 3000);
        assert_eq!(updated["name"], "Belt");

        let (status, restocked) = app.json(Method::POST, &format!("/api/v1/products/{id}/restock"), Some(json!({"quantity": 4}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(restocked["stock"], 4);

        let (_, listed) = app.json(Method::GET, "/api/v1/products", None).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_product_is_rejected() {
        let app = TestApp::new();
        let (status, _) = app.call(Method::POST, "/api/v1/products", Some(json!({"name": "", "price": 100, "stock": 1}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = app.call(Method::POST, "/api/v1/products", Some(json!({"name": "Hat", "price": -1, "stock": 1}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = app.call(Method::GET, &format!("/api/v1/products/{}", uuid::Uuid::new_v4()), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_out_of_range_amounts_are_rejected() {
        let app = TestApp::new();
        let (status, _) = app.call(Method::POST, "/api/v1/products", Some(json!({"name": "Gold", "price": i64::MAX / 2 + 1, "stock": 5}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = app.call(Method::POST, "/api/v1/products", Some(json!({"name": "Pins", "price": 10, "stock": 3_000_000_000u32}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, created) = app.json(Method::POST, "/api/v1/products", Some(json!({"name": "Pins", "price": 10, "stock": 2_147_483_000u32}))).await;
        let id = created["id"].as_str().unwrap().to_string();
        let (status, _) = app.call(Method::PUT, &format!("/api/v1/products/{id}"), Some(json!({"price": 1_000_000_001i64}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = app.call(Method::POST, &format!("/api/v1/products/{id}/restock"), Some(json!({"quantity": 1000}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (_, product) = app.json(Method::GET, &format!("/api/v1/products/{id}"), None).await;
        assert_eq!(product["stock"], 2_147_483_000u32);
        assert_eq!(product["price"], 10);
    }

    #[tokio::test]
    async fn test_carriers() {
        let app = TestApp::new();
        let (status, _) = app.call(Method::POST, "/api/v1/carriers", Some(json!({"name": "Colissimo", "price": 490}))).await;
        assert_eq!(status, StatusCode::CREATED);
        let (_, carriers) = app.json(Method::GET, "/api/v1/carriers", None).await;
        assert_eq!(carriers[0]["name"], "Colissimo");
    }
}
