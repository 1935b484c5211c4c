//! Session carts.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartDetails};
use crate::error::{AppError, Result};
use crate::services::checkout::cart_details;
use crate::state::AppState;
use crate::store::{CartStore, CatalogStore};

async fn save_and_describe(s: &AppState, session: &str, cart: &Cart) -> Result<Json<CartDetails>> {
    s.store.save_cart(session, cart).await?;
    Ok(Json(cart_details(s.store.as_ref(), cart).await?))
}

pub async fn get_cart(State(s): State<AppState>, Path(session): Path<String>) -> Result<Json<CartDetails>> {
    let cart = s.store.load_cart(&session).await?;
    Ok(Json(cart_details(s.store.as_ref(), &cart).await?))
}

pub async fn clear_cart(State(s): State<AppState>, Path(session): Path<String>) -> Result<StatusCode> {
    s.store.remove_cart(&session).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_item(State(s): State<AppState>, Path((session, product_id)): Path<(String, Uuid)>) -> Result<Json<CartDetails>> {
    let product = s.store.product(product_id).await?.ok_or_else(|| AppError::NotFound(format!("product {product_id}")))?;
    let mut cart = s.store.load_cart(&session).await?;
    if !cart.add_item(&product) {
        return Err(AppError::Conflict(format!("not enough stock for {}: {} available", product.name(), product.stock())));
    }
    save_and_describe(&s, &session, &cart).await
}

pub async fn remove_item(State(s): State<AppState>, Path((session, product_id)): Path<(String, Uuid)>) -> Result<Json<CartDetails>> {
    let mut cart = s.store.load_cart(&session).await?;
    cart.remove_item(product_id);
    save_and_describe(&s, &session, &cart).await
}

pub async fn decrease_item(State(s): State<AppState>, Path((session, product_id)): Path<(String, Uuid)>) -> Result<Json<CartDetails>> {
    let mut cart = s.store.load_cart(&session).await?;
    cart.decrease_item(product_id);
    save_and_describe(&s, &session, &cart).await
}
