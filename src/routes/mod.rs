//! HTTP API.

pub mod admin;
pub mod cart;
pub mod catalog;
pub mod customers;
pub mod orders;

use axum::{
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::services::Invoice;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "boutique-commerce"})) }))
        .route("/api/v1/products", get(catalog::list_products).post(catalog::create_product))
        .route("/api/v1/products/:id", get(catalog::get_product).put(catalog::update_product))
        .route("/api/v1/products/:id/restock", post(catalog::restock_product))
        .route("/api/v1/carriers", get(catalog::list_carriers).post(catalog::create_carrier))
        .route("/api/v1/customers", post(customers::register))
        .route("/api/v1/customers/:id", get(customers::get_customer))
        .route("/api/v1/customers/:id/phone", post(customers::set_phone))
        .route("/api/v1/customers/:id/phone/verify", post(customers::verify_phone))
        .route("/api/v1/customers/:id/phone/skip", post(customers::skip_phone))
        .route("/api/v1/cart/:session", get(cart::get_cart).delete(cart::clear_cart))
        .route("/api/v1/cart/:session/items/:product_id", post(cart::add_item).delete(cart::remove_item))
        .route("/api/v1/cart/:session/items/:product_id/decrease", post(cart::decrease_item))
        .route("/api/v1/checkout/:session", post(orders::checkout))
        .route("/api/v1/orders", get(orders::list_orders))
        .route("/api/v1/orders/:id", get(orders::get_order))
        .route("/api/v1/orders/by-reference/:reference/invoice", get(orders::download_invoice))
        .route("/api/v1/admin/orders/:id/state", put(admin::transition_order))
        .route("/api/v1/admin/orders/:id/invoice", post(admin::regenerate_invoice))
        .route("/api/v1/admin/stock/alerts", post(admin::stock_alerts))
        .route("/api/v1/admin/mail/test", post(admin::test_email))
        .route("/api/v1/admin/analytics/sales", get(admin::daily_sales))
        .route("/api/v1/admin/analytics/stats", get(admin::global_stats))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct ListParams { pub page: Option<u32>, pub per_page: Option<u32> }

impl ListParams {
    /// `(limit, offset)` with 20 per page by default and at most 100.
    pub fn window(&self) -> (u32, u32) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        (per_page, (page - 1).saturating_mul(per_page))
    }
}

/// PDF download response.
pub fn pdf_response(invoice: Invoice) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", invoice.filename)),
        ],
        invoice.bytes,
    )
        .into_response()
}


#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, StatusCode};
    use test_support::TestApp;

    #[test]
    fn test_list_window() {
        assert_eq!(ListParams { page: None, per_page: None }.window(), (20, 0));
        assert_eq!(ListParams { page: Some(3), per_page: Some(500) }.window(), (100, 200));
        assert_eq!(ListParams { page: Some(0), per_page: Some(0) }.window(), (1, 0));
    }

    #[tokio::test]
    async fn test_health() {
        let app = TestApp::new();
        let (status, body) = app.json(Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }
}
