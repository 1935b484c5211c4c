//! HTTP error mapping.
//!
//! Handlers return `Result<T, AppError>`. Server-side failures are logged
//! and answered with a generic message; client errors say what was wrong.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::domain::aggregates::{OtpError, ProductError};
use crate::services::checkout::CheckoutError;
use crate::services::orders::OrderError;
use crate::services::phone::PhoneError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::EmptyCart => Self::BadRequest("cart is empty".into()),
            CheckoutError::InsufficientStock { product, requested, available } => Self::Conflict(format!(
                "insufficient stock for {product}: {available} available, {requested} requested"
            )),
            CheckoutError::CustomerNotFound(id) => Self::NotFound(format!("customer {id}")),
            CheckoutError::CarrierNotFound(id) => Self::NotFound(format!("carrier {id}")),
            CheckoutError::Store(e) => Self::Store(e),
        }
    }
}

impl From<PhoneError> for AppError {
    fn from(err: PhoneError) -> Self {
        match err {
            PhoneError::CustomerNotFound(id) => Self::NotFound(format!("customer {id}")),
            PhoneError::Otp(OtpError::InvalidOrExpired) => Self::Unprocessable("invalid or expired code".into()),
            PhoneError::Store(e) => Self::Store(e),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NotFound(id) => Self::NotFound(format!("order {id}")),
            OrderError::CustomerNotFound(id) => Self::NotFound(format!("customer {id}")),
            OrderError::Render(e) => Self::Internal(e.to_string()),
            OrderError::Store(e) => Self::Store(e),
        }
    }
}

impl From<ProductError> for AppError {
    fn from(err: ProductError) -> Self {
        match err {
            ProductError::InsufficientStock { .. } => Self::Conflict(err.to_string()),
            ProductError::MissingName
            | ProductError::NegativePrice
            | ProductError::PriceTooHigh(_)
            | ProductError::StockLimit { .. } => Self::BadRequest(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Store(StoreError::Conflict(_)) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Store(StoreError::OutOfRange(_)) => StatusCode::BAD_REQUEST,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request error");
        }

        // Internal details stay in the log
        let message = match &self {
            Self::Store(StoreError::Conflict(msg) | StoreError::OutOfRange(msg)) => msg.clone(),
            Self::Store(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::NotFound(what) => format!("{what} not found"),
            Self::BadRequest(msg) | Self::Conflict(msg) | Self::Unprocessable(msg) => msg.clone(),
            Self::Validation(errors) => errors.to_string(),
        };

        (status, message).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status(err: impl Into<AppError>) -> StatusCode { err.into().into_response().status() }

    #[test]
    fn test_status_codes() {
        assert_eq!(status(CheckoutError::InsufficientStock { product: "Lamp".into(), requested: 2, available: 1 }), StatusCode::CONFLICT);
        assert_eq!(status(CheckoutError::EmptyCart), StatusCode::BAD_REQUEST);
        assert_eq!(status(PhoneError::Otp(OtpError::InvalidOrExpired)), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status(OrderError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status(StoreError::Conflict("email taken".into())), StatusCode::CONFLICT);
        assert_eq!(status(ProductError::StockLimit { limit: 10 }), StatusCode::BAD_REQUEST);
        assert_eq!(status(StoreError::OutOfRange("stock 3000000000".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(StoreError::DataCorruption("bad row".into())), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let response = AppError::from(StoreError::DataCorruption("orders.state = 9".into())).into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Internal server error");
    }

    #[tokio::test]
    async fn test_insufficient_stock_names_product() {
        let response = AppError::from(CheckoutError::InsufficientStock { product: "Lamp".into(), requested: 2, available: 1 }).into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"insufficient stock for Lamp: 1 available, 2 requested");
    }
}
