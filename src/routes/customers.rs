//! Customer accounts and phone verification.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::Customer;
use crate::error::{AppError, Result};
use crate::services::OtpDelivery;
use crate::state::AppState;
use crate::store::CustomerStore;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterCustomer {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 255))]
    pub full_name: String,
    #[validate(length(min = 6, max = 32))]
    pub phone_number: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetPhone {
    #[validate(length(min = 6, max = 32))]
    pub phone_number: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyPhone {
    #[validate(length(min = 1, max = 12))]
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct PhoneStatus { pub customer: Customer, pub delivery: Option<OtpDelivery> }

pub async fn register(State(s): State<AppState>, Json(req): Json<RegisterCustomer>) -> Result<(StatusCode, Json<Customer>)> {
    req.validate()?;
    let customer = Customer::register(req.email.trim(), req.full_name.trim(), req.phone_number.map(|p| p.trim().to_string()));
    s.store.insert_customer(&customer).await?;
    tracing::info!(customer_id = %customer.id(), "Customer registered");
    s.notifier.welcome(&customer).await;
    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn get_customer(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Customer>> {
    let customer = s.store.customer(id).await?.ok_or_else(|| AppError::NotFound(format!("customer {id}")))?;
    Ok(Json(customer))
}

/// Store the number and text a code to it.
pub async fn set_phone(State(s): State<AppState>, Path(id): Path<Uuid>, Json(req): Json<SetPhone>) -> Result<Json<PhoneStatus>> {
    req.validate()?;
    s.phone.update_phone_number(id, &req.phone_number).await?;
    let delivery = s.phone.issue(id).await?;
    let customer = s.store.customer(id).await?.ok_or_else(|| AppError::NotFound(format!("customer {id}")))?;
    Ok(Json(PhoneStatus { customer, delivery: Some(delivery) }))
}

pub async fn verify_phone(State(s): State<AppState>, Path(id): Path<Uuid>, Json(req): Json<VerifyPhone>) -> Result<Json<PhoneStatus>> {
    req.validate()?;
    let customer = s.phone.verify(id, &req.code).await?;
    Ok(Json(PhoneStatus { customer, delivery: None }))
}

pub async fn skip_phone(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<PhoneStatus>> {
    let customer = s.phone.bypass(id).await?;
    Ok(Json(PhoneStatus { customer, delivery: None }))
}
