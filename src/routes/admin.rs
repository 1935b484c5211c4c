//! Back-office endpoints.

use axum::{
    extract::{Path, Query, State},
    response::Response,
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::Order;
use crate::domain::value_objects::OrderState;
use crate::error::{AppError, Result};
use crate::routes::pdf_response;
use crate::services::analytics::{DailySales, GlobalStats};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TransitionRequest { pub state: i16 }

#[derive(Debug, Serialize)]
pub struct ChangeView { pub from: OrderState, pub to: OrderState, pub description: String }

#[derive(Debug, Serialize)]
pub struct TransitionResponse { pub order: Order, pub change: Option<ChangeView> }

#[derive(Debug, Deserialize, Validate)]
pub struct TestEmail {
    #[validate(email)]
    pub to: String,
}

#[derive(Debug, Deserialize)]
pub struct SalesRange {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub days: Option<u32>,
}

impl SalesRange {
    /// Defaults to the last 30 days ending now.
    fn bounds(&self, now: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let until = self.until.unwrap_or(now);
        let since = match self.since {
            Some(since) => since,
            None => Duration::try_days(i64::from(self.days.unwrap_or(30)))
                .and_then(|span| until.checked_sub_signed(span))
                .ok_or_else(|| AppError::BadRequest("days reaches past the supported date range".into()))?,
        };
        if since > until {
            return Err(AppError::BadRequest("since must not be after until".into()));
        }
        Ok((since, until))
    }
}

pub async fn transition_order(State(s): State<AppState>, Path(id): Path<Uuid>, Json(req): Json<TransitionRequest>) -> Result<Json<TransitionResponse>> {
    let state = OrderState::try_from(req.state).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let result = s.orders.transition_order(id, state).await?;
    let change = result.change.map(|c| ChangeView { from: c.from, to: c.to, description: c.describe() });
    Ok(Json(TransitionResponse { order: result.order, change }))
}

pub async fn regenerate_invoice(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Response> {
    Ok(pdf_response(s.orders.regenerate_invoice(id).await?))
}

pub async fn stock_alerts(State(s): State<AppState>) -> Result<Json<Value>> {
    let sent = s.stock.alert_out_of_stock().await?;
    Ok(Json(json!({"alerts_sent": sent})))
}

pub async fn test_email(State(s): State<AppState>, Json(req): Json<TestEmail>) -> Result<Json<Value>> {
    req.validate()?;
    let delivered = s.notifier.send_test_email(&req.to).await;
    Ok(Json(json!({"delivered": delivered})))
}

pub async fn daily_sales(State(s): State<AppState>, Query(range): Query<SalesRange>) -> Result<Json<Vec<DailySales>>> {
    let (since, until) = range.bounds(Utc::now())?;
    Ok(Json(s.analytics.daily_sales(since, until).await?))
}

pub async fn global_stats(State(s): State<AppState>) -> Result<Json<GlobalStats>> {
    Ok(Json(s.analytics.global_stats().await?))
}
