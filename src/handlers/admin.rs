use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    response::Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use super::response::{Created, DataResponse};
use crate::app_state::AppState;
use crate::auth::middleware::AuthenticatedUser;
use crate::error::{handle_rejection, ApiError, Result};
use crate::models::{Meter, TokenHistory, UsageHistory};
use crate::services::{FleetSummary, TokenBalanceEntry, TopUpReceipt};
use crate::utils::quantity::decimal_from_json;

const DEFAULT_USAGE_DAYS: u32 = 7;

/// Numeric fields arrive as JSON numbers or numeric strings
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateKwhRequest {
    #[schema(value_type = i64, example = 1)]
    pub meter_id: Option<Value>,
    #[schema(value_type = f64, example = 0.75)]
    pub delta_kwh: Option<Value>,
    /// Also add the delta to today's usage row
    #[serde(default)]
    pub record_usage: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnergyUpdateResponse {
    pub id: i64,
    pub current_kwh: Decimal,
    pub last_update: DateTime<Utc>,
}

impl From<Meter> for EnergyUpdateResponse {
    fn from(meter: Meter) -> Self {
        Self {
            id: meter.id,
            current_kwh: meter.current_kwh,
            last_update: meter.last_update,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TopUpRequest {
    #[schema(value_type = f64, example = 45)]
    pub kwh_added: Option<Value>,
    /// Defaults to `kwhAdded × PRICE_PER_KWH`
    #[schema(value_type = Option<f64>, example = 45000)]
    pub price: Option<Value>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordUsageRequest {
    #[schema(value_type = f64, example = 3.2)]
    pub kwh_used: Option<Value>,
    /// Defaults to today (UTC)
    pub usage_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UsageQuery {
    /// Calendar days to include, today counted (default 7)
    pub days: Option<u32>,
}

fn meter_id_from_json(value: Option<&Value>) -> Result<i64> {
    match value {
        None | Some(Value::Null) => Err(ApiError::missing_field("meterId")),
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| ApiError::validation_field("meterId", "meterId must be an integer")),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| ApiError::validation_field("meterId", "meterId must be an integer")),
        Some(_) => Err(ApiError::validation_field("meterId", "meterId must be an integer")),
    }
}

fn required_decimal(value: Option<&Value>, field: &str) -> Result<Decimal> {
    match value {
        None => Err(ApiError::missing_field(field)),
        Some(v) => decimal_from_json(field, v),
    }
}

fn path_meter_id(path: std::result::Result<Path<i64>, PathRejection>) -> Result<i64> {
    path.map(|Path(id)| id)
        .map_err(|_| ApiError::validation_field("id", "Meter id must be an integer"))
}

/// Fleet totals and per-meter readings
#[utoipa::path(
    get,
    path = "/api/admin/monitoring",
    responses(
        (status = 200, description = "Fleet summary", body = FleetSummary),
        (status = 401, description = "Missing or invalid session"),
        (status = 403, description = "Admin access required")
    ),
    security(("session_token" = [])),
    tag = "admin"
)]
pub async fn monitoring(State(state): State<AppState>) -> Result<Json<FleetSummary>> {
    Ok(Json(state.monitoring.fleet_summary().await?))
}

/// Token balance per meter
#[utoipa::path(
    get,
    path = "/api/admin/tokens",
    responses(
        (status = 200, description = "Balances by meter id", body = DataResponse<Vec<TokenBalanceEntry>>),
        (status = 401, description = "Missing or invalid session"),
        (status = 403, description = "Admin access required")
    ),
    security(("session_token" = [])),
    tag = "admin"
)]
pub async fn tokens(
    State(state): State<AppState>,
) -> Result<DataResponse<Vec<TokenBalanceEntry>>> {
    Ok(DataResponse::new(state.monitoring.tokens_listing().await?))
}

/// Add energy to a meter's cumulative reading
#[utoipa::path(
    post,
    path = "/api/admin/update-kwh",
    request_body = UpdateKwhRequest,
    responses(
        (status = 200, description = "Updated reading", body = EnergyUpdateResponse),
        (status = 400, description = "Missing meterId or invalid deltaKwh"),
        (status = 404, description = "Unknown meter")
    ),
    security(("session_token" = [])),
    tag = "admin"
)]
pub async fn update_kwh(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    payload: std::result::Result<Json<UpdateKwhRequest>, JsonRejection>,
) -> Result<Json<EnergyUpdateResponse>> {
    let Json(request) = payload.map_err(handle_rejection)?;
    let meter_id = meter_id_from_json(request.meter_id.as_ref())?;
    let delta = required_decimal(request.delta_kwh.as_ref(), "deltaKwh")?;

    let meter = if request.record_usage {
        state.ledger.consume_energy(meter_id, delta).await?.0
    } else {
        state.meters.update_energy(meter_id, delta).await?
    };

    info!(
        "Admin {} added {} kWh to meter {}",
        auth.user.id, delta, meter_id
    );
    Ok(Json(meter.into()))
}

#[utoipa::path(
    get,
    path = "/api/admin/meters/{id}",
    params(("id" = i64, Path, description = "Meter id")),
    responses(
        (status = 200, description = "Meter", body = Meter),
        (status = 404, description = "Unknown meter")
    ),
    security(("session_token" = [])),
    tag = "admin"
)]
pub async fn get_meter(
    State(state): State<AppState>,
    path: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<Meter>> {
    let meter_id = path_meter_id(path)?;
    Ok(Json(state.meters.get_meter_by_id(meter_id).await?))
}

/// Credit the meter and issue a token serial
#[utoipa::path(
    post,
    path = "/api/admin/meters/{id}/top-up",
    params(("id" = i64, Path, description = "Meter id")),
    request_body = TopUpRequest,
    responses(
        (status = 201, description = "Top-up applied", body = TopUpReceipt),
        (status = 400, description = "Invalid kwhAdded or price"),
        (status = 404, description = "Unknown meter")
    ),
    security(("session_token" = [])),
    tag = "admin"
)]
pub async fn top_up(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    path: std::result::Result<Path<i64>, PathRejection>,
    payload: std::result::Result<Json<TopUpRequest>, JsonRejection>,
) -> Result<Created<TopUpReceipt>> {
    let meter_id = path_meter_id(path)?;
    let Json(request) = payload.map_err(handle_rejection)?;
    let kwh_added = required_decimal(request.kwh_added.as_ref(), "kwhAdded")?;
    let price = match request.price.as_ref() {
        None | Some(Value::Null) => None,
        Some(v) => Some(decimal_from_json("price", v)?),
    };

    let receipt = state.ledger.top_up(meter_id, kwh_added, price).await?;
    info!("Admin {} topped up meter {}", auth.user.id, meter_id);
    Ok(Created(receipt))
}

#[utoipa::path(
    get,
    path = "/api/admin/meters/{id}/tokens",
    params(("id" = i64, Path, description = "Meter id")),
    responses(
        (status = 200, description = "Top-ups, newest first", body = DataResponse<Vec<TokenHistory>>),
        (status = 404, description = "Unknown meter")
    ),
    security(("session_token" = [])),
    tag = "admin"
)]
pub async fn token_history(
    State(state): State<AppState>,
    path: std::result::Result<Path<i64>, PathRejection>,
) -> Result<DataResponse<Vec<TokenHistory>>> {
    let meter_id = path_meter_id(path)?;
    state.meters.get_meter_by_id(meter_id).await?;
    Ok(DataResponse::new(state.ledger.token_history(meter_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/admin/meters/{id}/usage",
    params(("id" = i64, Path, description = "Meter id"), UsageQuery),
    responses(
        (status = 200, description = "Daily usage, newest first", body = DataResponse<Vec<UsageHistory>>),
        (status = 400, description = "days out of range"),
        (status = 404, description = "Unknown meter")
    ),
    security(("session_token" = [])),
    tag = "admin"
)]
pub async fn usage_history(
    State(state): State<AppState>,
    path: std::result::Result<Path<i64>, PathRejection>,
    query: std::result::Result<Query<UsageQuery>, QueryRejection>,
) -> Result<DataResponse<Vec<UsageHistory>>> {
    let meter_id = path_meter_id(path)?;
    let Query(query) = query
        .map_err(|_| ApiError::validation_field("days", "days must be a positive integer"))?;
    let days = query.days.unwrap_or(DEFAULT_USAGE_DAYS);

    state.meters.get_meter_by_id(meter_id).await?;
    Ok(DataResponse::new(state.ledger.usage_history(meter_id, days).await?))
}

/// Append usage for one day without touching the cumulative reading
#[utoipa::path(
    post,
    path = "/api/admin/meters/{id}/usage",
    params(("id" = i64, Path, description = "Meter id")),
    request_body = RecordUsageRequest,
    responses(
        (status = 201, description = "Day total after the append", body = UsageHistory),
        (status = 400, description = "Invalid kwhUsed"),
        (status = 404, description = "Unknown meter")
    ),
    security(("session_token" = [])),
    tag = "admin"
)]
pub async fn record_usage(
    State(state): State<AppState>,
    path: std::result::Result<Path<i64>, PathRejection>,
    payload: std::result::Result<Json<RecordUsageRequest>, JsonRejection>,
) -> Result<Created<UsageHistory>> {
    let meter_id = path_meter_id(path)?;
    let Json(request) = payload.map_err(handle_rejection)?;
    let kwh_used = required_decimal(request.kwh_used.as_ref(), "kwhUsed")?;
    let usage_date = request.usage_date.unwrap_or_else(|| Utc::now().date_naive());

    let row = state.ledger.record_usage(meter_id, usage_date, kwh_used).await?;
    Ok(Created(row))
}
