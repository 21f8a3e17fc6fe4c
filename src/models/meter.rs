use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Smart meter state as tracked by the registry and mutated by the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Meter {
    pub id: i64,
    pub user_id: i64,
    pub meter_number: String,
    pub alias: Option<String>,
    /// Contracted capacity, VA
    pub power_limit_va: i32,
    /// Cumulative energy consumed, kWh
    pub current_kwh: Decimal,
    /// Instantaneous draw, W
    pub current_watt: Decimal,
    /// Prepaid credit, currency units
    pub token_balance: Decimal,
    pub last_update: DateTime<Utc>,
}

/// Meter joined with the owning user's display fields
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MeterWithOwner {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub meter: Meter,
    pub owner_name: String,
    pub owner_email: String,
}

/// Provisioning input
#[derive(Debug, Clone)]
pub struct NewMeter {
    pub user_id: i64,
    pub meter_number: String,
    pub alias: Option<String>,
    pub power_limit_va: i32,
    pub current_kwh: Decimal,
    pub current_watt: Decimal,
    pub token_balance: Decimal,
}

/// Top-up record. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenHistory {
    pub id: i64,
    pub meter_id: i64,
    pub token_number: String,
    pub kwh_added: Decimal,
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Energy used by a meter on one calendar day (UTC)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsageHistory {
    pub id: i64,
    pub meter_id: i64,
    pub usage_date: NaiveDate,
    pub kwh_used: Decimal,
    pub created_at: DateTime<Utc>,
}
