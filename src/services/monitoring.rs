use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;
use utoipa::ToSchema;

use super::ledger::LedgerEngine;
use super::meter_registry::MeterRegistry;
use crate::error::{ApiError, Result};
use crate::models::MeterWithOwner;

/// One row of the monitoring table
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeterSnapshot {
    pub meter_id: i64,
    pub user_id: i64,
    pub name: String,
    pub token: Decimal,
    pub kwh: Decimal,
    pub watt: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FleetSummary {
    /// Cumulative energy over every meter
    pub total_kwh: Decimal,
    /// Usage recorded for the current UTC day
    pub today_kwh: Decimal,
    pub active_meter_count: i64,
    pub list: Vec<MeterSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalanceEntry {
    pub meter_id: i64,
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub token: Decimal,
    pub kwh: Decimal,
}

impl From<&MeterWithOwner> for MeterSnapshot {
    fn from(row: &MeterWithOwner) -> Self {
        Self {
            meter_id: row.meter.id,
            user_id: row.meter.user_id,
            name: row.owner_name.clone(),
            token: row.meter.token_balance,
            kwh: row.meter.current_kwh,
            watt: row.meter.current_watt,
        }
    }
}

impl From<MeterWithOwner> for TokenBalanceEntry {
    fn from(row: MeterWithOwner) -> Self {
        Self {
            meter_id: row.meter.id,
            user_id: row.meter.user_id,
            name: row.owner_name,
            email: row.owner_email,
            token: row.meter.token_balance,
            kwh: row.meter.current_kwh,
        }
    }
}

/// Fleet-wide figures reduced from one registry listing
#[derive(Clone)]
pub struct MonitoringAggregator {
    registry: MeterRegistry,
    ledger: LedgerEngine,
}

impl MonitoringAggregator {
    pub fn new(registry: MeterRegistry, ledger: LedgerEngine) -> Self {
        Self { registry, ledger }
    }

    pub async fn fleet_summary(&self) -> Result<FleetSummary> {
        let meters = self.registry.list_meters().await?;
        let today_kwh = self.ledger.usage_today().await?;

        let summary = summarize(&meters, today_kwh)?;
        debug!(
            "Fleet summary: {} meters, {} kWh total, {} kWh today",
            summary.active_meter_count, summary.total_kwh, summary.today_kwh
        );
        Ok(summary)
    }

    /// Balances per meter, by meter id
    pub async fn tokens_listing(&self) -> Result<Vec<TokenBalanceEntry>> {
        let meters = self.registry.list_meters().await?;
        Ok(meters.into_iter().map(TokenBalanceEntry::from).collect())
    }
}

fn summarize(meters: &[MeterWithOwner], today_kwh: Decimal) -> Result<FleetSummary> {
    let list: Vec<MeterSnapshot> = meters.iter().map(MeterSnapshot::from).collect();
    let total_kwh = list
        .iter()
        .try_fold(Decimal::ZERO, |total, m| total.checked_add(m.kwh))
        .ok_or_else(|| ApiError::Internal("Fleet energy total overflowed".to_string()))?;

    Ok(FleetSummary {
        total_kwh,
        today_kwh,
        active_meter_count: list.len() as i64,
        list,
    })
}
