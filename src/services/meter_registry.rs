use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::database::{with_timeout, MeterStore};
use crate::error::{ApiError, Result};
use crate::middleware::metrics::track_ledger_operation;
use crate::models::{Meter, MeterWithOwner};
use crate::utils::quantity::ensure_non_negative;

/// Meter lookups and cumulative energy updates
#[derive(Clone)]
pub struct MeterRegistry {
    meters: Arc<dyn MeterStore>,
    timeout: Duration,
}

impl MeterRegistry {
    pub fn new(meters: Arc<dyn MeterStore>, timeout: Duration) -> Self {
        Self { meters, timeout }
    }

    pub async fn get_meter_by_id(&self, meter_id: i64) -> Result<Meter> {
        with_timeout(self.timeout, "find_meter", self.meters.find_meter(meter_id))
            .await?
            .ok_or_else(|| ApiError::not_found(&format!("Meter {}", meter_id)))
    }

    /// All meters with owner name and email, by meter id
    pub async fn list_meters(&self) -> Result<Vec<MeterWithOwner>> {
        let meters =
            with_timeout(self.timeout, "list_meters", self.meters.list_meters_with_owner()).await?;
        debug!("Registry listed {} meters", meters.len());
        Ok(meters)
    }

    /// Adds `delta_kwh` to the cumulative reading. Concurrent calls on the
    /// same meter all land.
    pub async fn update_energy(&self, meter_id: i64, delta_kwh: Decimal) -> Result<Meter> {
        ensure_non_negative("deltaKwh", delta_kwh)?;

        let result = with_timeout(
            self.timeout,
            "increment_energy",
            self.meters.increment_energy(meter_id, delta_kwh, Utc::now()),
        )
        .await
        .and_then(|meter| meter.ok_or_else(|| ApiError::not_found(&format!("Meter {}", meter_id))));

        track_ledger_operation("update_energy", result.is_ok());
        let meter = result?;
        info!(
            "Meter {} energy +{} kWh (now {} kWh)",
            meter_id, delta_kwh, meter.current_kwh
        );
        Ok(meter)
    }
}
