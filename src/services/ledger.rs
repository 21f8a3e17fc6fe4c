use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::database::{with_timeout, LedgerStore};
use crate::error::{ApiError, Result};
use crate::middleware::metrics::track_ledger_operation;
use crate::models::{Meter, TokenHistory, UsageHistory};
use crate::utils::quantity::{ensure_non_negative, ensure_positive};

const SERIAL_DIGITS: usize = 20;
const SERIAL_SPACE: u128 = 100_000_000_000_000_000_000;
const MAX_SERIAL_ATTEMPTS: usize = 5;
const MAX_HISTORY_DAYS: u32 = 366;

/// Random 20-digit token serial, zero padded
pub fn generate_token_serial() -> String {
    let n: u128 = rand::thread_rng().gen_range(0..SERIAL_SPACE);
    format!("{:0width$}", n, width = SERIAL_DIGITS)
}

/// Currency credited for a top-up: the explicit price, or `kwh × tariff`
/// rounded to cents when no price is given.
pub fn top_up_credit(
    kwh_added: Decimal,
    price: Option<Decimal>,
    price_per_kwh: Decimal,
) -> Result<Decimal> {
    match price {
        Some(price) => Ok(price),
        None => kwh_added
            .checked_mul(price_per_kwh)
            .map(|credit| credit.round_dp(2))
            .ok_or_else(|| {
                ApiError::validation_field("kwhAdded", "kwhAdded is too large to price")
            }),
    }
}

/// Result of a committed top-up
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TopUpReceipt {
    pub meter: Meter,
    pub token: TokenHistory,
}

/// Applies energy usage and token top-ups to meters
#[derive(Clone)]
pub struct LedgerEngine {
    ledger: Arc<dyn LedgerStore>,
    price_per_kwh: Decimal,
    timeout: Duration,
}

impl LedgerEngine {
    pub fn new(ledger: Arc<dyn LedgerStore>, price_per_kwh: Decimal, timeout: Duration) -> Self {
        Self {
            ledger,
            price_per_kwh,
            timeout,
        }
    }

    pub fn price_per_kwh(&self) -> Decimal {
        self.price_per_kwh
    }

    /// Adds `kwh_used` to the meter's row for `usage_date`
    pub async fn record_usage(
        &self,
        meter_id: i64,
        usage_date: NaiveDate,
        kwh_used: Decimal,
    ) -> Result<UsageHistory> {
        ensure_non_negative("kwhUsed", kwh_used)?;

        let result = with_timeout(
            self.timeout,
            "append_usage",
            self.ledger.append_usage(meter_id, usage_date, kwh_used, Utc::now()),
        )
        .await
        .and_then(|row| row.ok_or_else(|| ApiError::not_found(&format!("Meter {}", meter_id))));

        track_ledger_operation("record_usage", result.is_ok());
        let row = result?;
        info!(
            "Meter {} usage on {}: +{} kWh (day total {} kWh)",
            meter_id, usage_date, kwh_used, row.kwh_used
        );
        Ok(row)
    }

    /// Energy increment and today's usage append, committed together
    pub async fn consume_energy(
        &self,
        meter_id: i64,
        delta_kwh: Decimal,
    ) -> Result<(Meter, UsageHistory)> {
        ensure_non_negative("deltaKwh", delta_kwh)?;

        let now = Utc::now();
        let result = with_timeout(
            self.timeout,
            "increment_energy_with_usage",
            self.ledger
                .increment_energy_with_usage(meter_id, delta_kwh, now.date_naive(), now),
        )
        .await
        .and_then(|pair| pair.ok_or_else(|| ApiError::not_found(&format!("Meter {}", meter_id))));

        track_ledger_operation("consume_energy", result.is_ok());
        let (meter, usage) = result?;
        info!(
            "Meter {} consumed {} kWh (now {} kWh)",
            meter_id, delta_kwh, meter.current_kwh
        );
        Ok((meter, usage))
    }

    /// Credits the balance and records the token under a fresh serial
    pub async fn top_up(
        &self,
        meter_id: i64,
        kwh_added: Decimal,
        price: Option<Decimal>,
    ) -> Result<TopUpReceipt> {
        ensure_positive("kwhAdded", kwh_added)?;
        if let Some(price) = price {
            ensure_non_negative("price", price)?;
        }
        let credit = top_up_credit(kwh_added, price, self.price_per_kwh)?;

        for attempt in 1..=MAX_SERIAL_ATTEMPTS {
            let serial = generate_token_serial();
            let applied = with_timeout(
                self.timeout,
                "apply_top_up",
                self.ledger
                    .apply_top_up(meter_id, &serial, kwh_added, credit, Utc::now()),
            )
            .await;

            match applied {
                Ok(Some((meter, token))) => {
                    track_ledger_operation("top_up", true);
                    info!(
                        "💳 Meter {} topped up with {} kWh for {} (token {})",
                        meter_id, kwh_added, credit, token.token_number
                    );
                    return Ok(TopUpReceipt { meter, token });
                }
                Ok(None) => {
                    track_ledger_operation("top_up", false);
                    return Err(ApiError::not_found(&format!("Meter {}", meter_id)));
                }
                Err(ApiError::Conflict(_)) => {
                    warn!(attempt, "Token serial collision, regenerating");
                }
                Err(e) => {
                    track_ledger_operation("top_up", false);
                    return Err(e);
                }
            }
        }

        track_ledger_operation("top_up", false);
        error!("Could not allocate a unique token serial for meter {}", meter_id);
        Err(ApiError::Persistence("Could not allocate a unique token serial".to_string()))
    }

    /// Newest first
    pub async fn token_history(&self, meter_id: i64) -> Result<Vec<TokenHistory>> {
        with_timeout(self.timeout, "token_history", self.ledger.token_history(meter_id)).await
    }

    /// The last `days` calendar days including today, newest first
    pub async fn usage_history(&self, meter_id: i64, days: u32) -> Result<Vec<UsageHistory>> {
        if days == 0 || days > MAX_HISTORY_DAYS {
            return Err(ApiError::validation_field(
                "days",
                format!("days must be between 1 and {}", MAX_HISTORY_DAYS),
            ));
        }

        let since = Utc::now().date_naive() - chrono::Duration::days(i64::from(days) - 1);
        with_timeout(
            self.timeout,
            "usage_history",
            self.ledger.usage_history(meter_id, since),
        )
        .await
    }

    /// Sum of usage rows dated today (UTC)
    pub async fn usage_today(&self) -> Result<Decimal> {
        with_timeout(
            self.timeout,
            "sum_usage_on",
            self.ledger.sum_usage_on(Utc::now().date_naive()),
        )
        .await
    }
}
