//! PostgreSQL implementation of the store traits.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::debug;

use super::repository::{LedgerStore, MeterStore, SessionStore, UserStore};
use crate::error::ApiError;
use crate::models::user::normalize_email;
use crate::models::{
    Meter, MeterWithOwner, NewMeter, NewUser, Session, TokenHistory, UsageHistory, User,
};

const USER_COLUMNS: &str = "id, name, email, password_hash, role, created_at";
const METER_COLUMNS: &str = "id, user_id, meter_number, alias, power_limit_va, current_kwh, \
                             current_watt, token_balance, last_update";
const SESSION_COLUMNS: &str = "token_hash, user_id, created_at, expires_at, revoked_at";
const TOKEN_HISTORY_COLUMNS: &str = "id, meter_id, token_number, kwh_added, price, created_at";
const USAGE_HISTORY_COLUMNS: &str = "id, meter_id, usage_date, kwh_used, created_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

/// The counter columns carry upper-bound CHECKs; a breach rolls the statement back
fn range_error(err: sqlx::Error, field: &str) -> ApiError {
    match &err {
        sqlx::Error::Database(db) if db.is_check_violation() => ApiError::validation_field(
            field,
            format!("{} would push a stored total out of range", field),
        ),
        _ => ApiError::Database(err),
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, ApiError> {
        let email = normalize_email(&user.email);
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (name, email, password_hash, role)
             VALUES ($1, $2, $3, $4)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.name)
        .bind(&email)
        .bind(&user.password_hash)
        .bind(user.role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::Conflict(format!("User with email {} already exists", email))
            } else {
                ApiError::Database(e)
            }
        })
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn insert_session(&self, session: Session) -> Result<(), ApiError> {
        sqlx::query(
            "INSERT INTO sessions (token_hash, user_id, created_at, expires_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(&session.token_hash)
        .bind(session.user_id)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::Conflict("Session token collision".to_string())
            } else if is_foreign_key_violation(&e) {
                ApiError::Persistence(format!("Session owner {} does not exist", session.user_id))
            } else {
                ApiError::Database(e)
            }
        })?;

        Ok(())
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<Session>, ApiError> {
        let session = sqlx::query_as::<_, Session>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE token_hash = $1"
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn revoke_session(&self, token_hash: &str, at: DateTime<Utc>) -> Result<bool, ApiError> {
        let result = sqlx::query(
            "UPDATE sessions SET revoked_at = $2 WHERE token_hash = $1 AND revoked_at IS NULL",
        )
        .bind(token_hash)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_inactive_sessions(&self, now: DateTime<Utc>) -> Result<u64, ApiError> {
        let result =
            sqlx::query("DELETE FROM sessions WHERE expires_at <= $1 OR revoked_at IS NOT NULL")
                .bind(now)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl MeterStore for PgStore {
    async fn insert_meter(&self, meter: NewMeter) -> Result<Meter, ApiError> {
        sqlx::query_as::<_, Meter>(&format!(
            "INSERT INTO meters (user_id, meter_number, alias, power_limit_va, current_kwh, current_watt, token_balance)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {METER_COLUMNS}"
        ))
        .bind(meter.user_id)
        .bind(&meter.meter_number)
        .bind(&meter.alias)
        .bind(meter.power_limit_va)
        .bind(meter.current_kwh)
        .bind(meter.current_watt)
        .bind(meter.token_balance)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::Conflict(format!("Meter {} already exists", meter.meter_number))
            } else if is_foreign_key_violation(&e) {
                ApiError::Persistence(format!("Meter owner {} does not exist", meter.user_id))
            } else {
                ApiError::Database(e)
            }
        })
    }

    async fn find_meter(&self, id: i64) -> Result<Option<Meter>, ApiError> {
        let meter = sqlx::query_as::<_, Meter>(&format!(
            "SELECT {METER_COLUMNS} FROM meters WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(meter)
    }

    async fn find_meter_by_number(&self, meter_number: &str) -> Result<Option<Meter>, ApiError> {
        let meter = sqlx::query_as::<_, Meter>(&format!(
            "SELECT {METER_COLUMNS} FROM meters WHERE meter_number = $1"
        ))
        .bind(meter_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(meter)
    }

    async fn list_meters_with_owner(&self) -> Result<Vec<MeterWithOwner>, ApiError> {
        let meters = sqlx::query_as::<_, MeterWithOwner>(
            "SELECT m.id, m.user_id, m.meter_number, m.alias, m.power_limit_va, m.current_kwh,
                    m.current_watt, m.token_balance, m.last_update,
                    u.name AS owner_name, u.email AS owner_email
             FROM meters m
             JOIN users u ON u.id = m.user_id
             ORDER BY m.id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        debug!("Listed {} meters", meters.len());
        Ok(meters)
    }

    async fn increment_energy(
        &self,
        meter_id: i64,
        delta: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Option<Meter>, ApiError> {
        // Single statement: the row lock taken by UPDATE serializes racing increments
        let meter = sqlx::query_as::<_, Meter>(&format!(
            "UPDATE meters
             SET current_kwh = current_kwh + $2, last_update = GREATEST(last_update, $3)
             WHERE id = $1
             RETURNING {METER_COLUMNS}"
        ))
        .bind(meter_id)
        .bind(delta)
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| range_error(e, "deltaKwh"))?;

        Ok(meter)
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn append_usage(
        &self,
        meter_id: i64,
        usage_date: NaiveDate,
        kwh: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Option<UsageHistory>, ApiError> {
        let result = sqlx::query_as::<_, UsageHistory>(&format!(
            "INSERT INTO usage_history (meter_id, usage_date, kwh_used, created_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (meter_id, usage_date)
             DO UPDATE SET kwh_used = usage_history.kwh_used + EXCLUDED.kwh_used
             RETURNING {USAGE_HISTORY_COLUMNS}"
        ))
        .bind(meter_id)
        .bind(usage_date)
        .bind(kwh)
        .bind(at)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Ok(Some(row)),
            Err(e) if is_foreign_key_violation(&e) => Ok(None),
            Err(e) => Err(range_error(e, "kwhUsed")),
        }
    }

    async fn increment_energy_with_usage(
        &self,
        meter_id: i64,
        delta: Decimal,
        usage_date: NaiveDate,
        at: DateTime<Utc>,
    ) -> Result<Option<(Meter, UsageHistory)>, ApiError> {
        let mut tx = self.pool.begin().await?;

        let meter = sqlx::query_as::<_, Meter>(&format!(
            "UPDATE meters
             SET current_kwh = current_kwh + $2, last_update = GREATEST(last_update, $3)
             WHERE id = $1
             RETURNING {METER_COLUMNS}"
        ))
        .bind(meter_id)
        .bind(delta)
        .bind(at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| range_error(e, "deltaKwh"))?;

        let Some(meter) = meter else {
            tx.rollback().await?;
            return Ok(None);
        };

        let usage = sqlx::query_as::<_, UsageHistory>(&format!(
            "INSERT INTO usage_history (meter_id, usage_date, kwh_used, created_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (meter_id, usage_date)
             DO UPDATE SET kwh_used = usage_history.kwh_used + EXCLUDED.kwh_used
             RETURNING {USAGE_HISTORY_COLUMNS}"
        ))
        .bind(meter_id)
        .bind(usage_date)
        .bind(delta)
        .bind(at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| range_error(e, "deltaKwh"))?;

        tx.commit().await?;
        Ok(Some((meter, usage)))
    }

    async fn apply_top_up(
        &self,
        meter_id: i64,
        token_number: &str,
        kwh_added: Decimal,
        price: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Option<(Meter, TokenHistory)>, ApiError> {
        let mut tx = self.pool.begin().await?;

        let meter = sqlx::query_as::<_, Meter>(&format!(
            "UPDATE meters
             SET token_balance = token_balance + $2
             WHERE id = $1
             RETURNING {METER_COLUMNS}"
        ))
        .bind(meter_id)
        .bind(price)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| range_error(e, "price"))?;

        let Some(meter) = meter else {
            tx.rollback().await?;
            return Ok(None);
        };

        // A failure here drops `tx`, which rolls the balance change back
        let record = sqlx::query_as::<_, TokenHistory>(&format!(
            "INSERT INTO token_history (meter_id, token_number, kwh_added, price, created_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {TOKEN_HISTORY_COLUMNS}"
        ))
        .bind(meter_id)
        .bind(token_number)
        .bind(kwh_added)
        .bind(price)
        .bind(at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::Conflict(format!("Token serial {} already issued", token_number))
            } else {
                ApiError::Database(e)
            }
        })?;

        tx.commit().await?;
        Ok(Some((meter, record)))
    }

    async fn token_history(&self, meter_id: i64) -> Result<Vec<TokenHistory>, ApiError> {
        let rows = sqlx::query_as::<_, TokenHistory>(&format!(
            "SELECT {TOKEN_HISTORY_COLUMNS} FROM token_history
             WHERE meter_id = $1
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(meter_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn usage_history(
        &self,
        meter_id: i64,
        since: NaiveDate,
    ) -> Result<Vec<UsageHistory>, ApiError> {
        let rows = sqlx::query_as::<_, UsageHistory>(&format!(
            "SELECT {USAGE_HISTORY_COLUMNS} FROM usage_history
             WHERE meter_id = $1 AND usage_date >= $2
             ORDER BY usage_date DESC"
        ))
        .bind(meter_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn sum_usage_on(&self, usage_date: NaiveDate) -> Result<Decimal, ApiError> {
        let total = sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(kwh_used), 0) FROM usage_history WHERE usage_date = $1",
        )
        .bind(usage_date)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }
}
