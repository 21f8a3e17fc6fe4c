//! In-process implementation of the store traits.
//!
//! Used by the test suites and for running the API without PostgreSQL.
//! Per-meter atomicity comes from `DashMap::get_mut`, which holds an
//! exclusive guard on the meter entry for the whole mutation. Guards are
//! always taken in the order meter → history to rule out lock cycles.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use rust_decimal::Decimal;

use super::repository::{LedgerStore, MeterStore, SessionStore, UserStore};
use crate::error::{ApiError, ErrorCode};
use crate::models::user::normalize_email;
use crate::models::{
    Meter, MeterWithOwner, NewMeter, NewUser, Session, TokenHistory, UsageHistory, User,
};
use crate::utils::quantity::checked_total;

#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<i64, User>,
    user_ids_by_email: DashMap<String, i64>,
    sessions: DashMap<String, Session>,
    meters: DashMap<i64, Meter>,
    meter_ids_by_number: DashMap<String, i64>,
    token_history: DashMap<String, TokenHistory>,
    usage_history: DashMap<(i64, NaiveDate), UsageHistory>,
    next_user_id: AtomicI64,
    next_meter_id: AtomicI64,
    next_history_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(counter: &AtomicI64) -> i64 {
        counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn upsert_usage(
        &self,
        field: &str,
        meter_id: i64,
        usage_date: NaiveDate,
        kwh: Decimal,
        at: DateTime<Utc>,
    ) -> Result<UsageHistory, ApiError> {
        match self.usage_history.entry((meter_id, usage_date)) {
            Entry::Occupied(mut slot) => {
                let row = slot.get_mut();
                row.kwh_used = checked_total(field, row.kwh_used, kwh)?;
                Ok(row.clone())
            }
            Entry::Vacant(slot) => {
                let row = UsageHistory {
                    id: Self::next_id(&self.next_history_id),
                    meter_id,
                    usage_date,
                    kwh_used: kwh,
                    created_at: at,
                };
                slot.insert(row.clone());
                Ok(row)
            }
        }
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let Some(id) = self.user_ids_by_email.get(&normalize_email(email)).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, ApiError> {
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, ApiError> {
        let email = normalize_email(&user.email);
        match self.user_ids_by_email.entry(email.clone()) {
            Entry::Occupied(_) => Err(ApiError::Conflict(format!(
                "User with email {} already exists",
                email
            ))),
            Entry::Vacant(slot) => {
                let record = User {
                    id: Self::next_id(&self.next_user_id),
                    name: user.name,
                    email,
                    password_hash: user.password_hash,
                    role: user.role,
                    created_at: Utc::now(),
                };
                self.users.insert(record.id, record.clone());
                slot.insert(record.id);
                Ok(record)
            }
        }
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert_session(&self, session: Session) -> Result<(), ApiError> {
        if !self.users.contains_key(&session.user_id) {
            return Err(ApiError::Persistence(format!(
                "Session owner {} does not exist",
                session.user_id
            )));
        }

        match self.sessions.entry(session.token_hash.clone()) {
            Entry::Occupied(_) => Err(ApiError::Conflict("Session token collision".to_string())),
            Entry::Vacant(slot) => {
                slot.insert(session);
                Ok(())
            }
        }
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<Session>, ApiError> {
        Ok(self.sessions.get(token_hash).map(|s| s.value().clone()))
    }

    async fn revoke_session(&self, token_hash: &str, at: DateTime<Utc>) -> Result<bool, ApiError> {
        match self.sessions.get_mut(token_hash) {
            Some(mut session) if session.revoked_at.is_none() => {
                session.revoked_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_inactive_sessions(&self, now: DateTime<Utc>) -> Result<u64, ApiError> {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, s| s.revoked_at.is_none() && s.expires_at > now);
        Ok(before.saturating_sub(self.sessions.len()) as u64)
    }
}

#[async_trait]
impl MeterStore for MemoryStore {
    async fn insert_meter(&self, meter: NewMeter) -> Result<Meter, ApiError> {
        if !self.users.contains_key(&meter.user_id) {
            return Err(ApiError::Persistence(format!(
                "Meter owner {} does not exist",
                meter.user_id
            )));
        }
        if meter.current_kwh.is_sign_negative() || meter.token_balance.is_sign_negative() {
            return Err(ApiError::with_code(
                ErrorCode::ConstraintViolation,
                "Meter counters must not be negative",
            ));
        }

        match self.meter_ids_by_number.entry(meter.meter_number.clone()) {
            Entry::Occupied(_) => Err(ApiError::Conflict(format!(
                "Meter {} already exists",
                meter.meter_number
            ))),
            Entry::Vacant(slot) => {
                let record = Meter {
                    id: Self::next_id(&self.next_meter_id),
                    user_id: meter.user_id,
                    meter_number: meter.meter_number,
                    alias: meter.alias,
                    power_limit_va: meter.power_limit_va,
                    current_kwh: meter.current_kwh,
                    current_watt: meter.current_watt,
                    token_balance: meter.token_balance,
                    last_update: Utc::now(),
                };
                self.meters.insert(record.id, record.clone());
                slot.insert(record.id);
                Ok(record)
            }
        }
    }

    async fn find_meter(&self, id: i64) -> Result<Option<Meter>, ApiError> {
        Ok(self.meters.get(&id).map(|m| m.value().clone()))
    }

    async fn find_meter_by_number(&self, meter_number: &str) -> Result<Option<Meter>, ApiError> {
        let Some(id) = self.meter_ids_by_number.get(meter_number).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.meters.get(&id).map(|m| m.value().clone()))
    }

    async fn list_meters_with_owner(&self) -> Result<Vec<MeterWithOwner>, ApiError> {
        let mut meters: Vec<Meter> = self.meters.iter().map(|m| m.value().clone()).collect();
        meters.sort_by_key(|m| m.id);

        meters
            .into_iter()
            .map(|meter| {
                let owner = self.users.get(&meter.user_id).ok_or_else(|| {
                    ApiError::Persistence(format!(
                        "Meter {} references missing user {}",
                        meter.id, meter.user_id
                    ))
                })?;
                Ok(MeterWithOwner {
                    owner_name: owner.name.clone(),
                    owner_email: owner.email.clone(),
                    meter,
                })
            })
            .collect()
    }

    async fn increment_energy(
        &self,
        meter_id: i64,
        delta: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Option<Meter>, ApiError> {
        let Some(mut meter) = self.meters.get_mut(&meter_id) else {
            return Ok(None);
        };
        meter.current_kwh = checked_total("deltaKwh", meter.current_kwh, delta)?;
        meter.last_update = meter.last_update.max(at);
        Ok(Some(meter.value().clone()))
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn append_usage(
        &self,
        meter_id: i64,
        usage_date: NaiveDate,
        kwh: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Option<UsageHistory>, ApiError> {
        // Hold the meter entry so the append is ordered with other ledger writes
        let Some(_meter) = self.meters.get_mut(&meter_id) else {
            return Ok(None);
        };
        self.upsert_usage("kwhUsed", meter_id, usage_date, kwh, at).map(Some)
    }

    async fn increment_energy_with_usage(
        &self,
        meter_id: i64,
        delta: Decimal,
        usage_date: NaiveDate,
        at: DateTime<Utc>,
    ) -> Result<Option<(Meter, UsageHistory)>, ApiError> {
        let Some(mut meter) = self.meters.get_mut(&meter_id) else {
            return Ok(None);
        };
        // Both totals are checked before either is written
        let current_kwh = checked_total("deltaKwh", meter.current_kwh, delta)?;
        let usage = self.upsert_usage("deltaKwh", meter_id, usage_date, delta, at)?;
        meter.current_kwh = current_kwh;
        meter.last_update = meter.last_update.max(at);
        Ok(Some((meter.value().clone(), usage)))
    }

    async fn apply_top_up(
        &self,
        meter_id: i64,
        token_number: &str,
        kwh_added: Decimal,
        price: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Option<(Meter, TokenHistory)>, ApiError> {
        let Some(mut meter) = self.meters.get_mut(&meter_id) else {
            return Ok(None);
        };

        let new_balance = checked_total("price", meter.token_balance, price)?;
        if new_balance.is_sign_negative() {
            return Err(ApiError::with_code(
                ErrorCode::ConstraintViolation,
                "Token balance must not be negative",
            ));
        }

        let record = match self.token_history.entry(token_number.to_string()) {
            Entry::Occupied(_) => {
                return Err(ApiError::Conflict(format!(
                    "Token serial {} already issued",
                    token_number
                )))
            }
            Entry::Vacant(slot) => {
                let record = TokenHistory {
                    id: Self::next_id(&self.next_history_id),
                    meter_id,
                    token_number: token_number.to_string(),
                    kwh_added,
                    price,
                    created_at: at,
                };
                slot.insert(record.clone());
                record
            }
        };

        meter.token_balance = new_balance;
        Ok(Some((meter.value().clone(), record)))
    }

    async fn token_history(&self, meter_id: i64) -> Result<Vec<TokenHistory>, ApiError> {
        let mut rows: Vec<TokenHistory> = self
            .token_history
            .iter()
            .filter(|r| r.meter_id == meter_id)
            .map(|r| r.value().clone())
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn usage_history(
        &self,
        meter_id: i64,
        since: NaiveDate,
    ) -> Result<Vec<UsageHistory>, ApiError> {
        let mut rows: Vec<UsageHistory> = self
            .usage_history
            .iter()
            .filter(|r| r.meter_id == meter_id && r.usage_date >= since)
            .map(|r| r.value().clone())
            .collect();
        rows.sort_by(|a, b| b.usage_date.cmp(&a.usage_date));
        Ok(rows)
    }

    async fn sum_usage_on(&self, usage_date: NaiveDate) -> Result<Decimal, ApiError> {
        self.usage_history
            .iter()
            .filter(|r| r.usage_date == usage_date)
            .try_fold(Decimal::ZERO, |total, r| total.checked_add(r.kwh_used))
            .ok_or_else(|| ApiError::Persistence("Daily usage total overflowed".to_string()))
    }
}
