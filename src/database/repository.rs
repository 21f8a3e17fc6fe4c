//! Store traits: the persistence handle injected into every component.
//!
//! Each trait covers one aggregate. Mutations that must be atomic per meter
//! (energy increments, top-ups, usage appends) are single trait calls so the
//! implementation can apply them inside one storage-level primitive:
//! a conditional `UPDATE ... SET x = x + $n` or transaction in Postgres,
//! an exclusive entry guard in the in-memory store.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::error::ApiError;
use crate::models::{Meter, MeterWithOwner, NewMeter, NewUser, Session, TokenHistory, UsageHistory, User};

#[async_trait]
pub trait UserStore: Send + Sync {
    /// `email` is expected to be normalized already
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ApiError>;

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, ApiError>;

    /// Fails with `Conflict` when the email is taken
    async fn insert_user(&self, user: NewUser) -> Result<User, ApiError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fails with `Conflict` on a duplicate token digest and with a
    /// persistence error when the owning user does not exist.
    async fn insert_session(&self, session: Session) -> Result<(), ApiError>;

    async fn find_session(&self, token_hash: &str) -> Result<Option<Session>, ApiError>;

    /// Returns false if no live session matched
    async fn revoke_session(&self, token_hash: &str, at: DateTime<Utc>) -> Result<bool, ApiError>;

    /// Deletes sessions that expired at or before `now` or were revoked
    async fn delete_inactive_sessions(&self, now: DateTime<Utc>) -> Result<u64, ApiError>;
}

#[async_trait]
pub trait MeterStore: Send + Sync {
    /// Fails with `Conflict` when the meter number is taken
    async fn insert_meter(&self, meter: NewMeter) -> Result<Meter, ApiError>;

    async fn find_meter(&self, id: i64) -> Result<Option<Meter>, ApiError>;

    async fn find_meter_by_number(&self, meter_number: &str) -> Result<Option<Meter>, ApiError>;

    /// Ordered by meter id ascending
    async fn list_meters_with_owner(&self) -> Result<Vec<MeterWithOwner>, ApiError>;

    /// Atomically adds `delta` to `current_kwh` and moves `last_update`
    /// forward to `at` (never backwards). `None` if the meter is absent.
    async fn increment_energy(
        &self,
        meter_id: i64,
        delta: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Option<Meter>, ApiError>;
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Adds `kwh` to the (meter, date) usage row, creating it if needed.
    /// `None` if the meter is absent.
    async fn append_usage(
        &self,
        meter_id: i64,
        usage_date: NaiveDate,
        kwh: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Option<UsageHistory>, ApiError>;

    /// `increment_energy` and `append_usage` as one unit
    async fn increment_energy_with_usage(
        &self,
        meter_id: i64,
        delta: Decimal,
        usage_date: NaiveDate,
        at: DateTime<Utc>,
    ) -> Result<Option<(Meter, UsageHistory)>, ApiError>;

    /// Credits `price` to the token balance and appends the history row as
    /// one unit. Fails with `Conflict` when `token_number` is taken, in which
    /// case nothing is applied. `None` if the meter is absent.
    async fn apply_top_up(
        &self,
        meter_id: i64,
        token_number: &str,
        kwh_added: Decimal,
        price: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Option<(Meter, TokenHistory)>, ApiError>;

    /// Newest first
    async fn token_history(&self, meter_id: i64) -> Result<Vec<TokenHistory>, ApiError>;

    /// Rows with `usage_date >= since`, newest first
    async fn usage_history(
        &self,
        meter_id: i64,
        since: NaiveDate,
    ) -> Result<Vec<UsageHistory>, ApiError>;

    async fn sum_usage_on(&self, usage_date: NaiveDate) -> Result<Decimal, ApiError>;
}

/// Everything the application needs from one backing store
pub trait Store: UserStore + SessionStore + MeterStore + LedgerStore {}

impl<T> Store for T where T: UserStore + SessionStore + MeterStore + LedgerStore {}
