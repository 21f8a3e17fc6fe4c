//! Demo fleet: one admin, two households, their meters, one top-up each and
//! five days of usage. Safe to run repeatedly.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tracing::info;

use super::repository::Store;
use super::schema::types::UserRole;
use crate::auth::password::PasswordService;
use crate::error::ApiError;
use crate::models::{NewMeter, NewUser, User};

struct DemoMeter {
    owner_email: &'static str,
    meter_number: &'static str,
    alias: &'static str,
    power_limit_va: i32,
    current_kwh: Decimal,
    current_watt: Decimal,
    token_number: &'static str,
    kwh_added: Decimal,
    price: Decimal,
    /// kWh per day, today first
    usage: [Decimal; 5],
}

/// What a seeding run created
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub users_created: usize,
    pub meters_created: usize,
}

fn demo_meters() -> [DemoMeter; 2] {
    [
        DemoMeter {
            owner_email: "budi@example.com",
            meter_number: "MTR-001-BUDI",
            alias: "Rumah Budi",
            power_limit_va: 1300,
            current_kwh: Decimal::new(1205, 1),
            current_watt: Decimal::from(315),
            token_number: "TOKBUD1",
            kwh_added: Decimal::from(45),
            price: Decimal::from(45_000),
            usage: [
                Decimal::new(32, 1),
                Decimal::new(28, 1),
                Decimal::new(24, 1),
                Decimal::new(21, 1),
                Decimal::new(19, 1),
            ],
        },
        DemoMeter {
            owner_email: "adi@example.com",
            meter_number: "MTR-002-ADI",
            alias: "Rumah Adi",
            power_limit_va: 2200,
            current_kwh: Decimal::new(983, 1),
            current_watt: Decimal::from(500),
            token_number: "TOKADI1",
            kwh_added: Decimal::from(75),
            price: Decimal::from(75_000),
            usage: [
                Decimal::new(41, 1),
                Decimal::new(37, 1),
                Decimal::new(33, 1),
                Decimal::new(29, 1),
                Decimal::new(25, 1),
            ],
        },
    ]
}

async fn ensure_user<S: Store + ?Sized>(
    store: &S,
    name: &str,
    email: &str,
    password: &str,
    role: UserRole,
    bcrypt_cost: u32,
    report: &mut SeedReport,
) -> Result<User, ApiError> {
    if let Some(user) = store.find_user_by_email(email).await? {
        return Ok(user);
    }

    let password_hash = PasswordService::hash_password_with_cost(password, bcrypt_cost)?;
    let user = store
        .insert_user(NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password_hash,
            role,
        })
        .await?;
    report.users_created += 1;
    info!("✅ User {} created (id {})", email, user.id);
    Ok(user)
}

pub async fn seed_demo_data<S: Store + ?Sized>(
    store: &S,
    bcrypt_cost: u32,
) -> Result<SeedReport, ApiError> {
    let mut report = SeedReport::default();

    ensure_user(store, "Admin", "admin@example.com", "admin", UserRole::Admin, bcrypt_cost, &mut report).await?;
    let budi = ensure_user(store, "Budi Budiman", "budi@example.com", "user", UserRole::User, bcrypt_cost, &mut report).await?;
    let adi = ensure_user(store, "Adi Setiawan", "adi@example.com", "user", UserRole::User, bcrypt_cost, &mut report).await?;

    let today = Utc::now().date_naive();

    for demo in demo_meters() {
        if store.find_meter_by_number(demo.meter_number).await?.is_some() {
            continue;
        }

        let owner = if demo.owner_email == budi.email { &budi } else { &adi };
        let meter = store
            .insert_meter(NewMeter {
                user_id: owner.id,
                meter_number: demo.meter_number.to_string(),
                alias: Some(demo.alias.to_string()),
                power_limit_va: demo.power_limit_va,
                current_kwh: demo.current_kwh,
                current_watt: demo.current_watt,
                token_balance: Decimal::ZERO,
            })
            .await?;

        // The opening balance is the seeded top-up itself
        store
            .apply_top_up(meter.id, demo.token_number, demo.kwh_added, demo.price, Utc::now())
            .await?
            .ok_or_else(|| ApiError::Persistence(format!("Meter {} vanished while seeding", meter.id)))?;

        for (offset, kwh) in demo.usage.iter().enumerate() {
            let date = today - Duration::days(offset as i64);
            store.append_usage(meter.id, date, *kwh, Utc::now()).await?;
        }

        report.meters_created += 1;
        info!("✅ Meter {} created for {}", demo.meter_number, owner.email);
    }

    Ok(report)
}
