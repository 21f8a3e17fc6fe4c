// Ledger Integration Test
// Energy increments, usage appends, top-ups and fleet summaries against the
// in-memory store seeded with the demo fleet

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use prepaid_meter_api::database::seed::seed_demo_data;
use prepaid_meter_api::database::MemoryStore;
use prepaid_meter_api::services::{LedgerEngine, MeterRegistry, MonitoringAggregator};
use rust_decimal::Decimal;

const BUDI_METER: i64 = 1;
const ADI_METER: i64 = 2;

struct Ledger {
    registry: MeterRegistry,
    ledger: LedgerEngine,
    monitoring: MonitoringAggregator,
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// Helper to build services over a freshly seeded store
async fn seeded_ledger() -> Ledger {
    let store = Arc::new(MemoryStore::default());
    seed_demo_data(store.as_ref(), 4).await.unwrap();

    let timeout = Duration::from_secs(5);
    let registry = MeterRegistry::new(store.clone(), timeout);
    let ledger = LedgerEngine::new(store, Decimal::from(1000), timeout);
    let monitoring = MonitoringAggregator::new(registry.clone(), ledger.clone());

    Ledger {
        registry,
        ledger,
        monitoring,
    }
}

#[tokio::test]
async fn update_energy_adds_exact_delta() {
    let fx = seeded_ledger().await;
    let before = fx.registry.get_meter_by_id(BUDI_METER).await.unwrap();

    let after = fx.registry.update_energy(BUDI_METER, dec("0.1")).await.unwrap();

    assert_eq!(after.current_kwh, dec("120.6"));
    assert!(after.last_update >= before.last_update);
    assert_eq!(after.token_balance, before.token_balance);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_increments_all_land() {
    let fx = seeded_ledger().await;

    let tasks: Vec<_> = (0..50)
        .map(|_| {
            let registry = fx.registry.clone();
            tokio::spawn(async move { registry.update_energy(ADI_METER, dec("0.1")).await })
        })
        .collect();

    for result in futures::future::join_all(tasks).await {
        result.unwrap().unwrap();
    }

    let meter = fx.registry.get_meter_by_id(ADI_METER).await.unwrap();
    assert_eq!(meter.current_kwh, dec("103.3"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_top_ups_all_credit() {
    let fx = seeded_ledger().await;

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let ledger = fx.ledger.clone();
            tokio::spawn(async move { ledger.top_up(BUDI_METER, dec("1"), Some(dec("1000"))).await })
        })
        .collect();

    for result in futures::future::join_all(tasks).await {
        result.unwrap().unwrap();
    }

    let meter = fx.registry.get_meter_by_id(BUDI_METER).await.unwrap();
    assert_eq!(meter.token_balance, dec("65000"));

    let history = fx.ledger.token_history(BUDI_METER).await.unwrap();
    assert_eq!(history.len(), 21);
    let serials: HashSet<&str> = history.iter().map(|t| t.token_number.as_str()).collect();
    assert_eq!(serials.len(), 21);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_consumption_keeps_reading_and_usage_in_step() {
    let fx = seeded_ledger().await;

    let tasks: Vec<_> = (0..40)
        .map(|_| {
            let ledger = fx.ledger.clone();
            tokio::spawn(async move { ledger.consume_energy(ADI_METER, dec("0.1")).await })
        })
        .collect();

    for result in futures::future::join_all(tasks).await {
        result.unwrap().unwrap();
    }

    let meter = fx.registry.get_meter_by_id(ADI_METER).await.unwrap();
    assert_eq!(meter.current_kwh, dec("102.3"));

    let today = fx.ledger.usage_history(ADI_METER, 1).await.unwrap();
    assert_eq!(today.len(), 1);
    assert_eq!(today[0].kwh_used, dec("8.1"));
}

#[tokio::test]
async fn oversized_amounts_are_rejected_without_side_effects() {
    let fx = seeded_ledger().await;
    let huge = Decimal::from_scientific("1e28").unwrap();

    assert!(fx.ledger.top_up(BUDI_METER, huge, None).await.unwrap_err().is_validation());
    assert!(fx
        .registry
        .update_energy(BUDI_METER, Decimal::MAX)
        .await
        .unwrap_err()
        .is_validation());
    assert!(fx
        .ledger
        .consume_energy(BUDI_METER, Decimal::MAX)
        .await
        .unwrap_err()
        .is_validation());

    let meter = fx.registry.get_meter_by_id(BUDI_METER).await.unwrap();
    assert_eq!(meter.current_kwh, dec("120.5"));
    assert_eq!(meter.token_balance, dec("45000"));
    assert_eq!(fx.ledger.usage_today().await.unwrap(), dec("7.3"));
}

#[tokio::test]
async fn negative_delta_leaves_meter_unchanged() {
    let fx = seeded_ledger().await;

    let err = fx
        .registry
        .update_energy(BUDI_METER, dec("-1.5"))
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let meter = fx.registry.get_meter_by_id(BUDI_METER).await.unwrap();
    assert_eq!(meter.current_kwh, dec("120.5"));
}

#[tokio::test]
async fn unknown_meter_is_not_found() {
    let fx = seeded_ledger().await;

    assert!(fx.registry.update_energy(42, Decimal::ONE).await.unwrap_err().is_not_found());
    assert!(fx.ledger.top_up(42, Decimal::ONE, None).await.unwrap_err().is_not_found());
    assert!(fx
        .ledger
        .record_usage(42, Utc::now().date_naive(), Decimal::ONE)
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn top_up_credits_price_and_records_serial() {
    let fx = seeded_ledger().await;

    let receipt = fx
        .ledger
        .top_up(BUDI_METER, dec("20"), Some(dec("20000")))
        .await
        .unwrap();

    assert_eq!(receipt.meter.token_balance, dec("65000"));
    assert_eq!(receipt.token.kwh_added, dec("20"));
    assert_eq!(receipt.token.price, dec("20000"));
    assert_eq!(receipt.token.token_number.len(), 20);
    assert!(receipt.token.token_number.bytes().all(|b| b.is_ascii_digit()));

    let history = fx.ledger.token_history(BUDI_METER).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].token_number, receipt.token.token_number);
    assert_eq!(history[1].token_number, "TOKBUD1");
}

#[tokio::test]
async fn top_up_without_price_uses_tariff() {
    let fx = seeded_ledger().await;

    let receipt = fx.ledger.top_up(ADI_METER, dec("1.5"), None).await.unwrap();

    assert_eq!(receipt.token.price, dec("1500"));
    assert_eq!(receipt.meter.token_balance, dec("76500"));
}

#[tokio::test]
async fn top_up_rejects_bad_amounts() {
    let fx = seeded_ledger().await;

    assert!(fx.ledger.top_up(BUDI_METER, Decimal::ZERO, None).await.unwrap_err().is_validation());
    assert!(fx
        .ledger
        .top_up(BUDI_METER, Decimal::ONE, Some(dec("-1")))
        .await
        .unwrap_err()
        .is_validation());

    let meter = fx.registry.get_meter_by_id(BUDI_METER).await.unwrap();
    assert_eq!(meter.token_balance, dec("45000"));
}

#[tokio::test]
async fn consume_energy_updates_reading_and_today() {
    let fx = seeded_ledger().await;

    let (meter, usage) = fx.ledger.consume_energy(BUDI_METER, dec("0.5")).await.unwrap();

    assert_eq!(meter.current_kwh, dec("121.0"));
    assert_eq!(usage.usage_date, Utc::now().date_naive());
    assert_eq!(usage.kwh_used, dec("3.7"));
}

#[tokio::test]
async fn record_usage_accumulates_per_day() {
    let fx = seeded_ledger().await;
    let day = Utc::now().date_naive() - chrono::Duration::days(10);

    fx.ledger.record_usage(ADI_METER, day, dec("1.25")).await.unwrap();
    let row = fx.ledger.record_usage(ADI_METER, day, dec("0.75")).await.unwrap();
    assert_eq!(row.kwh_used, dec("2.00"));

    // Usage rows do not move the cumulative reading
    let meter = fx.registry.get_meter_by_id(ADI_METER).await.unwrap();
    assert_eq!(meter.current_kwh, dec("98.3"));
}

#[tokio::test]
async fn usage_history_window() {
    let fx = seeded_ledger().await;

    let rows = fx.ledger.usage_history(BUDI_METER, 3).await.unwrap();
    let kwh: Vec<Decimal> = rows.iter().map(|r| r.kwh_used).collect();
    assert_eq!(kwh, vec![dec("3.2"), dec("2.8"), dec("2.4")]);

    assert_eq!(fx.ledger.usage_history(BUDI_METER, 30).await.unwrap().len(), 5);
    assert!(fx.ledger.usage_history(BUDI_METER, 0).await.unwrap_err().is_validation());
}

#[tokio::test]
async fn fleet_summary_reduces_registry() {
    let fx = seeded_ledger().await;

    let summary = fx.monitoring.fleet_summary().await.unwrap();

    assert_eq!(summary.total_kwh, dec("218.8"));
    assert_eq!(summary.today_kwh, dec("7.3"));
    assert_eq!(summary.active_meter_count, 2);
    assert_eq!(summary.list[0].name, "Budi Budiman");
    assert_eq!(summary.list[0].token, dec("45000"));
    assert_eq!(summary.list[1].watt, dec("500"));
}

#[tokio::test]
async fn tokens_listing_is_ordered_by_meter() {
    let fx = seeded_ledger().await;

    let listing = fx.monitoring.tokens_listing().await.unwrap();

    assert_eq!(listing.len(), 2);
    assert_eq!(listing[0].meter_id, BUDI_METER);
    assert_eq!(listing[0].email, "budi@example.com");
    assert_eq!(listing[1].meter_id, ADI_METER);
    assert_eq!(listing[1].token, dec("75000"));
}
