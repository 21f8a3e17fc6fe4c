use anyhow::Result;
use tracing::info;

use prepaid_meter_api::config::Config;
use prepaid_meter_api::database::{self, seed::seed_demo_data, PgStore};

/// Same cost the demo credentials were originally hashed with
const SEED_BCRYPT_COST: u32 = 10;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "prepaid_meter_api=info,seed=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    info!("🌱 Seeding database ({})", config.environment);

    let pool = database::setup_database(&config).await?;
    database::run_migrations(&pool).await?;

    let store = PgStore::new(pool);
    let report = seed_demo_data(&store, SEED_BCRYPT_COST).await?;

    info!(
        "✅ Seeding finished: {} users and {} meters created",
        report.users_created, report.meters_created
    );
    Ok(())
}
