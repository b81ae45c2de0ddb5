use anyhow::Result;
use mote_charts::{config::AppConfig, demo, generate_all, metrics, observability};
use rand::{rngs::StdRng, SeedableRng};
use time::OffsetDateTime;

/// Fill the configured database with demo devices and a day of readings,
/// then regenerate the charts.
#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();
    metrics::describe();

    let cfg = AppConfig::load()?;
    let store = mote_client::db::connect(&cfg.database.url, cfg.database.max_connections).await?;

    let now = OffsetDateTime::now_utc();
    let mut rng = StdRng::from_entropy();
    let summary = demo::seed(store.as_ref(), now, cfg.charts.zones().display, &mut rng).await?;
    tracing::info!(
        devices_created = summary.devices_created,
        readings_deleted = summary.readings_deleted,
        readings_inserted = summary.readings_inserted,
        "demo data seeded"
    );

    let outcomes = generate_all(store.as_ref(), &cfg.charts, now).await.into_result()?;
    for outcome in &outcomes {
        tracing::info!(category = %outcome.category, path = %outcome.relative_path, points = outcome.points, "chart ready");
    }

    Ok(())
}
