use anyhow::Result;
use mote_charts::{config::AppConfig, generate_all, metrics, observability};
use time::OffsetDateTime;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();
    metrics::describe();

    let cfg = AppConfig::load()?;
    let store = mote_client::db::connect(&cfg.database.url, cfg.database.max_connections).await?;

    // Tables are normally provisioned via `sql/schema/*.sql`; this only fills gaps.
    store.ensure_schema().await?;

    let report = generate_all(store.as_ref(), &cfg.charts, OffsetDateTime::now_utc()).await;
    let outcomes = report.into_result()?;
    tracing::info!(charts = outcomes.len(), "chart run complete");

    Ok(())
}
