use std::time::Instant;

use mote_client::{
    db::TelemetryStore,
    domain::{AuthStatus, ChartPointer, DeviceCategory},
};
use time::OffsetDateTime;

use crate::{
    chart::write_chart,
    config::ChartsConfig,
    error::ChartError,
    metrics,
    series::build_series,
};

/// What one category produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryOutcome {
    pub category: DeviceCategory,
    pub relative_path: String,
    pub devices: usize,
    pub points: usize,
    pub pointer_created: bool,
}

#[derive(Debug)]
pub struct CategoryFailure {
    pub category: DeviceCategory,
    pub error: ChartError,
}

/// Result of a full run. Categories that failed do not stop the others.
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<CategoryOutcome>,
    pub failures: Vec<CategoryFailure>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Fails when any category failed, naming every failed category.
    pub fn into_result(self) -> Result<Vec<CategoryOutcome>, ChartError> {
        if self.failures.is_empty() {
            return Ok(self.outcomes);
        }
        let failed = self
            .failures
            .iter()
            .map(|f| format!("{}: {}", f.category, f.error))
            .collect::<Vec<_>>()
            .join("; ");
        Err(ChartError::CategoriesFailed(failed))
    }
}

/// Regenerate the chart of every category, in water, energy, gas order.
pub async fn generate_all(store: &dyn TelemetryStore, config: &ChartsConfig, now: OffsetDateTime) -> RunReport {
    let mut report = RunReport::default();

    for category in DeviceCategory::ALL {
        let started = Instant::now();
        match generate_category(store, config, category, now).await {
            Ok(outcome) => {
                metrics::record_chart_rendered(category, started.elapsed());
                tracing::info!(
                    category = %category,
                    path = %outcome.relative_path,
                    devices = outcome.devices,
                    points = outcome.points,
                    pointer_created = outcome.pointer_created,
                    "chart generated"
                );
                report.outcomes.push(outcome);
            }
            Err(error) => {
                metrics::record_chart_failure(category, error.kind());
                tracing::error!(category = %category, error = %error, "chart generation failed");
                report.failures.push(CategoryFailure { category, error });
            }
        }
    }

    report
}

/// Build, render and register the chart of one category.
pub async fn generate_category(
    store: &dyn TelemetryStore,
    config: &ChartsConfig,
    category: DeviceCategory,
    now: OffsetDateTime,
) -> Result<CategoryOutcome, ChartError> {
    let device_ids = store.authorized_device_ids(category).await?;
    metrics::update_device_stats(category, AuthStatus::Authorized, device_ids.len());

    let since = now - config.window();
    let zones = config.zones();
    let series = build_series(store, &device_ids, since, zones).await?;
    let points = series.values().map(Vec::len).sum();

    let relative_path = config.relative_path(category);
    let output_path = config.output_root.join(&relative_path);
    write_chart(
        &series,
        config.unit_for(category),
        zones.display,
        &config.style_for(category),
        &output_path,
    )?;

    let pointer_created = store
        .insert_chart_pointer_if_absent(&ChartPointer {
            category,
            file_path: relative_path.clone(),
        })
        .await?;
    if pointer_created {
        metrics::record_pointer_created(category);
    } else {
        tracing::debug!(category = %category, "chart pointer already present");
    }

    Ok(CategoryOutcome {
        category,
        relative_path,
        devices: device_ids.len(),
        points,
        pointer_created,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigZone;
    use async_trait::async_trait;
    use mote_client::{
        db::{SqliteTelemetryStore, StoreError},
        domain::{Device, NewDevice, Reading},
    };
    use std::{fs, path::Path};
    use time::{macros::datetime, Duration};

    const NOW: OffsetDateTime = datetime!(2024-05-01 12:00:00 UTC);

    fn config(root: &Path) -> ChartsConfig {
        ChartsConfig {
            output_root: root.to_path_buf(),
            ..ChartsConfig::default()
        }
    }

    async fn device(store: &SqliteTelemetryStore, name: &str, category: DeviceCategory) -> i64 {
        store
            .create_device(&NewDevice {
                name: Some(name.to_string()),
                category,
                auth_status: AuthStatus::Authorized,
            })
            .await
            .unwrap()
    }

    async fn reading(store: &SqliteTelemetryStore, device_id: i64, ago: Duration, value: f64) {
        store
            .insert_readings(&[Reading {
                device_id,
                collected_at: (NOW - ago).into(),
                last_collection: value,
                total: value,
            }])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn every_category_gets_a_chart_and_a_pointer() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteTelemetryStore::in_memory().await.unwrap();
        for (name, category) in [
            ("WaterMote-1", DeviceCategory::Water),
            ("EnergyMote-1", DeviceCategory::Energy),
            ("GasMote-1", DeviceCategory::Gas),
        ] {
            let id = device(&store, name, category).await;
            reading(&store, id, Duration::hours(2), 4.5).await;
        }

        let outcomes = generate_all(&store, &config(dir.path()), NOW).await.into_result().unwrap();
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|o| o.devices == 1 && o.points == 1 && o.pointer_created));

        let pointers = store.chart_pointers().await.unwrap();
        let paths: Vec<&str> = pointers.iter().map(|p| p.file_path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "graphs/allWMoteDevices24hRaw.html",
                "graphs/allEMoteDevices24hRaw.html",
                "graphs/allGMoteDevices24hRaw.html",
            ]
        );

        let water = fs::read_to_string(dir.path().join(paths[0])).unwrap();
        assert!(water.contains("WaterMote-1&#10;Time: 10:00&#10;Consumption: 4.50 L"));
        let gas = fs::read_to_string(dir.path().join(paths[2])).unwrap();
        assert!(gas.contains("Consumption: 4.50 m³"));
    }

    #[tokio::test]
    async fn empty_store_still_produces_placeholder_charts() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteTelemetryStore::in_memory().await.unwrap();
        let cfg = config(dir.path());

        let outcomes = generate_all(&store, &cfg, NOW).await.into_result().unwrap();
        assert!(outcomes.iter().all(|o| o.devices == 0 && o.points == 0));

        for category in DeviceCategory::ALL {
            let html = fs::read_to_string(cfg.output_path(category)).unwrap();
            assert!(html.contains("No readings collected in the last 24h"));
            assert!(html.contains("no-hover"));
        }
        assert_eq!(store.chart_pointers().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn duplicate_names_are_disambiguated_in_the_legend() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteTelemetryStore::in_memory().await.unwrap();
        let first = device(&store, "Sensor", DeviceCategory::Energy).await;
        let second = device(&store, "Sensor", DeviceCategory::Energy).await;
        reading(&store, first, Duration::minutes(30), 100.0).await;
        reading(&store, second, Duration::minutes(30), 200.0).await;
        // Outside the window.
        reading(&store, second, Duration::hours(25), 900.0).await;

        let cfg = config(dir.path());
        let outcome = generate_category(&store, &cfg, DeviceCategory::Energy, NOW).await.unwrap();
        assert_eq!(outcome.points, 2);

        let html = fs::read_to_string(cfg.output_path(DeviceCategory::Energy)).unwrap();
        assert!(html.contains("<title>Sensor&#10;"));
        assert!(html.contains(&format!("<title>Sensor ({second})&#10;")));
        assert!(!html.contains("900.00"));
    }

    #[tokio::test]
    async fn charts_use_the_configured_display_zone() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteTelemetryStore::in_memory().await.unwrap();
        let id = device(&store, "WaterMote-1", DeviceCategory::Water).await;
        reading(&store, id, Duration::hours(2), 4.5).await;

        let mut cfg = config(dir.path());
        cfg.display_timezone = ConfigZone(chrono_tz::America::Sao_Paulo);
        generate_category(&store, &cfg, DeviceCategory::Water, NOW).await.unwrap();

        let html = fs::read_to_string(cfg.output_path(DeviceCategory::Water)).unwrap();
        assert!(html.contains("WaterMote-1&#10;Time: 07:00&#10;Consumption: 4.50 L"));
        assert!(html.contains("-03:00"));
    }

    #[tokio::test]
    async fn second_run_keeps_the_first_pointer() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteTelemetryStore::in_memory().await.unwrap();
        let mut cfg = config(dir.path());

        let first = generate_all(&store, &cfg, NOW).await.into_result().unwrap();
        assert!(first.iter().all(|o| o.pointer_created));

        cfg.path_template = "charts/{category}.html".to_string();
        let second = generate_all(&store, &cfg, NOW).await.into_result().unwrap();
        assert!(second.iter().all(|o| !o.pointer_created));

        let pointers = store.chart_pointers().await.unwrap();
        assert_eq!(pointers.len(), 3);
        assert_eq!(pointers[0].file_path, "graphs/allWMoteDevices24hRaw.html");
    }

    #[tokio::test]
    async fn unauthorized_devices_are_left_out() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteTelemetryStore::in_memory().await.unwrap();
        let id = store
            .create_device(&NewDevice {
                name: Some("Rogue".to_string()),
                category: DeviceCategory::Water,
                auth_status: AuthStatus::Unauthorized,
            })
            .await
            .unwrap();
        reading(&store, id, Duration::hours(1), 1.0).await;

        let cfg = config(dir.path());
        let outcome = generate_category(&store, &cfg, DeviceCategory::Water, NOW).await.unwrap();
        assert_eq!(outcome.devices, 0);
        let html = fs::read_to_string(cfg.output_path(DeviceCategory::Water)).unwrap();
        assert!(!html.contains("Rogue"));
    }

    /// Fails every call touching one category's device list.
    struct FailingCategory {
        inner: SqliteTelemetryStore,
        broken: DeviceCategory,
    }

    #[async_trait]
    impl TelemetryStore for FailingCategory {
        async fn ensure_schema(&self) -> Result<(), StoreError> {
            self.inner.ensure_schema().await
        }

        async fn authorized_device_ids(&self, category: DeviceCategory) -> Result<Vec<i64>, StoreError> {
            if category == self.broken {
                return Err(StoreError::InvalidTimestamp("broken".to_string()));
            }
            self.inner.authorized_device_ids(category).await
        }

        async fn devices_by_ids(&self, ids: &[i64]) -> Result<Vec<Device>, StoreError> {
            self.inner.devices_by_ids(ids).await
        }

        async fn readings_since(&self, device_id: i64, since: OffsetDateTime) -> Result<Vec<Reading>, StoreError> {
            self.inner.readings_since(device_id, since).await
        }

        async fn chart_pointers(&self) -> Result<Vec<ChartPointer>, StoreError> {
            self.inner.chart_pointers().await
        }

        async fn insert_chart_pointer_if_absent(&self, pointer: &ChartPointer) -> Result<bool, StoreError> {
            self.inner.insert_chart_pointer_if_absent(pointer).await
        }

        async fn create_device(&self, device: &NewDevice) -> Result<i64, StoreError> {
            self.inner.create_device(device).await
        }

        async fn device_id_by_name(&self, name: &str, category: DeviceCategory) -> Result<Option<i64>, StoreError> {
            self.inner.device_id_by_name(name, category).await
        }

        async fn insert_readings(&self, readings: &[Reading]) -> Result<u64, StoreError> {
            self.inner.insert_readings(readings).await
        }

        async fn delete_readings(&self, device_ids: &[i64]) -> Result<u64, StoreError> {
            self.inner.delete_readings(device_ids).await
        }
    }

    #[tokio::test]
    async fn a_failing_category_does_not_stop_the_others() {
        let dir = tempfile::tempdir().unwrap();
        let store = FailingCategory {
            inner: SqliteTelemetryStore::in_memory().await.unwrap(),
            broken: DeviceCategory::Energy,
        };

        let report = generate_all(&store, &config(dir.path()), NOW).await;
        assert!(!report.is_success());
        let done: Vec<DeviceCategory> = report.outcomes.iter().map(|o| o.category).collect();
        assert_eq!(done, vec![DeviceCategory::Water, DeviceCategory::Gas]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].category, DeviceCategory::Energy);

        let err = report.into_result().unwrap_err();
        assert!(err.to_string().contains("energy"));
        assert_eq!(store.inner.chart_pointers().await.unwrap().len(), 2);
    }
}
