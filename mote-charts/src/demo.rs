//! Synthetic readings for development databases.

use std::time::Instant;

use mote_client::{
    db::TelemetryStore,
    domain::{AuthStatus, DeviceCategory, NewDevice, Reading},
};
use chrono_tz::Tz;
use rand::Rng;
use time::{Duration, OffsetDateTime};

use crate::{error::ChartError, metrics, zone};

pub const DEVICES_PER_CATEGORY: usize = 3;
pub const READINGS_PER_DEVICE: i64 = 96;
const READING_INTERVAL: Duration = Duration::minutes(15);

/// Consumption shape of one category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DemoProfile {
    pub base: f64,
    /// Full width of the uniform noise band centered on zero.
    pub variation: f64,
    pub spike_chance: f64,
}

impl DemoProfile {
    pub fn for_category(category: DeviceCategory) -> Self {
        match category {
            DeviceCategory::Water => Self {
                base: 15.0,
                variation: 8.0,
                spike_chance: 0.15,
            },
            DeviceCategory::Energy => Self {
                base: 350.0,
                variation: 150.0,
                spike_chance: 0.20,
            },
            DeviceCategory::Gas => Self {
                base: 0.08,
                variation: 0.04,
                spike_chance: 0.10,
            },
        }
    }
}

pub fn device_name(category: DeviceCategory, n: usize) -> String {
    let prefix = match category {
        DeviceCategory::Water => "WaterMote",
        DeviceCategory::Energy => "EnergyMote",
        DeviceCategory::Gas => "GasMote",
    };
    format!("{prefix}-{n}")
}

/// Usage multiplier for the hour of day: morning and evening peaks, a quiet
/// night.
pub fn hour_multiplier<R: Rng + ?Sized>(hour: u8, rng: &mut R) -> f64 {
    match hour {
        6..=9 | 18..=22 => rng.gen_range(1.2..1.8),
        0..=5 => rng.gen_range(0.2..0.5),
        _ => rng.gen_range(0.6..1.2),
    }
}

/// One reading every 15 minutes over the 24 hours before `now`, oldest
/// first. Hours of day are taken in `local`.
pub fn generate_readings<R: Rng + ?Sized>(
    device_id: i64,
    category: DeviceCategory,
    now: OffsetDateTime,
    local: Tz,
    rng: &mut R,
) -> Result<Vec<Reading>, ChartError> {
    let profile = DemoProfile::for_category(category);
    let start = now - READING_INTERVAL * READINGS_PER_DEVICE as i32;

    (0..READINGS_PER_DEVICE)
        .map(|i| {
            let at = start + READING_INTERVAL * i as i32;
            let mut multiplier = hour_multiplier(zone::in_zone(at, local)?.hour(), rng);
            if rng.gen_bool(profile.spike_chance) {
                multiplier *= rng.gen_range(2.0..3.5);
            }
            let half = profile.variation / 2.0;
            let value = (profile.base * multiplier + rng.gen_range(-half..half)).max(0.0);
            Ok(Reading {
                device_id,
                collected_at: at.into(),
                last_collection: round2(value),
                total: round2(value * (i + 1) as f64),
            })
        })
        .collect()
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeedSummary {
    pub devices_created: usize,
    pub readings_deleted: u64,
    pub readings_inserted: u64,
}

/// Make sure the demo devices exist, replace their readings with fresh
/// synthetic ones and update the ingestion gauges.
pub async fn seed<R: Rng + ?Sized>(
    store: &dyn TelemetryStore,
    now: OffsetDateTime,
    local: Tz,
    rng: &mut R,
) -> Result<SeedSummary, ChartError> {
    store.ensure_schema().await?;
    let mut summary = SeedSummary::default();

    let mut devices = Vec::with_capacity(DeviceCategory::ALL.len() * DEVICES_PER_CATEGORY);
    for category in DeviceCategory::ALL {
        for n in 1..=DEVICES_PER_CATEGORY {
            let name = device_name(category, n);
            let id = match store.device_id_by_name(&name, category).await? {
                Some(id) => id,
                None => {
                    let id = store
                        .create_device(&NewDevice {
                            name: Some(name.clone()),
                            category,
                            auth_status: AuthStatus::Authorized,
                        })
                        .await?;
                    tracing::info!(device_id = id, name = %name, "demo device created");
                    summary.devices_created += 1;
                    id
                }
            };
            devices.push((id, category));
        }
    }

    let ids: Vec<i64> = devices.iter().map(|(id, _)| *id).collect();
    summary.readings_deleted = store.delete_readings(&ids).await?;

    for category in DeviceCategory::ALL {
        let mut consumed = 0.0;
        for (id, _) in devices.iter().filter(|(_, c)| *c == category) {
            let readings = generate_readings(*id, category, now, local, rng)?;
            consumed += readings.iter().map(|r| r.last_collection).sum::<f64>();

            let started = Instant::now();
            let inserted = match store.insert_readings(&readings).await {
                Ok(n) => n,
                Err(e) => {
                    metrics::track_store_error(category, "database");
                    return Err(e.into());
                }
            };
            metrics::track_store_duration(category, started.elapsed());
            metrics::track_data_received(category, "last_collection", inserted);
            summary.readings_inserted += inserted;
            tracing::info!(device_id = *id, category = %category, readings = inserted, "demo readings inserted");
        }

        match category {
            // 15 minute samples in W -> kWh.
            DeviceCategory::Energy => metrics::update_energy_stats(category, consumed * 0.25 / 1000.0),
            _ => metrics::update_volume_stats(category, consumed),
        }
        metrics::update_device_stats(category, AuthStatus::Authorized, DEVICES_PER_CATEGORY);
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mote_client::db::SqliteTelemetryStore;
    use rand::{rngs::StdRng, SeedableRng};
    use mote_client::domain::CollectedAt;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2024-05-01 12:00:00 UTC);

    #[test]
    fn readings_cover_the_last_day_every_fifteen_minutes() {
        let mut rng = StdRng::seed_from_u64(7);
        let readings = generate_readings(1, DeviceCategory::Water, NOW, chrono_tz::UTC, &mut rng).unwrap();

        assert_eq!(readings.len(), 96);
        assert_eq!(readings[0].collected_at, CollectedAt::Aware(NOW - Duration::hours(24)));
        assert_eq!(readings[95].collected_at, CollectedAt::Aware(NOW - Duration::minutes(15)));
        assert!(readings.iter().all(|r| r.last_collection >= 0.0));
    }

    #[test]
    fn values_are_rounded_and_totals_accumulate() {
        let mut rng = StdRng::seed_from_u64(11);
        let readings = generate_readings(2, DeviceCategory::Energy, NOW, chrono_tz::UTC, &mut rng).unwrap();
        for (i, r) in readings.iter().enumerate() {
            assert!((r.last_collection * 100.0 - (r.last_collection * 100.0).round()).abs() < 1e-6);
            // Total is derived from the unrounded value, so allow rounding slack.
            assert!((r.total - r.last_collection * (i + 1) as f64).abs() <= 0.005 * (i + 1) as f64 + 0.01);
        }
    }

    #[test]
    fn gas_values_stay_small() {
        let mut rng = StdRng::seed_from_u64(3);
        let readings = generate_readings(3, DeviceCategory::Gas, NOW, chrono_tz::UTC, &mut rng).unwrap();
        // Upper bound: base * 1.8 * 3.5 + half the variation.
        assert!(readings.iter().all(|r| r.last_collection <= 0.08 * 1.8 * 3.5 + 0.02 + 0.005));
    }

    #[test]
    fn night_hours_are_quieter() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            assert!(hour_multiplier(3, &mut rng) < 0.5);
            assert!(hour_multiplier(19, &mut rng) >= 1.2);
        }
    }

    #[tokio::test]
    async fn seeding_twice_reuses_devices_and_replaces_readings() {
        let store = SqliteTelemetryStore::in_memory().await.unwrap();
        let mut rng = StdRng::seed_from_u64(42);

        let first = seed(&store, NOW, chrono_tz::UTC, &mut rng).await.unwrap();
        assert_eq!(first.devices_created, 9);
        assert_eq!(first.readings_inserted, 9 * 96);
        assert_eq!(first.readings_deleted, 0);

        let second = seed(&store, NOW, chrono_tz::UTC, &mut rng).await.unwrap();
        assert_eq!(second.devices_created, 0);
        assert_eq!(second.readings_deleted, 9 * 96);

        let gas = store.authorized_device_ids(DeviceCategory::Gas).await.unwrap();
        assert_eq!(gas.len(), 3);
        let readings = store.readings_since(gas[0], NOW - Duration::hours(24)).await.unwrap();
        assert_eq!(readings.len(), 96);
    }
}
