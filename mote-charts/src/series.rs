use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono_tz::Tz;
use mote_client::{
    db::TelemetryStore,
    domain::{CollectedAt, Reading},
};
use time::OffsetDateTime;

use crate::{error::ChartError, zone};

/// One plotted sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub at: OffsetDateTime,
    pub value: f64,
}

/// Display label -> samples ordered by time. Iteration order is the
/// lexicographic label order used for drawing and color assignment.
pub type DeviceSeries = BTreeMap<String, Vec<SeriesPoint>>;

/// Zones used to normalize collection timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeZones {
    /// Wall-clock zone of timestamps stored without an offset.
    pub assumed: Tz,
    /// Every emitted timestamp carries the offset this zone observes at
    /// that instant.
    pub display: Tz,
}

impl Default for TimeZones {
    fn default() -> Self {
        Self {
            assumed: chrono_tz::UTC,
            display: chrono_tz::UTC,
        }
    }
}

/// Build one series per requested device from readings collected at or
/// after `since`.
///
/// Every id yields exactly one entry, possibly empty; ids without a device
/// row get the synthesized label.
pub async fn build_series(
    store: &dyn TelemetryStore,
    device_ids: &[i64],
    since: OffsetDateTime,
    zones: TimeZones,
) -> Result<DeviceSeries, ChartError> {
    let ids: Vec<i64> = device_ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();

    let names: HashMap<i64, Option<String>> = store
        .devices_by_ids(&ids)
        .await?
        .into_iter()
        .map(|d| (d.id, d.name))
        .collect();

    let labels = assign_labels(
        ids.iter()
            .map(|id| (*id, names.get(id).and_then(|n| n.as_deref()))),
    );

    let mut series = DeviceSeries::new();
    for (device_id, label) in labels {
        let readings = store.readings_since(device_id, since).await?;
        let points = window_points(&readings, since, zones)?;
        tracing::debug!(device_id, label = %label, points = points.len(), "device series built");
        series.insert(label, points);
    }

    Ok(series)
}

/// Assign a unique display label to each device.
///
/// Devices are taken in ascending id order. A device keeps its name when it
/// is non-blank, otherwise it becomes `Device {id}`. A label already taken by
/// an earlier device gets ` ({id})` appended until it is unique.
pub fn assign_labels<'a>(devices: impl IntoIterator<Item = (i64, Option<&'a str>)>) -> Vec<(i64, String)> {
    let mut devices: Vec<_> = devices.into_iter().collect();
    devices.sort_by_key(|(id, _)| *id);

    let mut taken = HashSet::with_capacity(devices.len());
    devices
        .into_iter()
        .map(|(id, name)| {
            let mut label = match name {
                Some(n) if !n.trim().is_empty() => n.to_string(),
                _ => format!("Device {id}"),
            };
            while taken.contains(&label) {
                label = format!("{label} ({id})");
            }
            taken.insert(label.clone());
            (id, label)
        })
        .collect()
}

/// Resolve, filter and order the readings of a single device.
pub fn window_points(
    readings: &[Reading],
    since: OffsetDateTime,
    zones: TimeZones,
) -> Result<Vec<SeriesPoint>, ChartError> {
    let mut points = Vec::with_capacity(readings.len());
    for reading in readings {
        let at = match reading.collected_at {
            CollectedAt::Aware(ts) => ts,
            CollectedAt::Naive(ts) => zone::resolve_naive(ts, zones.assumed)?,
        };
        if at < since {
            continue;
        }
        points.push(SeriesPoint {
            at: zone::in_zone(at, zones.display)?,
            value: reading.last_collection,
        });
    }

    // Stable: equal timestamps keep store order.
    points.sort_by_key(|p| p.at);
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mote_client::{
        db::SqliteTelemetryStore,
        domain::{AuthStatus, DeviceCategory, NewDevice},
    };
    use time::macros::{datetime, offset};

    fn reading(device_id: i64, at: impl Into<CollectedAt>, value: f64) -> Reading {
        Reading {
            device_id,
            collected_at: at.into(),
            last_collection: value,
            total: value,
        }
    }

    async fn device(store: &SqliteTelemetryStore, name: Option<&str>) -> i64 {
        store
            .create_device(&NewDevice {
                name: name.map(str::to_string),
                category: DeviceCategory::Water,
                auth_status: AuthStatus::Authorized,
            })
            .await
            .unwrap()
    }

    #[test]
    fn labels_fall_back_to_device_id() {
        let labels = assign_labels([(7, None), (3, Some("  ")), (5, Some("Kitchen"))]);
        assert_eq!(
            labels,
            vec![
                (3, "Device 3".to_string()),
                (5, "Kitchen".to_string()),
                (7, "Device 7".to_string()),
            ]
        );
    }

    #[test]
    fn colliding_names_disambiguate_the_higher_id() {
        // Input order must not matter: the lower id keeps the plain name.
        let labels = assign_labels([(12, Some("Sensor")), (4, Some("Sensor"))]);
        assert_eq!(
            labels,
            vec![(4, "Sensor".to_string()), (12, "Sensor (12)".to_string())]
        );
    }

    #[test]
    fn disambiguated_label_that_collides_again_stays_unique() {
        let labels = assign_labels([(1, Some("Sensor (3)")), (2, Some("Sensor")), (3, Some("Sensor"))]);
        let unique: HashSet<_> = labels.iter().map(|(_, l)| l.clone()).collect();
        assert_eq!(unique.len(), 3);
        assert_eq!(labels[2], (3, "Sensor (3) (3)".to_string()));
    }

    #[test]
    fn window_bound_is_inclusive_and_output_sorted() {
        let since = datetime!(2024-05-01 12:00:00 UTC);
        let readings = vec![
            reading(1, datetime!(2024-05-01 14:00:00 UTC), 3.0),
            reading(1, datetime!(2024-05-01 11:59:59 UTC), 9.0),
            reading(1, datetime!(2024-05-01 12:00:00 UTC), 1.0),
            reading(1, datetime!(2024-05-01 13:00:00 UTC), 2.0),
        ];

        let points = window_points(&readings, since, TimeZones::default()).unwrap();
        let values: Vec<f64> = points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
        assert!(points.windows(2).all(|w| w[0].at < w[1].at));
    }

    #[test]
    fn naive_readings_use_the_assumed_zone_and_display_zone() {
        let zones = TimeZones {
            assumed: chrono_tz::America::Sao_Paulo,
            display: chrono_tz::Europe::Lisbon,
        };
        // 09:00 in Sao Paulo (-03:00) is 12:00 UTC, right on the bound.
        let readings = vec![
            reading(1, datetime!(2024-05-01 09:00:00), 5.0),
            reading(1, datetime!(2024-05-01 08:59:00), 6.0),
        ];

        let points = window_points(&readings, datetime!(2024-05-01 12:00:00 UTC), zones).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].at, datetime!(2024-05-01 13:00:00 +01:00));
        assert_eq!(points[0].at.offset(), offset!(+1));
    }

    #[test]
    fn offsets_change_across_a_daylight_saving_transition() {
        let berlin = chrono_tz::Europe::Berlin;
        let zones = TimeZones {
            assumed: berlin,
            display: berlin,
        };
        // Clocks in Berlin jumped from 02:00 to 03:00 on 2024-03-31.
        let readings = vec![
            reading(1, datetime!(2024-03-31 01:30:00), 1.0),
            reading(1, datetime!(2024-03-31 03:30:00), 2.0),
            reading(1, datetime!(2024-03-31 02:00:00 UTC), 3.0),
        ];

        let points = window_points(&readings, datetime!(2024-03-30 00:00:00 UTC), zones).unwrap();
        let got: Vec<(OffsetDateTime, time::UtcOffset)> = points.iter().map(|p| (p.at, p.at.offset())).collect();
        assert_eq!(
            got,
            vec![
                (datetime!(2024-03-31 00:30:00 UTC), offset!(+1)),
                (datetime!(2024-03-31 01:30:00 UTC), offset!(+2)),
                (datetime!(2024-03-31 02:00:00 UTC), offset!(+2)),
            ]
        );
    }

    #[tokio::test]
    async fn every_requested_device_gets_a_series() {
        let store = SqliteTelemetryStore::in_memory().await.unwrap();
        let a = device(&store, Some("Sensor")).await;
        let b = device(&store, Some("Sensor")).await;
        let c = device(&store, None).await;
        let since = datetime!(2024-05-01 00:00:00 UTC);

        store
            .insert_readings(&[
                reading(a, datetime!(2024-05-01 02:00:00 UTC), 2.0),
                reading(a, datetime!(2024-05-01 01:00:00 UTC), 1.0),
                reading(a, datetime!(2024-04-30 23:00:00 UTC), 0.5),
            ])
            .await
            .unwrap();

        let missing = c + 1000;
        let series = build_series(&store, &[b, a, c, missing, a], since, TimeZones::default())
            .await
            .unwrap();

        assert_eq!(series.len(), 4);
        let sensor: Vec<f64> = series["Sensor"].iter().map(|p| p.value).collect();
        assert_eq!(sensor, vec![1.0, 2.0]);
        assert!(series[&format!("Sensor ({b})")].is_empty());
        assert!(series[&format!("Device {c}")].is_empty());
        assert!(series[&format!("Device {missing}")].is_empty());
    }

    #[tokio::test]
    async fn no_devices_yields_no_series() {
        let store = SqliteTelemetryStore::in_memory().await.unwrap();
        let series = build_series(&store, &[], OffsetDateTime::now_utc(), TimeZones::default())
            .await
            .unwrap();
        assert!(series.is_empty());
    }
}
