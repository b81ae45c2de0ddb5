//! Metric names and recording helpers. Only the `metrics` facade is used;
//! installing a recorder is left to the embedding process.

use std::time::Duration;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};
use mote_client::domain::{AuthStatus, DeviceCategory};

pub const DATA_POINTS_RECEIVED: &str = "mote_data_points_received_total";
pub const DATA_STORE_DURATION: &str = "mote_data_store_duration_seconds";
pub const DATA_STORE_ERRORS: &str = "mote_data_store_errors_total";
pub const ACTIVE_DEVICES: &str = "mote_active_devices";
pub const TOTAL_DATA_VOLUME: &str = "mote_total_data_volume_liters";
pub const TOTAL_ENERGY_CONSUMED: &str = "mote_total_energy_consumed_kwh";
pub const CHARTS_RENDERED: &str = "mote_charts_rendered_total";
pub const CHART_RENDER_ERRORS: &str = "mote_chart_render_errors_total";
pub const CHART_RENDER_DURATION: &str = "mote_chart_render_duration_seconds";
pub const CHART_POINTERS_CREATED: &str = "mote_chart_pointers_created_total";

/// Register descriptions with whatever recorder is installed.
pub fn describe() {
    describe_counter!(DATA_POINTS_RECEIVED, Unit::Count, "Total data points received from devices");
    describe_histogram!(DATA_STORE_DURATION, Unit::Seconds, "Time taken to store readings");
    describe_counter!(DATA_STORE_ERRORS, Unit::Count, "Total errors storing readings");
    describe_gauge!(ACTIVE_DEVICES, Unit::Count, "Devices per category and authorization status");
    describe_gauge!(TOTAL_DATA_VOLUME, "Total water or gas volume collected");
    describe_gauge!(TOTAL_ENERGY_CONSUMED, "Total energy consumed (kWh)");
    describe_counter!(CHARTS_RENDERED, Unit::Count, "Charts written to disk");
    describe_counter!(CHART_RENDER_ERRORS, Unit::Count, "Categories whose chart could not be produced");
    describe_histogram!(CHART_RENDER_DURATION, Unit::Seconds, "Time to build and write one chart");
    describe_counter!(CHART_POINTERS_CREATED, Unit::Count, "Chart pointer rows inserted");
}

pub fn track_data_received(category: DeviceCategory, measure_type: &'static str, count: u64) {
    metrics::counter!(DATA_POINTS_RECEIVED, "device_type" => category.as_str(), "measure_type" => measure_type)
        .increment(count);
}

pub fn track_store_duration(category: DeviceCategory, elapsed: Duration) {
    metrics::histogram!(DATA_STORE_DURATION, "device_type" => category.as_str()).record(elapsed.as_secs_f64());
}

pub fn track_store_error(category: DeviceCategory, error_type: &'static str) {
    metrics::counter!(DATA_STORE_ERRORS, "device_type" => category.as_str(), "error_type" => error_type)
        .increment(1);
}

pub fn update_device_stats(category: DeviceCategory, auth_status: AuthStatus, count: usize) {
    metrics::gauge!(
        ACTIVE_DEVICES,
        "device_type" => category.as_str(),
        "authorization_status" => auth_status.as_str()
    )
    .set(count as f64);
}

pub fn update_volume_stats(category: DeviceCategory, volume: f64) {
    metrics::gauge!(TOTAL_DATA_VOLUME, "device_type" => category.as_str()).set(volume);
}

pub fn update_energy_stats(category: DeviceCategory, energy_kwh: f64) {
    metrics::gauge!(TOTAL_ENERGY_CONSUMED, "device_type" => category.as_str()).set(energy_kwh);
}

pub fn record_chart_rendered(category: DeviceCategory, elapsed: Duration) {
    metrics::counter!(CHARTS_RENDERED, "category" => category.as_str()).increment(1);
    metrics::histogram!(CHART_RENDER_DURATION, "category" => category.as_str()).record(elapsed.as_secs_f64());
}

pub fn record_chart_failure(category: DeviceCategory, error_kind: &'static str) {
    metrics::counter!(CHART_RENDER_ERRORS, "category" => category.as_str(), "error_type" => error_kind)
        .increment(1);
}

pub fn record_pointer_created(category: DeviceCategory) {
    metrics::counter!(CHART_POINTERS_CREATED, "category" => category.as_str()).increment(1);
}
