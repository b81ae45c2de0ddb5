pub mod postgres;
pub mod schema;
pub mod sqlite;

use time::OffsetDateTime;

use crate::domain::{AuthStatus, ChartPointer, Device, DeviceCategory, NewDevice, Reading};

pub use postgres::PgTelemetryStore;
pub use sqlite::SqliteTelemetryStore;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid stored timestamp '{0}'")]
    InvalidTimestamp(String),
    #[error("failed to encode timestamp: {0}")]
    TimestampFormat(#[from] time::error::Format),
    #[error("unknown {kind} code {code}")]
    UnknownCode { kind: &'static str, code: i16 },
    #[error("unsupported database url scheme '{0}'")]
    UnsupportedUrl(String),
    #[error("reading for device {device_id} has no offset; resolve it before inserting")]
    NaiveTimestamp { device_id: i64 },
}

/// Device directory, reading history and chart pointer table.
///
/// The read side is what chart generation needs; the write side exists for
/// seeding development databases and tests.
#[async_trait::async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Create the tables this crate reads and writes, if missing.
    async fn ensure_schema(&self) -> Result<(), StoreError>;

    /// Ids of authorized devices in `category`, ascending.
    async fn authorized_device_ids(&self, category: DeviceCategory) -> Result<Vec<i64>, StoreError>;

    /// Devices whose id is in `ids`, ascending by id. Unknown ids are skipped.
    async fn devices_by_ids(&self, ids: &[i64]) -> Result<Vec<Device>, StoreError>;

    /// Readings of one device collected at or after `since`, ordered by
    /// collection time.
    ///
    /// Backends that keep naive timestamps cannot compare them exactly
    /// against an instant and may return naive rows up to a day older;
    /// callers apply the bound again once the assumed zone is known.
    async fn readings_since(
        &self,
        device_id: i64,
        since: OffsetDateTime,
    ) -> Result<Vec<Reading>, StoreError>;

    /// All chart pointers, ordered by category code.
    async fn chart_pointers(&self) -> Result<Vec<ChartPointer>, StoreError>;

    /// Insert `pointer` unless its category already has one. Returns whether
    /// a row was written. Concurrent callers are serialized by the unique
    /// key on category; the loser is a no-op.
    async fn insert_chart_pointer_if_absent(&self, pointer: &ChartPointer) -> Result<bool, StoreError>;

    async fn create_device(&self, device: &NewDevice) -> Result<i64, StoreError>;

    /// Lowest id of a device with exactly this name in `category`.
    async fn device_id_by_name(&self, name: &str, category: DeviceCategory) -> Result<Option<i64>, StoreError>;

    /// Backends with a native zone-aware column reject naive timestamps with
    /// [`StoreError::NaiveTimestamp`].
    async fn insert_readings(&self, readings: &[Reading]) -> Result<u64, StoreError>;

    /// Remove every reading of the given devices. Returns the number removed.
    async fn delete_readings(&self, device_ids: &[i64]) -> Result<u64, StoreError>;
}

/// Open a store for `url`, picking the backend from its scheme.
pub async fn connect(url: &str, max_connections: u32) -> Result<Box<dyn TelemetryStore>, StoreError> {
    let scheme = url.split(':').next().unwrap_or_default();
    match scheme {
        "postgres" | "postgresql" => Ok(Box::new(PgTelemetryStore::connect(url, max_connections).await?)),
        "sqlite" => Ok(Box::new(SqliteTelemetryStore::connect(url, max_connections).await?)),
        other => Err(StoreError::UnsupportedUrl(other.to_string())),
    }
}

/// Row shape shared by both backends.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct DeviceRow {
    pub id: i64,
    pub name: Option<String>,
    pub category: i16,
    pub auth_status: i16,
}

impl TryFrom<DeviceRow> for Device {
    type Error = StoreError;

    fn try_from(row: DeviceRow) -> Result<Self, Self::Error> {
        let category = DeviceCategory::from_code(row.category).ok_or(StoreError::UnknownCode {
            kind: "device category",
            code: row.category,
        })?;
        let auth_status = AuthStatus::from_code(row.auth_status).ok_or(StoreError::UnknownCode {
            kind: "auth status",
            code: row.auth_status,
        })?;
        Ok(Device {
            id: row.id,
            name: row.name,
            category,
            auth_status,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct ChartPointerRow {
    pub category: i16,
    pub file_path: String,
}

impl TryFrom<ChartPointerRow> for ChartPointer {
    type Error = StoreError;

    fn try_from(row: ChartPointerRow) -> Result<Self, Self::Error> {
        let category = DeviceCategory::from_code(row.category).ok_or(StoreError::UnknownCode {
            kind: "chart category",
            code: row.category,
        })?;
        Ok(ChartPointer {
            category,
            file_path: row.file_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_rejects_unknown_schemes() {
        let err = connect("mysql://localhost/motes", 1).await.err().unwrap();
        assert!(matches!(err, StoreError::UnsupportedUrl(s) if s == "mysql"));
    }

    #[test]
    fn device_rows_with_unknown_codes_are_rejected() {
        let row = DeviceRow {
            id: 1,
            name: None,
            category: 9,
            auth_status: 1,
        };
        assert!(matches!(
            Device::try_from(row),
            Err(StoreError::UnknownCode { code: 9, .. })
        ));
    }
}
