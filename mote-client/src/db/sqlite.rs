use std::str::FromStr;

use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    QueryBuilder, Sqlite,
};
use time::OffsetDateTime;

use super::{schema, ChartPointerRow, DeviceRow, StoreError, TelemetryStore};
use crate::domain::{AuthStatus, ChartPointer, CollectedAt, Device, DeviceCategory, NewDevice, Reading};

// SQLite caps bind parameters at 32766; four per reading.
const INSERT_BATCH_ROWS: usize = 1000;

#[derive(Debug, Clone, sqlx::FromRow)]
struct ReadingRow {
    device_id: i64,
    collect_date: String,
    last_collection: f64,
    total: f64,
}

impl TryFrom<ReadingRow> for Reading {
    type Error = StoreError;

    fn try_from(row: ReadingRow) -> Result<Self, Self::Error> {
        let collected_at = CollectedAt::parse_storage(&row.collect_date)
            .ok_or_else(|| StoreError::InvalidTimestamp(row.collect_date.clone()))?;
        Ok(Reading {
            device_id: row.device_id,
            collected_at,
            last_collection: row.last_collection,
            total: row.total,
        })
    }
}

/// SQLite-backed store for local development and tests.
///
/// Timestamps are stored as text and may be naive. `readings_since` filters
/// in SQL but lets naive rows up to a day older than the bound through, so
/// the caller applies the exact bound once the assumed zone is known.
#[derive(Clone)]
pub struct SqliteTelemetryStore {
    pool: SqlitePool,
}

impl SqliteTelemetryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);
        // Every connection to an in-memory database is a separate database,
        // and the data dies with the connection.
        if url.contains(":memory:") || url.contains("mode=memory") {
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = pool_options.connect_with(options).await?;
        Ok(Self::new(pool))
    }

    /// Fresh in-memory store with the schema applied.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let store = Self::connect("sqlite::memory:", 1).await?;
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl TelemetryStore for SqliteTelemetryStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in schema::SQLITE {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn authorized_device_ids(&self, category: DeviceCategory) -> Result<Vec<i64>, StoreError> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id
            FROM devices
            WHERE category = ?
              AND auth_status = ?
            ORDER BY id
            "#,
        )
        .bind(category.code())
        .bind(AuthStatus::Authorized.code())
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn devices_by_ids(&self, ids: &[i64]) -> Result<Vec<Device>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder =
            QueryBuilder::<Sqlite>::new("SELECT id, name, category, auth_status FROM devices WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY id");

        let rows = builder
            .build_query_as::<DeviceRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Device::try_from).collect()
    }

    async fn readings_since(
        &self,
        device_id: i64,
        since: OffsetDateTime,
    ) -> Result<Vec<Reading>, StoreError> {
        let since = CollectedAt::Aware(since).to_storage_string()?;
        // Naive rows get a day of slack since their offset is unknown here;
        // aware rows a second to absorb julianday rounding.
        let rows = sqlx::query_as::<_, ReadingRow>(
            r#"
            SELECT
                device_id,
                collect_date,
                last_collection,
                total
            FROM readings
            WHERE device_id = ?
              AND julianday(collect_date) >= julianday(?) - CASE
                  WHEN collect_date LIKE '%Z' OR substr(collect_date, -6, 1) IN ('+', '-')
                      THEN 1.0 / 86400.0
                  ELSE 1.0
              END
            ORDER BY collect_date, id
            "#,
        )
        .bind(device_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Reading::try_from).collect()
    }

    async fn chart_pointers(&self) -> Result<Vec<ChartPointer>, StoreError> {
        let rows = sqlx::query_as::<_, ChartPointerRow>(
            "SELECT category, file_path FROM chart_pointers ORDER BY category",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ChartPointer::try_from).collect()
    }

    async fn insert_chart_pointer_if_absent(&self, pointer: &ChartPointer) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO chart_pointers (category, file_path)
            VALUES (?, ?)
            ON CONFLICT (category) DO NOTHING
            "#,
        )
        .bind(pointer.category.code())
        .bind(&pointer.file_path)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn create_device(&self, device: &NewDevice) -> Result<i64, StoreError> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO devices (name, category, auth_status)
            VALUES (?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&device.name)
        .bind(device.category.code())
        .bind(device.auth_status.code())
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn device_id_by_name(&self, name: &str, category: DeviceCategory) -> Result<Option<i64>, StoreError> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id
            FROM devices
            WHERE name = ?
              AND category = ?
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(name)
        .bind(category.code())
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    async fn delete_readings(&self, device_ids: &[i64]) -> Result<u64, StoreError> {
        if device_ids.is_empty() {
            return Ok(0);
        }
        let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM readings WHERE device_id IN (");
        let mut separated = builder.separated(", ");
        for id in device_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        Ok(builder.build().execute(&self.pool).await?.rows_affected())
    }

    async fn insert_readings(&self, readings: &[Reading]) -> Result<u64, StoreError> {
        let mut inserted = 0;
        for batch in readings.chunks(INSERT_BATCH_ROWS) {
            let encoded = batch
                .iter()
                .map(|r| r.collected_at.to_storage_string())
                .collect::<Result<Vec<_>, _>>()?;

            let mut builder = QueryBuilder::<Sqlite>::new(
                "INSERT INTO readings (device_id, collect_date, last_collection, total) ",
            );
            builder.push_values(batch.iter().zip(encoded), |mut b, (r, collect_date)| {
                b.push_bind(r.device_id)
                    .push_bind(collect_date)
                    .push_bind(r.last_collection)
                    .push_bind(r.total);
            });

            inserted += builder.build().execute(&self.pool).await?.rows_affected();
        }
        Ok(inserted)
    }
}
