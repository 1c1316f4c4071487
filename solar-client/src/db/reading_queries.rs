use sqlx::SqlitePool;
use time::OffsetDateTime;

use super::{format_ts, parse_ts, StoreError};
use crate::domain::{DeviceReading, DeviceStatus, Reading, ReadingSource};

#[derive(Debug, Clone, sqlx::FromRow)]
struct ReadingRow {
    timestamp: String,
    production_kw: f64,
    consumption_kw: f64,
    net_export_kw: f64,
    source: String,
}

impl TryFrom<ReadingRow> for Reading {
    type Error = StoreError;

    fn try_from(row: ReadingRow) -> Result<Self, Self::Error> {
        let source: ReadingSource = row.source.parse().map_err(StoreError::CorruptRow)?;
        Ok(Reading {
            ts: parse_ts(&row.timestamp)?,
            production_kw: row.production_kw,
            consumption_kw: row.consumption_kw,
            net_export_kw: row.net_export_kw,
            source,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct DeviceReadingRow {
    timestamp: String,
    device_id: String,
    device_class: String,
    power_kw: f64,
    voltage: f64,
    current_a: f64,
    frequency_hz: f64,
    temperature_c: f64,
    status: String,
}

impl TryFrom<DeviceReadingRow> for DeviceReading {
    type Error = StoreError;

    fn try_from(row: DeviceReadingRow) -> Result<Self, Self::Error> {
        Ok(DeviceReading {
            ts: parse_ts(&row.timestamp)?,
            device_id: row.device_id,
            device_class: row.device_class.parse().map_err(StoreError::CorruptRow)?,
            power_kw: row.power_kw,
            voltage: row.voltage,
            current_a: row.current_a,
            frequency_hz: row.frequency_hz,
            temperature_c: row.temperature_c,
            status: DeviceStatus::from_gateway_state(&row.status),
        })
    }
}

/// Readings with `start <= ts <= end`, oldest first. Rows sharing a
/// timestamp keep insertion order.
pub async fn readings_between(
    pool: &SqlitePool,
    start: OffsetDateTime,
    end: OffsetDateTime,
) -> Result<Vec<Reading>, StoreError> {
    let rows = sqlx::query_as::<_, ReadingRow>(
        r#"
        SELECT
            timestamp,
            production_kw,
            consumption_kw,
            net_export_kw,
            source
        FROM readings
        WHERE timestamp >= ?1
          AND timestamp <= ?2
        ORDER BY timestamp, id
        "#,
    )
    .bind(format_ts(start))
    .bind(format_ts(end))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Reading::try_from).collect()
}

/// Most recent reading, for "current status" views.
pub async fn latest_reading(pool: &SqlitePool) -> Result<Option<Reading>, StoreError> {
    let row = sqlx::query_as::<_, ReadingRow>(
        r#"
        SELECT timestamp, production_kw, consumption_kw, net_export_kw, source
        FROM readings
        ORDER BY timestamp DESC, id DESC
        LIMIT 1
        "#,
    )
    .fetch_optional(pool)
    .await?;

    row.map(Reading::try_from).transpose()
}

/// Time-ordered telemetry for a single device.
pub async fn device_history(
    pool: &SqlitePool,
    device_id: &str,
    start: OffsetDateTime,
    end: OffsetDateTime,
) -> Result<Vec<DeviceReading>, StoreError> {
    let rows = sqlx::query_as::<_, DeviceReadingRow>(
        r#"
        SELECT
            timestamp,
            device_id,
            device_class,
            power_kw,
            voltage,
            current_a,
            frequency_hz,
            temperature_c,
            status
        FROM device_readings
        WHERE device_id = ?1
          AND timestamp >= ?2
          AND timestamp <= ?3
        ORDER BY timestamp, id
        "#,
    )
    .bind(device_id)
    .bind(format_ts(start))
    .bind(format_ts(end))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(DeviceReading::try_from).collect()
}
