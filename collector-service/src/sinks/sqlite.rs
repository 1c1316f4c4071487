use std::{fmt::Display, future::Future, time::Duration};

use solar_client::{
    db::{format_ts, schema, StoreError},
    domain::{DeviceReading, Reading, WeatherObservation},
};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tokio::sync::OnceCell;

use crate::pipeline::{PipelineError, ReadingSink};

/// Writes collector output to the SQLite reading store.
///
/// The pool may be lazy: the schema is applied before the first write and
/// re-attempted on every write until it succeeds, so a store that is
/// missing at startup starts working once it can be opened.
pub struct SqliteSink {
    pool: SqlitePool,
    schema: OnceCell<()>,
    max_retries: u32,
    retry_backoff: Duration,
}

impl SqliteSink {
    pub fn new(pool: SqlitePool, max_retries: u32, retry_backoff: Duration) -> Self {
        Self {
            pool,
            schema: OnceCell::new(),
            max_retries,
            retry_backoff,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn ready(&self) -> Result<(), StoreError> {
        self.schema
            .get_or_try_init(|| async {
                schema::ensure_schema(&self.pool).await?;
                tracing::info!("reading store ready");
                Ok::<(), StoreError>(())
            })
            .await
            .map(|_| ())
    }

    /// Runs `op` until it succeeds or `max_retries` extra attempts are used,
    /// sleeping `retry_backoff * attempt` in between.
    async fn with_retry<F, Fut, E>(&self, table: &'static str, op: F) -> Result<(), PipelineError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        let mut attempt: u32 = 0;
        loop {
            match op().await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(error = %e, attempt, table, "store write failed, retrying with backoff");
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, table, "store write failed, giving up");
                    return Err(PipelineError::StoreUnavailable(e.to_string()));
                }
            }
        }
    }

    async fn insert_reading(&self, r: &Reading) -> Result<(), StoreError> {
        self.ready().await?;
        sqlx::query(
            r#"
            INSERT INTO readings (timestamp, production_kw, consumption_kw, net_export_kw, source)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(format_ts(r.ts))
        .bind(r.production_kw)
        .bind(r.consumption_kw)
        .bind(r.net_export_kw)
        .bind(r.source.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// All rows of one tick land together or not at all.
    async fn insert_devices(&self, devices: &[DeviceReading]) -> Result<(), StoreError> {
        self.ready().await?;
        let mut builder = QueryBuilder::<Sqlite>::new(
            "INSERT INTO device_readings (timestamp, device_id, device_class, power_kw, voltage, current_a, frequency_hz, temperature_c, status) ",
        );

        builder.push_values(devices, |mut b, d| {
            b.push_bind(format_ts(d.ts))
                .push_bind(&d.device_id)
                .push_bind(d.device_class.as_str())
                .push_bind(d.power_kw)
                .push_bind(d.voltage)
                .push_bind(d.current_a)
                .push_bind(d.frequency_hz)
                .push_bind(d.temperature_c)
                .push_bind(d.status.as_str());
        });

        let mut tx = self.pool.begin().await?;
        builder.build().execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn insert_weather(&self, w: &WeatherObservation) -> Result<(), StoreError> {
        self.ready().await?;
        sqlx::query(
            r#"
            INSERT INTO weather_observations (
                timestamp, temperature_c, feels_like_c, humidity_pct, pressure_hpa,
                visibility_km, clouds_pct, wind_speed_ms, wind_direction_deg,
                condition, description, icon, sunrise, sunset, city, country
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
        )
        .bind(format_ts(w.ts))
        .bind(w.temperature_c)
        .bind(w.feels_like_c)
        .bind(w.humidity_pct)
        .bind(w.pressure_hpa)
        .bind(w.visibility_km)
        .bind(w.clouds_pct)
        .bind(w.wind_speed_ms)
        .bind(w.wind_direction_deg)
        .bind(&w.condition)
        .bind(&w.description)
        .bind(&w.icon)
        .bind(w.sunrise)
        .bind(w.sunset)
        .bind(&w.city)
        .bind(&w.country)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ReadingSink for SqliteSink {
    async fn write_reading(&self, reading: &Reading) -> Result<(), PipelineError> {
        self.with_retry("readings", || self.insert_reading(reading)).await
    }

    async fn write_devices(&self, devices: &[DeviceReading]) -> Result<(), PipelineError> {
        if devices.is_empty() {
            return Ok(());
        }
        self.with_retry("device_readings", || self.insert_devices(devices)).await
    }

    async fn write_weather(&self, observation: &WeatherObservation) -> Result<(), PipelineError> {
        self.with_retry("weather_observations", || self.insert_weather(observation))
            .await
    }
}
