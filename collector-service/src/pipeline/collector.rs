use std::{
    sync::Mutex,
    time::{Duration, Instant},
};

use solar_client::domain::Reading;
use time::OffsetDateTime;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::{PipelineError, ReadingSink, ReadingSource, Sample, WeatherSource};

/// The collection loop: one primary reading per tick from `primary`, or from
/// `fallback` when the primary fails, then best-effort device rows and
/// weather.
pub struct Collector<P, F, K> {
    primary: P,
    fallback: F,
    sink: K,
    weather: Option<Box<dyn WeatherSource>>,
    interval: Duration,
    last_ts: Mutex<Option<OffsetDateTime>>,
}

impl<P, F, K> Collector<P, F, K>
where
    P: ReadingSource,
    F: ReadingSource,
    K: ReadingSink,
{
    pub fn new(primary: P, fallback: F, sink: K, interval: Duration) -> Self {
        Self {
            primary,
            fallback,
            sink,
            weather: None,
            interval,
            last_ts: Mutex::new(None),
        }
    }

    pub fn with_weather(mut self, weather: impl WeatherSource + 'static) -> Self {
        self.weather = Some(Box::new(weather));
        self
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Runs a single tick now.
    pub async fn collect_once(&self) -> Result<Reading, PipelineError> {
        self.collect_at(OffsetDateTime::now_utc()).await
    }

    /// Runs a single tick as if the clock read `now`.
    ///
    /// Only a store failure on the primary write is returned as an error;
    /// gateway, device-row and weather failures are absorbed here.
    pub async fn collect_at(&self, now: OffsetDateTime) -> Result<Reading, PipelineError> {
        let started = Instant::now();
        let at = self.next_timestamp(now);

        let Sample { reading, devices } = match self.primary.sample(at).await {
            Ok(sample) => sample,
            Err(e) if e.triggers_fallback() => {
                metrics::counter!("gateway_errors_total").increment(1);
                tracing::warn!(
                    error = %e,
                    primary = self.primary.name(),
                    fallback = self.fallback.name(),
                    "primary source failed, synthesizing reading"
                );
                let synthetic = self.fallback.sample(at).await?;
                Sample {
                    reading: synthetic.reading,
                    devices: e.into_devices(),
                }
            }
            Err(e) => return Err(e),
        };

        if let Err(e) = self.sink.write_reading(&reading).await {
            metrics::counter!("store_write_errors_total").increment(1);
            return Err(e);
        }
        metrics::counter!("collector_ticks_total", "source" => reading.source.as_str()).increment(1);
        tracing::info!(
            source = %reading.source,
            production_kw = reading.production_kw,
            consumption_kw = reading.consumption_kw,
            net_export_kw = reading.net_export_kw,
            "reading stored"
        );

        if !devices.is_empty() {
            match self.sink.write_devices(&devices).await {
                Ok(()) => {
                    metrics::counter!("device_rows_written_total").increment(devices.len() as u64);
                }
                Err(e) => {
                    tracing::warn!(error = %e, devices = devices.len(), "device telemetry not persisted");
                }
            }
        }

        if let Some(weather) = &self.weather {
            self.collect_weather(weather.as_ref(), at).await;
        }

        metrics::histogram!("collector_tick_duration_seconds").record(started.elapsed().as_secs_f64());
        Ok(reading)
    }

    async fn collect_weather(&self, weather: &dyn WeatherSource, at: OffsetDateTime) {
        let observation = match weather.current(at).await {
            Ok(obs) => obs,
            Err(e) => {
                metrics::counter!("weather_fetch_errors_total").increment(1);
                tracing::warn!(error = %e, "weather fetch failed");
                return;
            }
        };

        if let Err(e) = self.sink.write_weather(&observation).await {
            tracing::warn!(error = %e, "weather observation not persisted");
        } else {
            tracing::debug!(
                city = %observation.city,
                temperature_c = observation.temperature_c,
                "weather stored"
            );
        }
    }

    /// Second-precision timestamp that never goes backwards, even if the
    /// wall clock does.
    fn next_timestamp(&self, now: OffsetDateTime) -> OffsetDateTime {
        let now = now.replace_nanosecond(0).unwrap_or(now);
        let mut last = self.last_ts.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let ts = match *last {
            Some(prev) if prev > now => prev,
            _ => now,
        };
        *last = Some(ts);
        ts
    }

    /// Ticks every `interval` until `shutdown` fires. The first tick runs
    /// immediately. A tick in progress always completes, so shutdown never
    /// cuts a write in half.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval_secs = self.interval.as_secs(),
            primary = self.primary.name(),
            weather = self.weather.is_some(),
            "collector started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.collect_once().await {
                tracing::error!(error = %e, "tick failed, retrying on next interval");
            }
        }

        tracing::info!("collector stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        sinks::SqliteSink,
        sources::{FallbackSource, GatewayClient, RealSource},
    };
    use mockito::Matcher;
    use serde_json::json;
    use solar_client::{
        db::{connect_in_memory, reading_queries},
        domain::{DeviceClass, DeviceReading, DeviceStatus, ReadingSource as Tag, WeatherObservation},
        synthetic::DaylightWindow,
        zone::LocalZone,
    };
    use time::macros::datetime;

    struct Unreachable;

    #[async_trait::async_trait]
    impl ReadingSource for Unreachable {
        fn name(&self) -> &'static str {
            "unreachable"
        }

        async fn sample(&self, _at: OffsetDateTime) -> Result<Sample, PipelineError> {
            Err(PipelineError::GatewayUnreachable("connection refused".to_string()))
        }
    }

    struct Live;

    #[async_trait::async_trait]
    impl ReadingSource for Live {
        fn name(&self) -> &'static str {
            "live"
        }

        async fn sample(&self, at: OffsetDateTime) -> Result<Sample, PipelineError> {
            let device = DeviceReading {
                ts: at,
                device_id: "E00121".to_string(),
                device_class: DeviceClass::Inverter,
                power_kw: 0.3,
                voltage: 240.0,
                current_a: 1.2,
                frequency_hz: 60.0,
                temperature_c: 41.0,
                status: DeviceStatus::Working,
            };
            Ok(Sample {
                reading: Reading::new(at, 5.0, 2.0, Tag::GatewayReal),
                devices: vec![device],
            })
        }
    }

    #[derive(Default)]
    struct MemorySink {
        readings: Mutex<Vec<Reading>>,
        devices: Mutex<Vec<DeviceReading>>,
        weather: Mutex<Vec<WeatherObservation>>,
        fail_readings: bool,
        fail_devices: bool,
    }

    #[async_trait::async_trait]
    impl ReadingSink for MemorySink {
        async fn write_reading(&self, reading: &Reading) -> Result<(), PipelineError> {
            if self.fail_readings {
                return Err(PipelineError::StoreUnavailable("disk I/O error".to_string()));
            }
            self.readings.lock().unwrap().push(reading.clone());
            Ok(())
        }

        async fn write_devices(&self, devices: &[DeviceReading]) -> Result<(), PipelineError> {
            if self.fail_devices {
                return Err(PipelineError::StoreUnavailable("database is locked".to_string()));
            }
            self.devices.lock().unwrap().extend_from_slice(devices);
            Ok(())
        }

        async fn write_weather(&self, observation: &WeatherObservation) -> Result<(), PipelineError> {
            self.weather.lock().unwrap().push(observation.clone());
            Ok(())
        }
    }

    struct BrokenWeather;

    #[async_trait::async_trait]
    impl WeatherSource for BrokenWeather {
        async fn current(&self, _at: OffsetDateTime) -> Result<WeatherObservation, PipelineError> {
            Err(PipelineError::AuxiliaryFetchFailed("401 invalid api key".to_string()))
        }
    }

    struct SunnyWeather;

    #[async_trait::async_trait]
    impl WeatherSource for SunnyWeather {
        async fn current(&self, at: OffsetDateTime) -> Result<WeatherObservation, PipelineError> {
            Ok(WeatherObservation {
                ts: at,
                temperature_c: 24.0,
                feels_like_c: 23.5,
                humidity_pct: 20,
                pressure_hpa: 1015,
                visibility_km: 10.0,
                clouds_pct: 0,
                wind_speed_ms: 3.1,
                wind_direction_deg: 180,
                condition: "Clear".to_string(),
                description: "clear sky".to_string(),
                icon: "01d".to_string(),
                sunrise: 1_748_778_000,
                sunset: 1_748_831_000,
                city: "Denver".to_string(),
                country: "US".to_string(),
            })
        }
    }

    fn fallback() -> FallbackSource {
        FallbackSource::new(DaylightWindow::DEFAULT, LocalZone::UTC)
    }

    fn collector<P: ReadingSource>(primary: P, sink: MemorySink) -> Collector<P, FallbackSource, MemorySink> {
        Collector::new(primary, fallback(), sink, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn unreachable_gateway_at_midday_falls_back_with_production() {
        let c = collector(Unreachable, MemorySink::default());

        let reading = c.collect_at(datetime!(2025-06-01 13:00 UTC)).await.unwrap();

        assert_eq!(reading.source, Tag::FallbackSynthetic);
        assert!(reading.production_kw > 0.0);
        assert_eq!(c.sink().readings.lock().unwrap().len(), 1);
        assert!(c.sink().devices.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreachable_gateway_at_night_produces_nothing() {
        let c = collector(Unreachable, MemorySink::default());
        let reading = c.collect_at(datetime!(2025-06-01 23:00 UTC)).await.unwrap();
        assert_eq!(reading.production_kw, 0.0);
        assert!(reading.consumption_kw > 0.0);
    }

    #[tokio::test]
    async fn every_tick_appends_exactly_one_tagged_reading() {
        let live = collector(Live, MemorySink::default());
        let dead = collector(Unreachable, MemorySink::default());

        for minute in 0..5 {
            let now = datetime!(2025-06-01 12:00 UTC) + time::Duration::minutes(minute);
            live.collect_at(now).await.unwrap();
            dead.collect_at(now).await.unwrap();
        }

        let live_rows = live.sink().readings.lock().unwrap();
        let dead_rows = dead.sink().readings.lock().unwrap();
        assert_eq!(live_rows.len(), 5);
        assert_eq!(dead_rows.len(), 5);
        assert!(live_rows.iter().all(|r| r.source == Tag::GatewayReal));
        assert!(dead_rows.iter().all(|r| r.source == Tag::FallbackSynthetic));
        assert_eq!(live.sink().devices.lock().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn device_write_failure_keeps_primary_reading() {
        let sink = MemorySink {
            fail_devices: true,
            ..Default::default()
        };
        let c = collector(Live, sink);

        let reading = c.collect_at(datetime!(2025-06-01 12:00 UTC)).await.unwrap();

        assert_eq!(reading.source, Tag::GatewayReal);
        assert_eq!(c.sink().readings.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn weather_failure_does_not_affect_the_tick() {
        let c = collector(Live, MemorySink::default()).with_weather(BrokenWeather);

        let reading = c.collect_at(datetime!(2025-06-01 12:00 UTC)).await.unwrap();

        assert_eq!(reading.source, Tag::GatewayReal);
        assert_eq!(c.sink().readings.lock().unwrap().len(), 1);
        assert!(c.sink().weather.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn weather_is_stored_when_available() {
        let c = collector(Unreachable, MemorySink::default()).with_weather(SunnyWeather);
        c.collect_at(datetime!(2025-06-01 12:00 UTC)).await.unwrap();
        assert_eq!(c.sink().weather.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn store_failure_is_reported_not_panicked() {
        let sink = MemorySink {
            fail_readings: true,
            ..Default::default()
        };
        let c = collector(Live, sink);

        let err = c.collect_at(datetime!(2025-06-01 12:00 UTC)).await.unwrap_err();

        assert!(matches!(err, PipelineError::StoreUnavailable(_)));
        assert!(c.sink().devices.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn timestamps_never_go_backwards() {
        let c = collector(Live, MemorySink::default());

        let first = c.collect_at(datetime!(2025-06-01 12:00:30.700 UTC)).await.unwrap();
        let second = c.collect_at(datetime!(2025-06-01 11:59:00 UTC)).await.unwrap();

        assert_eq!(first.ts, datetime!(2025-06-01 12:00:30 UTC));
        assert_eq!(second.ts, first.ts);
    }

    #[tokio::test]
    async fn run_ticks_until_cancelled() {
        let c = Collector::new(Live, fallback(), MemorySink::default(), Duration::from_millis(10));
        let token = CancellationToken::new();

        tokio::join!(c.run(token.clone()), async {
            tokio::time::sleep(Duration::from_millis(45)).await;
            token.cancel();
        });

        assert!(!c.sink().readings.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_survives_a_failing_store() {
        let sink = MemorySink {
            fail_readings: true,
            ..Default::default()
        };
        let c = Collector::new(Unreachable, fallback(), sink, Duration::from_millis(5));
        let token = CancellationToken::new();

        tokio::join!(c.run(token.clone()), async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            token.cancel();
        });

        assert!(c.sink().readings.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn offline_system_still_stores_its_device_rows() {
        let body = json!({
            "result": "succeed",
            "devices": [
                { "DEVICE_TYPE": "Inverter", "SERIAL": "E001", "STATE": "error", "p_3phsum_kw": 0.0 },
                { "DEVICE_TYPE": "Inverter", "SERIAL": "E002", "STATE": "offline" }
            ]
        })
        .to_string();
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/cgi-bin/dl_cgi")
            .match_query(Matcher::UrlEncoded("Command".into(), "DeviceList".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;

        let gateway = GatewayClient::new(server.url(), Duration::from_secs(2)).unwrap();
        let sink = SqliteSink::new(connect_in_memory().await.unwrap(), 0, Duration::from_millis(1));
        let c = Collector::new(RealSource::new(gateway), fallback(), sink, Duration::from_secs(60));

        let reading = c.collect_at(datetime!(2025-06-01 12:00 UTC)).await.unwrap();

        assert_eq!(reading.source, Tag::FallbackSynthetic);
        let pool = c.sink().pool();
        let latest = reading_queries::latest_reading(pool).await.unwrap().unwrap();
        assert_eq!(latest.source, Tag::FallbackSynthetic);
        let (rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM device_readings")
            .fetch_one(pool)
            .await
            .unwrap();
        assert_eq!(rows, 2);
        let history = reading_queries::device_history(
            pool,
            "E001",
            datetime!(2025-06-01 0:00 UTC),
            datetime!(2025-06-02 0:00 UTC),
        )
        .await
        .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, DeviceStatus::Error);
        assert_eq!(history[0].ts, reading.ts);
    }
}
