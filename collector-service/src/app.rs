//! Wiring shared by the binaries.

use std::time::Duration;

use solar_client::{aggregation::QueryEngine, db, synthetic::DaylightWindow};

use crate::{
    config::AppConfig,
    pipeline::Collector,
    sinks::SqliteSink,
    sources::{FallbackSource, GatewayClient, RealSource, WeatherClient},
};

pub type GatewayCollector = Collector<RealSource, FallbackSource, SqliteSink>;

pub fn daylight(cfg: &AppConfig) -> anyhow::Result<DaylightWindow> {
    let c = &cfg.collector;
    DaylightWindow::new(c.daylight_start_hour, c.daylight_end_hour).ok_or_else(|| {
        anyhow::anyhow!(
            "invalid daylight window {}..{}",
            c.daylight_start_hour,
            c.daylight_end_hour
        )
    })
}

/// Builds the collector from config. Neither the store nor the gateway is
/// contacted here, so only bad configuration fails.
pub fn build_collector(cfg: &AppConfig) -> anyhow::Result<GatewayCollector> {
    let zone = cfg.local_zone()?;
    let pool = db::connect_lazy(&cfg.store.path, cfg.store.max_connections);

    let gateway = GatewayClient::new(&cfg.gateway.base_url, Duration::from_secs(cfg.gateway.timeout_secs))?;
    let sink = SqliteSink::new(
        pool,
        cfg.store.max_retries,
        Duration::from_millis(cfg.store.retry_backoff_ms),
    );

    let mut collector = Collector::new(
        RealSource::new(gateway),
        FallbackSource::new(daylight(cfg)?, zone),
        sink,
        cfg.collector.interval(),
    );

    if let Some(w) = cfg.weather_enabled() {
        let client = WeatherClient::new(
            w.base_url.clone(),
            w.api_key.clone(),
            w.latitude,
            w.longitude,
            Duration::from_secs(w.timeout_secs),
        )?;
        collector = collector.with_weather(client);
    } else {
        tracing::info!("weather collection disabled, no API key configured");
    }

    Ok(collector)
}

pub async fn build_query_engine(cfg: &AppConfig) -> anyhow::Result<QueryEngine> {
    let zone = cfg.local_zone()?;
    let pool = db::connect(&cfg.store.path, cfg.store.max_connections).await?;
    Ok(QueryEngine::new(pool, zone, cfg.collector.interval()).with_daylight(daylight(cfg)?))
}
