use std::time::Duration as StdDuration;

use rand::thread_rng;
use sqlx::SqlitePool;
use time::{Duration, OffsetDateTime};

use super::{
    bucket::{bucketize, AggregateBucket},
    granularity::Granularity,
    period::{Period, Window},
    stats::{peaks_and_averages, totals, PeaksAndAverages, Totals},
    QueryError,
};
use crate::{
    db::reading_queries,
    domain::{Reading, ReadingSource},
    synthetic::{diurnal_sample, DaylightWindow},
    zone::LocalZone,
};

/// Upper bound on series length for a single query.
pub const MAX_SERIES_BUCKETS: i64 = 4_000;

/// Points in the placeholder series returned when the store has no rows.
pub const SYNTHETIC_SERIES_POINTS: i64 = 24;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct QueryResult {
    pub period: String,
    pub granularity: String,
    /// True when the store had no readings in range and the series below is
    /// a placeholder, not an aggregate of real data.
    pub synthetic: bool,
    pub series: Vec<AggregateBucket>,
    pub summary: Totals,
    pub details: PeaksAndAverages,
}

/// Read-only aggregation over the reading store. Cheap to clone; every
/// query is independent.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    pool: SqlitePool,
    zone: LocalZone,
    sample_interval: StdDuration,
    daylight: DaylightWindow,
}

impl QueryEngine {
    /// `sample_interval` is the collector cadence; it converts summed kW
    /// samples into kWh. Calendar periods and buckets follow `zone`.
    pub fn new(pool: SqlitePool, zone: LocalZone, sample_interval: StdDuration) -> Self {
        Self {
            pool,
            zone,
            sample_interval,
            daylight: DaylightWindow::DEFAULT,
        }
    }

    pub fn with_daylight(mut self, daylight: DaylightWindow) -> Self {
        self.daylight = daylight;
        self
    }

    pub async fn query(&self, period: &str, granularity: &str) -> Result<QueryResult, QueryError> {
        self.query_at(OffsetDateTime::now_utc(), period, granularity).await
    }

    /// Same as [`query`](Self::query) with an explicit "now".
    pub async fn query_at(
        &self,
        now: OffsetDateTime,
        period: &str,
        granularity: &str,
    ) -> Result<QueryResult, QueryError> {
        let period: Period = period.parse()?;
        let granularity: Granularity = granularity.parse()?;

        let now = self.zone.to_local(now);
        let window = period.window(now, self.zone);
        check_bucket_budget(period, granularity, &window)?;

        let readings = reading_queries::readings_between(&self.pool, window.start, window.end).await?;
        if readings.is_empty() {
            return Ok(self.placeholder(now, period, granularity));
        }

        let per_hour = self.readings_per_hour();
        // A 24h window starts and ends at the same clock time, so its labels
        // need the date too.
        let multi_day = window.duration() >= Duration::days(1);

        Ok(QueryResult {
            period: period.to_string(),
            granularity: granularity.to_string(),
            synthetic: false,
            series: bucketize(&readings, &window, granularity, self.zone, multi_day),
            summary: totals(&readings, per_hour),
            details: peaks_and_averages(&readings, per_hour, self.zone, period.spans_full_day()),
        })
    }

    fn readings_per_hour(&self) -> f64 {
        let secs = self.sample_interval.as_secs_f64();
        if secs > 0.0 {
            3600.0 / secs
        } else {
            1.0
        }
    }

    /// Hourly diurnal series over the last 24 hours, tagged synthetic.
    fn placeholder(&self, now: OffsetDateTime, period: Period, granularity: Granularity) -> QueryResult {
        let last_hour = Granularity::Hour.truncate(now);
        let first_hour = last_hour - Duration::hours(SYNTHETIC_SERIES_POINTS - 1);

        let mut rng = thread_rng();
        let readings: Vec<Reading> = (0..SYNTHETIC_SERIES_POINTS)
            .map(|i| {
                let ts = self.zone.to_local(first_hour + Duration::hours(i));
                let sample = diurnal_sample(f64::from(ts.hour()) + 0.5, self.daylight, &mut rng);
                Reading::new(ts, sample.production_kw, sample.consumption_kw, ReadingSource::FallbackSynthetic)
            })
            .collect();

        let window = Window {
            start: first_hour,
            end: now,
        };

        QueryResult {
            period: period.to_string(),
            granularity: granularity.to_string(),
            synthetic: true,
            series: bucketize(&readings, &window, Granularity::Hour, self.zone, false),
            summary: totals(&readings, 1.0),
            details: peaks_and_averages(&readings, 1.0, self.zone, period.spans_full_day()),
        }
    }
}

fn check_bucket_budget(period: Period, granularity: Granularity, window: &Window) -> Result<(), QueryError> {
    let width = granularity.nominal_width().whole_seconds().max(1);
    let buckets = window.duration().whole_seconds() / width + 1;
    if buckets > MAX_SERIES_BUCKETS {
        return Err(QueryError::InvalidCombination {
            period,
            granularity,
            buckets,
            limit: MAX_SERIES_BUCKETS,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{connect_in_memory, format_ts};
    use time::macros::datetime;

    const MINUTE: StdDuration = StdDuration::from_secs(60);

    async fn store_with(readings: &[Reading]) -> SqlitePool {
        let pool = connect_in_memory().await.unwrap();
        for r in readings {
            sqlx::query(
                "INSERT INTO readings (timestamp, production_kw, consumption_kw, net_export_kw, source) VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(format_ts(r.ts))
            .bind(r.production_kw)
            .bind(r.consumption_kw)
            .bind(r.net_export_kw)
            .bind(r.source.as_str())
            .execute(&pool)
            .await
            .unwrap();
        }
        pool
    }

    fn real(ts: OffsetDateTime, production: f64, consumption: f64) -> Reading {
        Reading::new(ts, production, consumption, ReadingSource::GatewayReal)
    }

    #[tokio::test]
    async fn empty_store_yields_24_point_synthetic_series() {
        let engine = QueryEngine::new(store_with(&[]).await, LocalZone::UTC, MINUTE);
        let res = engine.query_at(datetime!(2025-06-01 15:20 UTC), "24h", "hour").await.unwrap();

        assert!(res.synthetic);
        assert_eq!(res.series.len(), 24);
        assert!(res.series.iter().all(|b| b.sample_count == 1));
        // Night hours produce nothing, midday hours do.
        let at = |h: u8| res.series.iter().find(|b| b.bucket_start.hour() == h).unwrap();
        assert_eq!(at(2).avg_production_kw, 0.0);
        assert!(at(12).avg_production_kw > 0.0);
    }

    #[tokio::test]
    async fn invalid_parameters_fail_before_touching_data() {
        let engine = QueryEngine::new(store_with(&[]).await, LocalZone::UTC, MINUTE);
        let now = datetime!(2025-06-01 15:20 UTC);

        let err = engine.query_at(now, "fortnight", "hour").await.unwrap_err();
        assert!(matches!(err, QueryError::InvalidPeriod(_)));
        assert!(err.is_invalid_parameters());

        let err = engine.query_at(now, "24h", "decade").await.unwrap_err();
        assert!(matches!(err, QueryError::InvalidGranularity(_)));

        let err = engine.query_at(now, "1y", "minute").await.unwrap_err();
        assert!(matches!(err, QueryError::InvalidCombination { .. }));
    }

    #[tokio::test]
    async fn real_readings_are_bucketed_and_summarised() {
        let now = datetime!(2025-06-01 14:00 UTC);
        let readings: Vec<Reading> = (0..120)
            .map(|m| real(datetime!(2025-06-01 12:00 UTC) + Duration::minutes(m), 3.0, 1.0))
            .collect();
        let engine = QueryEngine::new(store_with(&readings).await, LocalZone::UTC, MINUTE);

        let res = engine.query_at(now, "24h", "hour").await.unwrap();

        assert!(!res.synthetic);
        let n = res.series.len() as i64;
        assert!((23..=25).contains(&n), "{n}");
        let noon = res.series.iter().find(|b| b.bucket_start == datetime!(2025-06-01 12:00 UTC)).unwrap();
        assert_eq!(noon.sample_count, 60);
        assert!((res.summary.total_production - 6.0).abs() < 1e-9);
        assert!((res.summary.total_consumption - 2.0).abs() < 1e-9);
        assert!((res.summary.efficiency - 300.0).abs() < 1e-9);
        assert_eq!(res.details.peak_production.unwrap().at, datetime!(2025-06-01 12:00 UTC));
        assert!(res.details.avg_daily_production.is_some());
        let first = &res.series[0].bucket_label;
        assert_eq!(first, "05/31 14:00");
        assert_ne!(first, &res.series[n as usize - 1].bucket_label);
    }

    #[tokio::test]
    async fn short_periods_omit_daily_averages() {
        let now = datetime!(2025-06-01 14:00 UTC);
        let engine = QueryEngine::new(
            store_with(&[real(datetime!(2025-06-01 13:30 UTC), 2.0, 1.0)]).await,
            LocalZone::UTC,
            MINUTE,
        );

        let res = engine.query_at(now, "6h", "15min").await.unwrap();

        assert!(res.details.avg_daily_production.is_none());
        assert!(res.details.avg_daily_consumption.is_none());
        assert!(res.details.avg_daily_export.is_none());
    }

    #[tokio::test]
    async fn weekly_daily_average_uses_days_with_data() {
        let now = datetime!(2025-06-07 20:00 UTC);
        // 60 one-minute samples per day at 2 kW = 2 kWh/day on three days.
        let mut readings = Vec::new();
        for day in [datetime!(2025-06-02 12:00 UTC), datetime!(2025-06-04 12:00 UTC), datetime!(2025-06-06 12:00 UTC)] {
            readings.extend((0..60).map(|m| real(day + Duration::minutes(m), 2.0, 0.5)));
        }
        let engine = QueryEngine::new(store_with(&readings).await, LocalZone::UTC, MINUTE);

        let res = engine.query_at(now, "7d", "day").await.unwrap();

        assert!((res.summary.total_production - 6.0).abs() < 1e-9);
        assert!((res.details.avg_daily_production.unwrap() - 2.0).abs() < 1e-9);
        assert!((res.details.avg_daily_consumption.unwrap() - 0.5).abs() < 1e-9);
        assert_eq!(res.series.iter().filter(|b| b.sample_count > 0).count(), 3);
        let n = res.series.len();
        assert!((7..=8).contains(&n), "{n}");
    }

    #[tokio::test]
    async fn day_series_follows_site_zone_across_daylight_saving() {
        let zone: LocalZone = "America/Denver".parse().unwrap();
        let now = datetime!(2025-03-11 18:00 UTC);
        // 00:30 MDT on the 10th, the first midnight after the change.
        let readings = vec![real(datetime!(2025-03-10 06:30 UTC), 2.0, 1.0)];
        let engine = QueryEngine::new(store_with(&readings).await, zone, MINUTE);

        let res = engine.query_at(now, "7d", "day").await.unwrap();

        let hit: Vec<_> = res.series.iter().filter(|b| b.sample_count > 0).collect();
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].bucket_start, datetime!(2025-03-10 0:00 -6));
        assert_eq!(hit[0].bucket_label, "03/10");
        let before = res.series.iter().find(|b| b.bucket_label == "03/09").unwrap();
        assert_eq!(before.bucket_start, datetime!(2025-03-09 0:00 -7));
    }
}
