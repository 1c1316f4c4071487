use solar_client::{
    domain::{Reading, ReadingSource as Tag},
    synthetic::{diurnal_sample, DaylightWindow},
    zone::LocalZone,
};
use time::OffsetDateTime;

use crate::pipeline::{PipelineError, ReadingSource, Sample};

/// Synthesizes a plausible reading from the local time of day.
#[derive(Debug, Clone, Copy)]
pub struct FallbackSource {
    daylight: DaylightWindow,
    zone: LocalZone,
}

impl FallbackSource {
    pub fn new(daylight: DaylightWindow, zone: LocalZone) -> Self {
        Self { daylight, zone }
    }

    pub fn reading_at(&self, at: OffsetDateTime) -> Reading {
        let local = self.zone.to_local(at);
        let hour = f64::from(local.hour()) + f64::from(local.minute()) / 60.0;
        let sample = diurnal_sample(hour, self.daylight, &mut rand::thread_rng());
        Reading::new(at, sample.production_kw, sample.consumption_kw, Tag::FallbackSynthetic)
    }
}

#[async_trait::async_trait]
impl ReadingSource for FallbackSource {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    async fn sample(&self, at: OffsetDateTime) -> Result<Sample, PipelineError> {
        Ok(Sample {
            reading: self.reading_at(at),
            devices: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{datetime, offset};

    fn denver() -> LocalZone {
        "America/Denver".parse().unwrap()
    }

    #[test]
    fn follows_local_time_not_utc() {
        let denver = FallbackSource::new(DaylightWindow::DEFAULT, LocalZone::Fixed(offset!(-6)));

        // 04:00 UTC is 22:00 the previous evening in Denver.
        let night = denver.reading_at(datetime!(2025-06-02 04:00 UTC));
        assert_eq!(night.production_kw, 0.0);

        // 18:00 UTC is local noon.
        let noon = denver.reading_at(datetime!(2025-06-01 18:00 UTC));
        assert!(noon.production_kw >= 3.6 && noon.production_kw <= 4.4, "{}", noon.production_kw);
    }

    #[test]
    fn readings_are_tagged_and_balanced() {
        let source = FallbackSource::new(DaylightWindow::DEFAULT, LocalZone::UTC);
        let r = source.reading_at(datetime!(2025-06-01 09:30 UTC));
        assert!(r.is_synthetic());
        assert!((1.7..=2.3).contains(&r.consumption_kw));
        assert!((r.net_export_kw - (r.production_kw - r.consumption_kw)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn never_fails_and_has_no_devices() {
        let source = FallbackSource::new(DaylightWindow::DEFAULT, LocalZone::UTC);
        let sample = source.sample(datetime!(2025-06-01 03:00 UTC)).await.unwrap();
        assert!(sample.devices.is_empty());
        assert_eq!(sample.reading.ts, datetime!(2025-06-01 03:00 UTC));
    }

    #[test]
    fn evening_cutoff_moves_with_daylight_saving() {
        let source = FallbackSource::new(DaylightWindow::DEFAULT, denver());

        // 00:30 UTC is 17:30 MST in January but 18:30 MDT in July.
        let winter = source.reading_at(datetime!(2025-01-15 00:30 UTC));
        assert!(winter.production_kw > 0.0);
        let summer = source.reading_at(datetime!(2025-07-02 00:30 UTC));
        assert_eq!(summer.production_kw, 0.0);

        // A winter offset pinned at startup would still call it 17:30.
        let pinned = FallbackSource::new(DaylightWindow::DEFAULT, LocalZone::Fixed(offset!(-7)));
        assert!(pinned.reading_at(datetime!(2025-07-02 00:30 UTC)).production_kw > 0.0);
    }
}
