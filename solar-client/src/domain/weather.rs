use time::OffsetDateTime;

/// Current conditions from the weather API, stored alongside telemetry.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct WeatherObservation {
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub ts: OffsetDateTime,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub humidity_pct: i64,
    pub pressure_hpa: i64,
    pub visibility_km: f64,
    pub clouds_pct: i64,
    pub wind_speed_ms: f64,
    pub wind_direction_deg: i64,
    pub condition: String,
    pub description: String,
    pub icon: String,
    /// Unix seconds, as reported by the API.
    pub sunrise: i64,
    pub sunset: i64,
    pub city: String,
    pub country: String,
}
