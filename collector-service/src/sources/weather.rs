//! Current conditions from OpenWeatherMap.

use std::time::Duration;

use serde::Deserialize;
use solar_client::domain::WeatherObservation;
use time::OffsetDateTime;

use crate::pipeline::{PipelineError, WeatherSource};

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    main: Main,
    #[serde(default)]
    visibility: f64,
    #[serde(default)]
    clouds: Clouds,
    #[serde(default)]
    wind: Wind,
    #[serde(default)]
    weather: Vec<Condition>,
    sys: Sys,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct Main {
    temp: f64,
    feels_like: f64,
    humidity: i64,
    pressure: i64,
}

#[derive(Debug, Default, Deserialize)]
struct Clouds {
    #[serde(default)]
    all: i64,
}

#[derive(Debug, Default, Deserialize)]
struct Wind {
    #[serde(default)]
    speed: f64,
    #[serde(default)]
    deg: i64,
}

#[derive(Debug, Deserialize)]
struct Condition {
    main: String,
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct Sys {
    #[serde(default)]
    country: String,
    sunrise: i64,
    sunset: i64,
}

#[derive(Debug, Clone)]
pub struct WeatherClient {
    base_url: String,
    api_key: String,
    latitude: f64,
    longitude: f64,
    client: reqwest::Client,
}

impl WeatherClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        latitude: f64,
        longitude: f64,
        timeout: Duration,
    ) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::AuxiliaryFetchFailed(format!("http client: {e}")))?;

        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            latitude,
            longitude,
            client,
        })
    }

    async fn fetch(&self) -> Result<CurrentWeather, PipelineError> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("lat", self.latitude.to_string()),
                ("lon", self.longitude.to_string()),
                ("appid", self.api_key.clone()),
                ("units", "metric".to_string()),
            ])
            .send()
            .await
            .map_err(|e| PipelineError::AuxiliaryFetchFailed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PipelineError::AuxiliaryFetchFailed(format!("weather API returned {status}")));
        }

        resp.json::<CurrentWeather>()
            .await
            .map_err(|e| PipelineError::AuxiliaryFetchFailed(format!("malformed weather body: {e}")))
    }
}

#[async_trait::async_trait]
impl WeatherSource for WeatherClient {
    async fn current(&self, at: OffsetDateTime) -> Result<WeatherObservation, PipelineError> {
        let w = self.fetch().await?;
        let condition = w.weather.into_iter().next();

        Ok(WeatherObservation {
            ts: at,
            temperature_c: w.main.temp,
            feels_like_c: w.main.feels_like,
            humidity_pct: w.main.humidity,
            pressure_hpa: w.main.pressure,
            visibility_km: w.visibility / 1000.0,
            clouds_pct: w.clouds.all,
            wind_speed_ms: w.wind.speed,
            wind_direction_deg: w.wind.deg,
            condition: condition.as_ref().map(|c| c.main.clone()).unwrap_or_default(),
            description: condition.as_ref().map(|c| c.description.clone()).unwrap_or_default(),
            icon: condition.map(|c| c.icon).unwrap_or_default(),
            sunrise: w.sys.sunrise,
            sunset: w.sys.sunset,
            city: w.name,
            country: w.sys.country,
        })
    }
}
