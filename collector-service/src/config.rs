use serde::Deserialize;
use solar_client::zone::LocalZone;
use std::{env, fs, io::ErrorKind, time::Duration};
use time::UtcOffset;

pub const CONFIG_PATH_ENV: &str = "SOLAR_MONITOR_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "solar-monitor.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://172.27.152.1".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub interval_secs: u64,
    pub daylight_start_hour: u8,
    pub daylight_end_hour: u8,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            daylight_start_hour: 6,
            daylight_end_hour: 18,
        }
    }
}

impl CollectorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: String,
    pub max_connections: u32,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "solar_data.db".to_string(),
            max_connections: 4,
            max_retries: 2,
            retry_backoff_ms: 250,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub api_key: String,
    pub latitude: f64,
    pub longitude: f64,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            latitude: 39.7392,
            longitude: -104.9903,
            base_url: "https://api.openweathermap.org/data/2.5/weather".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Site time zone: an IANA name such as "America/Denver", or a fixed
    /// offset such as "-07:00". Unset means the host's current offset.
    #[serde(alias = "utc_offset")]
    pub timezone: Option<String>,
    pub gateway: GatewayConfig,
    pub collector: CollectorConfig,
    pub store: StoreConfig,
    pub weather: Option<WeatherConfig>,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    /// Reads the TOML file named by `SOLAR_MONITOR_CONFIG`, then applies
    /// environment overrides. A missing file means all defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut cfg = match fs::read_to_string(&path) {
            Ok(contents) => Self::from_toml_str(&contents)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(path = %path, "config file not found, using defaults");
                Self::default()
            }
            Err(e) => return Err(anyhow::anyhow!("reading {path}: {e}")),
        };
        cfg.apply_overrides(|key| env::var(key).ok());
        Ok(cfg)
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// `GATEWAY_BASE_URL`, `DATABASE_PATH` and `WEATHER_API_KEY` win over
    /// the file. A weather key alone enables weather with default location.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("GATEWAY_BASE_URL").filter(|v| !v.trim().is_empty()) {
            self.gateway.base_url = url;
        }
        if let Some(path) = var("DATABASE_PATH").filter(|v| !v.trim().is_empty()) {
            self.store.path = path;
        }
        if let Some(key) = var("WEATHER_API_KEY").filter(|v| !v.trim().is_empty()) {
            self.weather.get_or_insert_with(WeatherConfig::default).api_key = key;
        }
    }

    /// Weather settings, only when an API key is present.
    pub fn weather_enabled(&self) -> Option<&WeatherConfig> {
        self.weather.as_ref().filter(|w| !w.api_key.trim().is_empty())
    }

    pub fn local_zone(&self) -> anyhow::Result<LocalZone> {
        match &self.timezone {
            Some(raw) => raw.parse().map_err(|e: String| anyhow::anyhow!(e)),
            None => {
                let offset = UtcOffset::current_local_offset().unwrap_or_else(|_| {
                    tracing::warn!("local UTC offset unavailable, using UTC");
                    UtcOffset::UTC
                });
                tracing::warn!(%offset, "no timezone configured, daylight saving will not be followed");
                Ok(LocalZone::Fixed(offset))
            }
        }
    }
}
