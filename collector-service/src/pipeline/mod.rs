use solar_client::domain::{DeviceReading, Reading, WeatherObservation};
use time::OffsetDateTime;

pub mod collector;

pub use collector::Collector;

/// Output of one [`ReadingSource`] poll.
#[derive(Debug, Clone)]
pub struct Sample {
    pub reading: Reading,
    /// Per-device rows; only a gateway that answered produces these.
    pub devices: Vec<DeviceReading>,
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("gateway unreachable: {0}")]
    GatewayUnreachable(String),
    #[error("gateway protocol error: {0}")]
    GatewayProtocol(String),
    /// The gateway answered but no device reports working. `devices` holds
    /// the rows from that answer so they can still be stored.
    #[error("system offline: 0 of {device_count} devices working")]
    SystemOffline {
        device_count: usize,
        devices: Vec<DeviceReading>,
    },
    #[error("invalid reading: {0}")]
    InvalidReading(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("auxiliary fetch failed: {0}")]
    AuxiliaryFetchFailed(String),
}

impl PipelineError {
    /// Failures that the collector answers with a synthetic reading.
    pub fn triggers_fallback(&self) -> bool {
        matches!(
            self,
            Self::GatewayUnreachable(_)
                | Self::GatewayProtocol(_)
                | Self::SystemOffline { .. }
                | Self::InvalidReading(_)
        )
    }

    /// Device rows carried by the failure; empty for every other variant.
    pub fn into_devices(self) -> Vec<DeviceReading> {
        match self {
            Self::SystemOffline { devices, .. } => devices,
            _ => Vec::new(),
        }
    }
}

/// Something that can produce the primary reading for a tick.
#[async_trait::async_trait]
pub trait ReadingSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn sample(&self, at: OffsetDateTime) -> Result<Sample, PipelineError>;
}

/// Persistence for everything a tick produces.
#[async_trait::async_trait]
pub trait ReadingSink: Send + Sync {
    async fn write_reading(&self, reading: &Reading) -> Result<(), PipelineError>;

    async fn write_devices(&self, devices: &[DeviceReading]) -> Result<(), PipelineError>;

    async fn write_weather(&self, observation: &WeatherObservation) -> Result<(), PipelineError>;
}

/// Best-effort auxiliary data fetched once per tick.
#[async_trait::async_trait]
pub trait WeatherSource: Send + Sync {
    async fn current(&self, at: OffsetDateTime) -> Result<WeatherObservation, PipelineError>;
}
