//! Client for the solar gateway's local device-list endpoint.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{Map, Value};
use solar_client::domain::SystemSummary;
use time::OffsetDateTime;

use crate::{
    pipeline::{PipelineError, ReadingSource, Sample},
    transform,
};

pub const DEVICE_LIST_PATH: &str = "/cgi-bin/dl_cgi?Command=DeviceList";

/// One device record exactly as the gateway reported it.
///
/// Field values arrive as strings, integers or floats depending on firmware,
/// so access goes through the coercing helpers below.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawDevice(Map<String, Value>);

impl RawDevice {
    /// `None` for anything but a JSON object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// String field, or `""` when missing or not a string.
    pub fn text(&self, key: &str) -> &str {
        self.0.get(key).and_then(Value::as_str).unwrap_or("")
    }

    /// Numeric field coerced to `f64`; 0 when missing or unparseable.
    pub fn number(&self, key: &str) -> f64 {
        let v = match self.0.get(key) {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        v.filter(|v| v.is_finite()).unwrap_or(0.0)
    }
}

#[derive(Debug, Clone)]
pub struct GatewayClient {
    base_url: String,
    client: reqwest::Client,
}

impl GatewayClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, PipelineError> {
        let mut base_url: String = base_url.into();
        if !base_url.contains("://") {
            base_url = format!("http://{base_url}");
        }
        let base_url = base_url.trim_end_matches('/').to_string();

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::GatewayUnreachable(format!("http client: {e}")))?;

        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn device_list_url(&self) -> String {
        format!("{}{}", self.base_url, DEVICE_LIST_PATH)
    }

    /// True when the device-list endpoint answers 200 within the timeout.
    pub async fn test_connection(&self) -> bool {
        match self.client.get(self.device_list_url()).send().await {
            Ok(resp) => resp.status() == StatusCode::OK,
            Err(e) => {
                tracing::debug!(error = %e, url = %self.base_url, "gateway connection test failed");
                false
            }
        }
    }

    pub async fn fetch_devices(&self) -> Result<Vec<RawDevice>, PipelineError> {
        let resp = self
            .client
            .get(self.device_list_url())
            .send()
            .await
            .map_err(|e| PipelineError::GatewayUnreachable(e.to_string()))?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(PipelineError::GatewayProtocol(format!("unexpected status {status}")));
        }

        let body: Value = resp.json().await.map_err(|e| {
            if e.is_timeout() {
                PipelineError::GatewayUnreachable(e.to_string())
            } else {
                PipelineError::GatewayProtocol(format!("malformed body: {e}"))
            }
        })?;

        parse_device_list(body)
    }

    pub fn summarize(devices: &[RawDevice]) -> SystemSummary {
        transform::summarize(devices)
    }
}

/// Validates the device-list envelope and keeps the object records.
pub fn parse_device_list(body: Value) -> Result<Vec<RawDevice>, PipelineError> {
    let result = body.get("result").and_then(Value::as_str).unwrap_or("");
    if result != "succeed" {
        return Err(PipelineError::GatewayProtocol(format!("result was {result:?}")));
    }

    let Some(Value::Array(items)) = body.get("devices") else {
        return Err(PipelineError::GatewayProtocol("missing devices array".to_string()));
    };

    let devices: Vec<RawDevice> = items.iter().cloned().filter_map(RawDevice::from_value).collect();
    if devices.is_empty() {
        return Err(PipelineError::GatewayProtocol("empty device list".to_string()));
    }
    Ok(devices)
}

/// Primary reading source backed by a live gateway.
#[derive(Debug, Clone)]
pub struct RealSource {
    client: GatewayClient,
}

impl RealSource {
    pub fn new(client: GatewayClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ReadingSource for RealSource {
    fn name(&self) -> &'static str {
        "gateway"
    }

    async fn sample(&self, at: OffsetDateTime) -> Result<Sample, PipelineError> {
        let raw = self.client.fetch_devices().await?;
        let classified = transform::classify_devices(&raw, at);
        let summary = classified.summary;

        let total = classified.devices.len();
        let devices: Vec<_> = classified
            .devices
            .into_iter()
            .filter(|d| !d.device_id.is_empty())
            .collect();
        if devices.len() < total {
            tracing::debug!(skipped = total - devices.len(), "devices without an id not persisted");
        }

        if !summary.system_online {
            return Err(PipelineError::SystemOffline {
                device_count: summary.device_count,
                devices,
            });
        }

        let reading = transform::reading_from_summary(&summary, at)?;

        tracing::debug!(
            devices = summary.device_count,
            working = summary.working_device_count,
            "gateway polled"
        );
        Ok(Sample { reading, devices })
    }
}
