use std::{fmt, str::FromStr};

use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DeviceClass {
    Inverter,
    ProductionMeter,
    ConsumptionMeter,
    Unknown,
}

impl DeviceClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inverter => "inverter",
            Self::ProductionMeter => "production_meter",
            Self::ConsumptionMeter => "consumption_meter",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inverter" => Ok(Self::Inverter),
            "production_meter" => Ok(Self::ProductionMeter),
            "consumption_meter" => Ok(Self::ConsumptionMeter),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("unknown device class '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DeviceStatus {
    Working,
    Error,
    Sleeping,
    Offline,
}

impl DeviceStatus {
    /// Maps the gateway's free-form `STATE` string. Anything unrecognised is
    /// reported as offline.
    pub fn from_gateway_state(state: &str) -> Self {
        match state.trim().to_ascii_lowercase().as_str() {
            "working" => Self::Working,
            "error" => Self::Error,
            "sleeping" | "sleep" => Self::Sleeping,
            _ => Self::Offline,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Working => "working",
            Self::Error => "error",
            Self::Sleeping => "sleeping",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-device telemetry captured on a tick where the gateway answered.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DeviceReading {
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub ts: OffsetDateTime,
    pub device_id: String,
    pub device_class: DeviceClass,
    pub power_kw: f64,
    pub voltage: f64,
    pub current_a: f64,
    pub frequency_hz: f64,
    pub temperature_c: f64,
    pub status: DeviceStatus,
}
