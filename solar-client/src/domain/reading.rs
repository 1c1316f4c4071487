use std::{fmt, str::FromStr};

use time::OffsetDateTime;

/// Where a [`Reading`] came from. Persisted as its string form in `readings.source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ReadingSource {
    GatewayReal,
    FallbackSynthetic,
}

impl ReadingSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GatewayReal => "gateway_real",
            Self::FallbackSynthetic => "fallback_synthetic",
        }
    }
}

impl fmt::Display for ReadingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadingSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gateway_real" => Ok(Self::GatewayReal),
            "fallback_synthetic" => Ok(Self::FallbackSynthetic),
            other => Err(format!("unknown reading source '{other}'")),
        }
    }
}

/// One row per collection tick.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Reading {
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub ts: OffsetDateTime,
    pub production_kw: f64,
    pub consumption_kw: f64,
    pub net_export_kw: f64,
    pub source: ReadingSource,
}

impl Reading {
    /// Builds a reading, clamping negative power to zero and deriving
    /// `net_export_kw` from the clamped values.
    pub fn new(ts: OffsetDateTime, production_kw: f64, consumption_kw: f64, source: ReadingSource) -> Self {
        let production_kw = production_kw.max(0.0);
        let consumption_kw = consumption_kw.max(0.0);
        Self {
            ts,
            production_kw,
            consumption_kw,
            net_export_kw: production_kw - consumption_kw,
            source,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.source == ReadingSource::FallbackSynthetic
    }
}
