//! Pure conversion of raw gateway device records into typed telemetry.

use solar_client::domain::{DeviceClass, DeviceReading, DeviceStatus, Reading, ReadingSource, SystemSummary};
use time::{macros::datetime, OffsetDateTime};

use crate::{pipeline::PipelineError, sources::gateway::RawDevice};

/// Household draw assumed when the gateway lists no consumption meter.
/// Reporting 0 would make every watt of production look exported.
pub const FALLBACK_CONSUMPTION_KW: f64 = 1.5;

/// One classification rule. Rules are tried in order; the first match wins.
#[derive(Clone, Copy)]
pub struct Rule {
    pub class: DeviceClass,
    pub matches: fn(&RawDevice) -> bool,
}

pub const RULES: [Rule; 3] = [
    Rule {
        class: DeviceClass::ProductionMeter,
        matches: is_production_meter,
    },
    Rule {
        class: DeviceClass::ConsumptionMeter,
        matches: is_consumption_meter,
    },
    Rule {
        class: DeviceClass::Inverter,
        matches: is_inverter,
    },
];

fn is_power_meter(d: &RawDevice) -> bool {
    d.text("DEVICE_TYPE").to_lowercase().contains("power meter")
}

// Field checks short-circuit in this order; the gateway labels meters
// inconsistently across firmware versions.
fn is_production_meter(d: &RawDevice) -> bool {
    is_power_meter(d)
        && (d.text("subtype").contains("GROSS_PRODUCTION")
            || d.text("production_subtype_enum").contains("GROSS_PRODUCTION")
            || d.text("SERIAL").ends_with('p'))
}

fn is_consumption_meter(d: &RawDevice) -> bool {
    is_power_meter(d)
        && (d.text("subtype").contains("GROSS_CONSUMPTION")
            || d.text("consumption_subtype_enum").contains("GROSS_CONSUMPTION")
            || d.text("SERIAL").ends_with('c'))
}

fn is_inverter(d: &RawDevice) -> bool {
    d.text("DEVICE_TYPE").to_lowercase().contains("inverter")
}

pub fn classify(device: &RawDevice) -> DeviceClass {
    RULES
        .iter()
        .find(|rule| (rule.matches)(device))
        .map_or(DeviceClass::Unknown, |rule| rule.class)
}

#[derive(Debug, Clone)]
pub struct Classified {
    pub summary: SystemSummary,
    pub devices: Vec<DeviceReading>,
}

/// Classifies every device and folds the meters into a system summary.
pub fn classify_devices(raw: &[RawDevice], at: OffsetDateTime) -> Classified {
    let mut production_kw = 0.0;
    let mut consumption_kw = 0.0;
    let mut consumption_meter_seen = false;
    let mut working = 0;
    let mut devices = Vec::with_capacity(raw.len());

    for d in raw {
        let class = classify(d);
        let power_kw = d.number("p_3phsum_kw");
        let state = d.text("STATE");

        match class {
            DeviceClass::ProductionMeter => production_kw += power_kw,
            DeviceClass::ConsumptionMeter => {
                consumption_kw += power_kw;
                consumption_meter_seen = true;
            }
            DeviceClass::Inverter => {}
            DeviceClass::Unknown => {
                metrics::counter!("classifier_unmatched_devices_total").increment(1);
                tracing::debug!(
                    device_type = d.text("DEVICE_TYPE"),
                    serial = d.text("SERIAL"),
                    "device matched no classification rule"
                );
            }
        }

        if state.eq_ignore_ascii_case("working") {
            working += 1;
        }

        devices.push(DeviceReading {
            ts: at,
            device_id: device_id(d),
            device_class: class,
            power_kw,
            voltage: d.number("vln_3phavg"),
            current_a: d.number("i_3phsum_a"),
            frequency_hz: d.number("freq_hz"),
            temperature_c: d.number("t_htsnk_degc"),
            status: DeviceStatus::from_gateway_state(state),
        });
    }

    if !consumption_meter_seen {
        consumption_kw = FALLBACK_CONSUMPTION_KW;
    }

    Classified {
        summary: SystemSummary {
            device_count: raw.len(),
            working_device_count: working,
            total_production_kw: production_kw,
            total_consumption_kw: consumption_kw,
            net_export_kw: production_kw - consumption_kw,
            system_online: working > 0,
            gateway_online: true,
        },
        devices,
    }
}

pub fn summarize(raw: &[RawDevice]) -> SystemSummary {
    classify_devices(raw, OffsetDateTime::now_utc()).summary
}

fn device_id(d: &RawDevice) -> String {
    let serial = d.text("SERIAL").trim();
    if serial.is_empty() {
        d.text("DEVICE_ID").trim().to_string()
    } else {
        serial.to_string()
    }
}

/// Sanity checks on a reading before it is stored.
///
/// Rules:
/// - power values must be finite.
/// - ts must be within a broad sanity window [2000-01-01, 2100-01-01].
pub fn validate_reading(reading: &Reading) -> Result<(), PipelineError> {
    if !(reading.production_kw.is_finite() && reading.consumption_kw.is_finite()) {
        return Err(PipelineError::InvalidReading("power values must be finite".to_string()));
    }

    let min_ts = datetime!(2000-01-01 00:00:00 UTC);
    let max_ts = datetime!(2100-01-01 00:00:00 UTC);

    if reading.ts < min_ts || reading.ts > max_ts {
        return Err(PipelineError::InvalidReading("timestamp out of allowed range".to_string()));
    }

    Ok(())
}

/// Folds a live summary into the tick's primary reading.
pub fn reading_from_summary(summary: &SystemSummary, at: OffsetDateTime) -> Result<Reading, PipelineError> {
    let reading = Reading::new(
        at,
        summary.total_production_kw,
        summary.total_consumption_kw,
        ReadingSource::GatewayReal,
    );
    validate_reading(&reading)?;
    Ok(reading)
}
