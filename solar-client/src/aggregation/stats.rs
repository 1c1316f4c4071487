use std::collections::BTreeMap;

use time::OffsetDateTime;

use crate::{domain::Reading, zone::LocalZone};

/// Energy totals over the raw readings of a query window, in kWh.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Totals {
    pub total_production: f64,
    pub total_consumption: f64,
    pub net_export: f64,
    /// Production as a percentage of consumption; 0 when nothing was consumed.
    pub efficiency: f64,
}

/// A maximum raw value and when it was observed.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Peak {
    pub value_kw: f64,
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PeaksAndAverages {
    pub peak_production: Option<Peak>,
    pub peak_consumption: Option<Peak>,
    pub best_export: Option<Peak>,
    /// kWh per calendar day; absent for periods shorter than a day.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub avg_daily_production: Option<f64>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub avg_daily_consumption: Option<f64>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub avg_daily_export: Option<f64>,
}

/// Sums instantaneous kW samples into kWh. Each sample stands for
/// `1 / readings_per_hour` hours.
pub fn totals(readings: &[Reading], readings_per_hour: f64) -> Totals {
    let (production_kw, consumption_kw) = readings
        .iter()
        .fold((0.0, 0.0), |(p, c), r| (p + r.production_kw, c + r.consumption_kw));

    let total_production = production_kw / readings_per_hour;
    let total_consumption = consumption_kw / readings_per_hour;
    let efficiency = if total_consumption > 0.0 {
        total_production / total_consumption * 100.0
    } else {
        0.0
    };

    Totals {
        total_production,
        total_consumption,
        net_export: total_production - total_consumption,
        efficiency,
    }
}

/// First reading holding the maximum of `value`; later ties lose.
fn peak_by(readings: &[Reading], value: impl Fn(&Reading) -> f64) -> Option<Peak> {
    readings.iter().fold(None, |best: Option<Peak>, r| {
        let v = value(r);
        match best {
            Some(b) if b.value_kw >= v => Some(b),
            _ => Some(Peak { value_kw: v, at: r.ts }),
        }
    })
}

/// Peaks over raw readings, plus per-day averages when `include_daily`.
///
/// Daily averages sum energy within each local calendar day first and then
/// average over the days that actually have readings, so partial first and
/// last days and gaps do not dilute the figure.
pub fn peaks_and_averages(
    readings: &[Reading],
    readings_per_hour: f64,
    zone: LocalZone,
    include_daily: bool,
) -> PeaksAndAverages {
    let mut out = PeaksAndAverages {
        peak_production: peak_by(readings, |r| r.production_kw),
        peak_consumption: peak_by(readings, |r| r.consumption_kw),
        best_export: peak_by(readings, |r| r.net_export_kw),
        ..Default::default()
    };

    if !include_daily || readings.is_empty() {
        return out;
    }

    let mut per_day: BTreeMap<time::Date, (f64, f64)> = BTreeMap::new();
    for r in readings {
        let day = zone.to_local(r.ts).date();
        let entry = per_day.entry(day).or_insert((0.0, 0.0));
        entry.0 += r.production_kw / readings_per_hour;
        entry.1 += r.consumption_kw / readings_per_hour;
    }

    let days = per_day.len() as f64;
    let production = per_day.values().map(|(p, _)| p).sum::<f64>() / days;
    let consumption = per_day.values().map(|(_, c)| c).sum::<f64>() / days;

    out.avg_daily_production = Some(production);
    out.avg_daily_consumption = Some(consumption);
    out.avg_daily_export = Some(production - consumption);
    out
}
