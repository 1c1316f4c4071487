use time::OffsetDateTime;

use super::{granularity::Granularity, period::Window};
use crate::{domain::Reading, zone::LocalZone};

/// Averaged telemetry for one series slot. Computed per query, never stored.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AggregateBucket {
    pub bucket_label: String,
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub bucket_start: OffsetDateTime,
    pub avg_production_kw: f64,
    pub avg_consumption_kw: f64,
    pub avg_net_export_kw: f64,
    pub sample_count: usize,
}

/// Start of every bucket between the truncated window start and the bucket
/// holding the window end, on the site's wall clock.
pub fn bucket_starts(window: &Window, granularity: Granularity, zone: LocalZone) -> Vec<OffsetDateTime> {
    let mut starts = Vec::new();
    let mut cursor = granularity.truncate_in(window.start, zone);
    while cursor <= window.end {
        starts.push(cursor);
        cursor = granularity.next_in(cursor, zone);
    }
    starts
}

#[derive(Default, Clone, Copy)]
struct Acc {
    production: f64,
    consumption: f64,
    net: f64,
    count: usize,
}

/// Groups `readings` into a dense series over `window`. Each reading is
/// truncated on `zone`'s wall clock at its own instant, so calendar buckets
/// follow local time across daylight-saving changes. Empty buckets carry
/// zero averages and a zero `sample_count`.
pub fn bucketize(
    readings: &[Reading],
    window: &Window,
    granularity: Granularity,
    zone: LocalZone,
    multi_day_labels: bool,
) -> Vec<AggregateBucket> {
    let starts = bucket_starts(window, granularity, zone);
    let mut accs = vec![Acc::default(); starts.len()];

    for r in readings {
        let key = granularity.truncate_in(r.ts, zone);
        if let Ok(idx) = starts.binary_search(&key) {
            let acc = &mut accs[idx];
            acc.production += r.production_kw;
            acc.consumption += r.consumption_kw;
            acc.net += r.net_export_kw;
            acc.count += 1;
        }
    }

    starts
        .into_iter()
        .zip(accs)
        .map(|(start, acc)| {
            let avg = |sum: f64| if acc.count == 0 { 0.0 } else { sum / acc.count as f64 };
            AggregateBucket {
                bucket_label: granularity.label(start, multi_day_labels),
                bucket_start: start,
                avg_production_kw: avg(acc.production),
                avg_consumption_kw: avg(acc.consumption),
                avg_net_export_kw: avg(acc.net),
                sample_count: acc.count,
            }
        })
        .collect()
}
