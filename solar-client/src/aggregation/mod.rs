//! Time-bucketed history and summary statistics over stored readings.

pub mod bucket;
pub mod engine;
pub mod granularity;
pub mod period;
pub mod stats;

pub use bucket::AggregateBucket;
pub use engine::{QueryEngine, QueryResult};
pub use granularity::Granularity;
pub use period::{Period, Window};
pub use stats::{Peak, PeaksAndAverages, Totals};

use crate::db::StoreError;

#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    #[error("invalid period '{0}': expected 1h-24h, 1d-365d, 1w-52w, 1y, today, thisweek, thismonth or thisyear")]
    InvalidPeriod(String),
    #[error("invalid granularity '{0}': expected minute, 15min, hour, day, week, month or year")]
    InvalidGranularity(String),
    #[error("granularity '{granularity}' over period '{period}' needs {buckets} buckets, limit is {limit}")]
    InvalidCombination {
        period: Period,
        granularity: Granularity,
        buckets: i64,
        limit: i64,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl QueryError {
    /// Errors the caller caused and should report back rather than retry.
    pub fn is_invalid_parameters(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}
