use std::{fmt, str::FromStr};

use time::{Date, Duration, OffsetDateTime};

use crate::zone::LocalZone;

use super::QueryError;

/// Lookback window of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    /// Last `n` hours, 1..=24.
    Hours(u32),
    /// Last `n` days, 1..=365.
    Days(u32),
    /// Last `n` weeks, 1..=52.
    Weeks(u32),
    /// Last 365 days.
    Year,
    Today,
    ThisWeek,
    ThisMonth,
    ThisYear,
}

/// Closed time range `[start, end]` in the caller's local offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

impl Window {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

impl Period {
    /// Resolves the window ending at `now`. Calendar periods start at the
    /// local midnight in effect on their first day.
    pub fn window(self, now: OffsetDateTime, zone: LocalZone) -> Window {
        let now = zone.to_local(now);
        let local_midnight = |date: Date| zone.resolve(date.midnight());
        let start = match self {
            Self::Hours(n) => now - Duration::hours(i64::from(n)),
            Self::Days(n) => now - Duration::days(i64::from(n)),
            Self::Weeks(n) => now - Duration::weeks(i64::from(n)),
            Self::Year => now - Duration::days(365),
            Self::Today => local_midnight(now.date()),
            Self::ThisWeek => {
                let back = i64::from(now.weekday().number_days_from_monday());
                local_midnight(now.date() - Duration::days(back))
            }
            Self::ThisMonth => {
                let first = Date::from_calendar_date(now.year(), now.month(), 1).unwrap_or(now.date());
                local_midnight(first)
            }
            Self::ThisYear => {
                let first = Date::from_ordinal_date(now.year(), 1).unwrap_or(now.date());
                local_midnight(first)
            }
        };
        Window { start, end: now }
    }

    /// Whether the period covers at least one calendar day by definition.
    /// Daily averages are only meaningful for such periods.
    pub fn spans_full_day(self) -> bool {
        !matches!(self, Self::Hours(n) if n < 24)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hours(n) => write!(f, "{n}h"),
            Self::Days(n) => write!(f, "{n}d"),
            Self::Weeks(n) => write!(f, "{n}w"),
            Self::Year => f.write_str("1y"),
            Self::Today => f.write_str("today"),
            Self::ThisWeek => f.write_str("thisweek"),
            Self::ThisMonth => f.write_str("thismonth"),
            Self::ThisYear => f.write_str("thisyear"),
        }
    }
}

impl FromStr for Period {
    type Err = QueryError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || QueryError::InvalidPeriod(raw.to_string());
        let s = raw.trim().to_ascii_lowercase();

        match s.as_str() {
            "today" => return Ok(Self::Today),
            "thisweek" | "this_week" => return Ok(Self::ThisWeek),
            "thismonth" | "this_month" => return Ok(Self::ThisMonth),
            "thisyear" | "this_year" => return Ok(Self::ThisYear),
            "1y" => return Ok(Self::Year),
            _ => {}
        }

        let unit = s.chars().last().ok_or_else(invalid)?;
        let count: u32 = s[..s.len() - unit.len_utf8()].parse().map_err(|_| invalid())?;

        match (unit, count) {
            ('h', 1..=24) => Ok(Self::Hours(count)),
            ('d', 1..=365) => Ok(Self::Days(count)),
            ('w', 1..=52) => Ok(Self::Weeks(count)),
            _ => Err(invalid()),
        }
    }
}
