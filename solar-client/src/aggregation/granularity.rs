use std::{fmt, str::FromStr};

use time::{macros::format_description, Date, Duration, Month, OffsetDateTime, PrimitiveDateTime, Time};

use super::QueryError;
use crate::zone::LocalZone;

/// Width of one series bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Minute,
    FifteenMinutes,
    Hour,
    Day,
    /// Monday-based calendar weeks.
    Week,
    Month,
    Year,
}

impl Granularity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::FifteenMinutes => "15min",
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    /// Approximate width, used only to bound series size.
    pub fn nominal_width(self) -> Duration {
        match self {
            Self::Minute => Duration::minutes(1),
            Self::FifteenMinutes => Duration::minutes(15),
            Self::Hour => Duration::hours(1),
            Self::Day => Duration::days(1),
            Self::Week => Duration::weeks(1),
            Self::Month => Duration::days(30),
            Self::Year => Duration::days(365),
        }
    }

    /// Start of the bucket holding `t`, in `t`'s own offset.
    pub fn truncate(self, t: OffsetDateTime) -> OffsetDateTime {
        let date = t.date();
        let at = |d: Date, hour: u8, minute: u8| {
            let time = Time::from_hms(hour, minute, 0).unwrap_or(Time::MIDNIGHT);
            PrimitiveDateTime::new(d, time).assume_offset(t.offset())
        };

        match self {
            Self::Minute => at(date, t.hour(), t.minute()),
            Self::FifteenMinutes => at(date, t.hour(), t.minute() - t.minute() % 15),
            Self::Hour => at(date, t.hour(), 0),
            Self::Day => at(date, 0, 0),
            Self::Week => {
                let back = i64::from(date.weekday().number_days_from_monday());
                at(date - Duration::days(back), 0, 0)
            }
            Self::Month => at(first_of_month(date.year(), date.month()).unwrap_or(date), 0, 0),
            Self::Year => at(first_of_month(date.year(), Month::January).unwrap_or(date), 0, 0),
        }
    }

    /// Start of the bucket following the one starting at `start`.
    pub fn next(self, start: OffsetDateTime) -> OffsetDateTime {
        match self {
            Self::Minute | Self::FifteenMinutes | Self::Hour | Self::Day | Self::Week => {
                start + self.nominal_width()
            }
            Self::Month => {
                let (year, month) = match start.month() {
                    Month::December => (start.year() + 1, Month::January),
                    m => (start.year(), m.next()),
                };
                self.reanchor(start, year, month)
            }
            Self::Year => self.reanchor(start, start.year() + 1, Month::January),
        }
    }

    /// Start of the bucket holding `t` on the site's wall clock. Calendar
    /// buckets start at the local midnight actually in effect that day.
    pub fn truncate_in(self, t: OffsetDateTime, zone: LocalZone) -> OffsetDateTime {
        let local = self.truncate(zone.to_local(t));
        match self {
            Self::Minute | Self::FifteenMinutes | Self::Hour => local,
            _ => zone.resolve(PrimitiveDateTime::new(local.date(), local.time())),
        }
    }

    /// Start of the bucket following `start` on the site's wall clock.
    /// Sub-day buckets keep a fixed width, so a repeated hour appears twice
    /// and a skipped hour not at all.
    pub fn next_in(self, start: OffsetDateTime, zone: LocalZone) -> OffsetDateTime {
        match self {
            Self::Minute | Self::FifteenMinutes | Self::Hour => zone.to_local(start + self.nominal_width()),
            _ => {
                let next = self.next(start);
                zone.resolve(PrimitiveDateTime::new(next.date(), next.time()))
            }
        }
    }

    fn reanchor(self, start: OffsetDateTime, year: i32, month: Month) -> OffsetDateTime {
        match first_of_month(year, month) {
            Ok(date) => date.midnight().assume_offset(start.offset()),
            // Out of the representable range; step by the nominal width instead.
            Err(_) => start + self.nominal_width(),
        }
    }

    /// Display label for a bucket starting at `start`. Sub-day buckets carry
    /// the date when the series spans a day or more.
    pub fn label(self, start: OffsetDateTime, multi_day: bool) -> String {
        let formatted = match self {
            Self::Minute | Self::FifteenMinutes | Self::Hour if multi_day => {
                let format = format_description!("[month]/[day] [hour]:[minute]");
                start.format(&format)
            }
            Self::Minute | Self::FifteenMinutes | Self::Hour => {
                let format = format_description!("[hour]:[minute]");
                start.format(&format)
            }
            Self::Day | Self::Week => {
                let format = format_description!("[month]/[day]");
                start.format(&format)
            }
            Self::Month => {
                let format = format_description!("[month repr:short] [year]");
                start.format(&format)
            }
            Self::Year => {
                let format = format_description!("[year]");
                start.format(&format)
            }
        };
        formatted.unwrap_or_else(|_| start.unix_timestamp().to_string())
    }
}

fn first_of_month(year: i32, month: Month) -> Result<Date, time::error::ComponentRange> {
    Date::from_calendar_date(year, month, 1)
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = QueryError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "minute" | "1min" => Ok(Self::Minute),
            "15min" | "15minute" | "15minutes" | "quarter" => Ok(Self::FifteenMinutes),
            "hour" => Ok(Self::Hour),
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            _ => Err(QueryError::InvalidGranularity(raw.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn truncates_to_bucket_boundaries() {
        let t = datetime!(2025-06-05 13:47:12 UTC); // a Thursday
        assert_eq!(Granularity::Minute.truncate(t), datetime!(2025-06-05 13:47 UTC));
        assert_eq!(Granularity::FifteenMinutes.truncate(t), datetime!(2025-06-05 13:45 UTC));
        assert_eq!(Granularity::Hour.truncate(t), datetime!(2025-06-05 13:00 UTC));
        assert_eq!(Granularity::Day.truncate(t), datetime!(2025-06-05 0:00 UTC));
        assert_eq!(Granularity::Week.truncate(t), datetime!(2025-06-02 0:00 UTC));
        assert_eq!(Granularity::Month.truncate(t), datetime!(2025-06-01 0:00 UTC));
        assert_eq!(Granularity::Year.truncate(t), datetime!(2025-01-01 0:00 UTC));
    }

    #[test]
    fn truncation_keeps_local_offset() {
        let t = datetime!(2025-06-05 01:30 -7);
        assert_eq!(Granularity::Day.truncate(t), datetime!(2025-06-05 0:00 -7));
    }

    #[test]
    fn calendar_steps_roll_over_years() {
        let dec = datetime!(2024-12-01 0:00 UTC);
        assert_eq!(Granularity::Month.next(dec), datetime!(2025-01-01 0:00 UTC));
        assert_eq!(Granularity::Year.next(dec), datetime!(2025-01-01 0:00 UTC));
        assert_eq!(
            Granularity::Week.next(datetime!(2025-06-02 0:00 UTC)),
            datetime!(2025-06-09 0:00 UTC)
        );
    }

    #[test]
    fn day_steps_follow_daylight_saving() {
        let zone: LocalZone = "America/Denver".parse().unwrap();
        let start = Granularity::Day.truncate_in(datetime!(2025-03-09 18:00 UTC), zone);
        assert_eq!(start, datetime!(2025-03-09 0:00 -7));
        assert_eq!(Granularity::Day.next_in(start, zone), datetime!(2025-03-10 0:00 -6));

        let start = datetime!(2025-11-02 0:00 -6);
        assert_eq!(Granularity::Day.next_in(start, zone), datetime!(2025-11-03 0:00 -7));
        // Late evening after the change back to MST is still the 2nd.
        assert_eq!(
            Granularity::Day.truncate_in(datetime!(2025-11-03 05:30 UTC), zone),
            datetime!(2025-11-02 0:00 -6)
        );
    }

    #[test]
    fn parses_aliases_and_rejects_unknown() {
        assert_eq!("HOUR".parse::<Granularity>().unwrap(), Granularity::Hour);
        assert_eq!("15minute".parse::<Granularity>().unwrap(), Granularity::FifteenMinutes);
        assert!(matches!(
            "fortnight".parse::<Granularity>(),
            Err(QueryError::InvalidGranularity(_))
        ));
    }

    #[test]
    fn labels_depend_on_span() {
        let t = datetime!(2025-06-05 13:45 UTC);
        assert_eq!(Granularity::Hour.label(t, false), "13:45");
        assert_eq!(Granularity::Hour.label(t, true), "06/05 13:45");
        assert_eq!(Granularity::Day.label(t, true), "06/05");
        assert_eq!(Granularity::Month.label(t, true), "Jun 2025");
        assert_eq!(Granularity::Year.label(t, true), "2025");
    }
}
