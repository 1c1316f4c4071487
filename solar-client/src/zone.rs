//! Local civil time for the installation site.
//!
//! Hour-of-day and calendar buckets depend on the site's wall clock, which
//! shifts across daylight-saving transitions. A named IANA zone resolves the
//! offset per instant; a fixed offset never changes.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Offset, TimeZone};
use chrono_tz::Tz;
use time::{macros::format_description, Duration, OffsetDateTime, PrimitiveDateTime, UtcOffset};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalZone {
    Fixed(UtcOffset),
    Named(Tz),
}

impl LocalZone {
    pub const UTC: Self = Self::Fixed(UtcOffset::UTC);

    /// UTC offset in effect at instant `t`.
    pub fn offset_at(&self, t: OffsetDateTime) -> UtcOffset {
        match self {
            Self::Fixed(offset) => *offset,
            Self::Named(tz) => {
                let secs = DateTime::from_timestamp(t.unix_timestamp(), 0)
                    .map(|utc| tz.offset_from_utc_datetime(&utc.naive_utc()).fix().local_minus_utc())
                    .unwrap_or(0);
                UtcOffset::from_whole_seconds(secs).unwrap_or(UtcOffset::UTC)
            }
        }
    }

    /// `t` expressed in the site's wall-clock time.
    pub fn to_local(&self, t: OffsetDateTime) -> OffsetDateTime {
        t.to_offset(self.offset_at(t))
    }

    /// The instant a wall-clock time names. Repeated times (clocks set back)
    /// resolve to the earlier instant; skipped times (clocks set forward)
    /// resolve to the instant just past the gap.
    pub fn resolve(&self, local: PrimitiveDateTime) -> OffsetDateTime {
        let Self::Named(_) = self else {
            return local.assume_offset(self.offset_at(local.assume_utc()));
        };

        // Transitions are months apart, so the offsets a day either side
        // cover both candidates.
        let guess = local.assume_utc();
        let before = self.offset_at(guess - Duration::days(1));
        let after = self.offset_at(guess + Duration::days(1));

        let valid = |offset: UtcOffset| {
            let candidate = local.assume_offset(offset);
            (self.offset_at(candidate) == offset).then_some(candidate)
        };

        match (valid(before), valid(after)) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => self.to_local(local.assume_offset(before)),
        }
    }
}

impl Default for LocalZone {
    fn default() -> Self {
        Self::UTC
    }
}

impl fmt::Display for LocalZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(tz) => f.write_str(tz.name()),
            Self::Fixed(offset) => {
                let secs = offset.whole_seconds();
                let sign = if secs < 0 { '-' } else { '+' };
                let secs = secs.unsigned_abs();
                write!(f, "{sign}{:02}:{:02}", secs / 3600, secs % 3600 / 60)
            }
        }
    }
}

/// Accepts an IANA name ("America/Denver"), "UTC"/"Z", or a fixed offset
/// ("-07:00").
impl FromStr for LocalZone {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
            return Ok(Self::UTC);
        }
        if raw.starts_with(['+', '-']) {
            let format = format_description!("[offset_hour sign:mandatory]:[offset_minute]");
            return UtcOffset::parse(raw, &format)
                .map(Self::Fixed)
                .map_err(|e| format!("invalid UTC offset '{raw}': {e}"));
        }
        raw.parse::<Tz>()
            .map(Self::Named)
            .map_err(|e| format!("unknown time zone '{raw}': {e}"))
    }
}
