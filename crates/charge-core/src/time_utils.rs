use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone as _, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use tracing::warn;

// ── System timezone detection ─────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

/// Resolve a user-supplied zone name, mapping `"auto"` (any case) to the
/// system zone.
pub fn resolve_timezone(name: &str) -> String {
    if name.trim().eq_ignore_ascii_case("auto") {
        get_system_timezone()
    } else {
        name.trim().to_string()
    }
}

// ── TimezoneHandler ───────────────────────────────────────────────────────────

/// Interprets wall-clock times in one analysis zone and projects instants
/// back onto that zone's calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimezoneHandler {
    tz: Tz,
}

impl Default for TimezoneHandler {
    fn default() -> Self {
        Self { tz: Tz::UTC }
    }
}

impl TimezoneHandler {
    /// Create a handler for `tz_name`.
    ///
    /// Unknown names fall back to UTC with a warning.
    pub fn new(tz_name: &str) -> Self {
        let tz = tz_name.parse::<Tz>().unwrap_or_else(|_| {
            warn!(
                "TimezoneHandler: unrecognised timezone \"{}\", falling back to UTC",
                tz_name
            );
            Tz::UTC
        });
        Self { tz }
    }

    /// Validate that `tz_name` is a recognised IANA timezone identifier.
    pub fn validate_timezone(tz_name: &str) -> bool {
        tz_name.parse::<Tz>().is_ok()
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// Attach the analysis zone to a naive wall-clock time.
    ///
    /// Ambiguous times (DST fall-back) take the earlier instant; times that
    /// fall into a DST gap yield `None`.
    pub fn localize(&self, naive: &NaiveDateTime) -> Option<DateTime<Utc>> {
        self.tz
            .from_local_datetime(naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn to_local(&self, dt: &DateTime<Utc>) -> DateTime<Tz> {
        dt.with_timezone(&self.tz)
    }

    /// Hour of day (0–23) of `dt` in the analysis zone.
    pub fn local_hour(&self, dt: &DateTime<Utc>) -> u32 {
        self.to_local(dt).hour()
    }

    /// Calendar date of `dt` in the analysis zone.
    pub fn local_date(&self, dt: &DateTime<Utc>) -> NaiveDate {
        self.to_local(dt).date_naive()
    }

    pub fn is_weekend(&self, dt: &DateTime<Utc>) -> bool {
        matches!(self.to_local(dt).weekday(), Weekday::Sat | Weekday::Sun)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
