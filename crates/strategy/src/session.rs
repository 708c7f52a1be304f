use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;

/// Trading hours of a day, in an exchange-local time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionWindow {
    timezone: Tz,
    open: NaiveTime,
    close: NaiveTime,
}

impl SessionWindow {
    pub fn new(timezone: Tz, open: NaiveTime, close: NaiveTime) -> Self {
        Self {
            timezone,
            open,
            close,
        }
    }

    /// A window spanning the whole UTC day.
    pub fn all_day() -> Self {
        let last = NaiveTime::from_hms_nano_opt(23, 59, 59, 1_999_999_999).unwrap_or_default();
        Self::new(chrono_tz::UTC, NaiveTime::default(), last)
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// True when `at` falls in `[open, close)` on its local day.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let local = at.with_timezone(&self.timezone).time();
        local >= self.open && local < self.close
    }
}

impl Default for SessionWindow {
    /// US regular trading hours, expressed in Pacific time.
    fn default() -> Self {
        Self::new(
            chrono_tz::America::Los_Angeles,
            NaiveTime::from_hms_opt(6, 30, 0).unwrap_or_default(),
            NaiveTime::from_hms_opt(13, 0, 0).unwrap_or_default(),
        )
    }
}
