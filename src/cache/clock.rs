//! Refresh Clock Module
//!
//! Computes when cached data goes stale: the next occurrence of a daily
//! wall-clock time in a named zone.

use std::time::Duration;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{CacheError, Result};

/// Longest DST gap searched when the boundary falls inside one.
const MAX_GAP_MINUTES: i64 = 180;

// == Refresh Clock ==
/// Daily refresh boundary, e.g. 03:00 US/Eastern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshClock {
    time: NaiveTime,
    zone: Tz,
}

impl RefreshClock {
    pub fn new(time: NaiveTime, zone: Tz) -> Self {
        Self { time, zone }
    }

    // == Parse ==
    /// Builds a clock from `HH:MM` and an IANA zone name.
    pub fn parse(refresh_time: &str, zone: &str) -> Result<Self> {
        let time = NaiveTime::parse_from_str(refresh_time.trim(), "%H:%M").map_err(|_| {
            CacheError::Config(format!(
                "refresh_time must be in HH:MM format, got {refresh_time:?}"
            ))
        })?;
        let zone: Tz = zone
            .trim()
            .parse()
            .map_err(|_| CacheError::Config(format!("unknown time zone {zone:?}")))?;
        Ok(Self::new(time, zone))
    }

    pub fn time(&self) -> NaiveTime {
        self.time
    }

    pub fn zone(&self) -> Tz {
        self.zone
    }

    // == Next Boundary ==
    /// Returns the first boundary instant strictly after `now`.
    ///
    /// A `now` exactly on the boundary rolls to the next day. A boundary that
    /// falls in a DST gap resolves to the first valid local instant after the
    /// gap; one that falls in an overlap resolves to the earlier instant.
    pub fn next_boundary(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.with_timezone(&self.zone).date_naive();

        (0..3)
            .filter_map(|offset| today.checked_add_days(Days::new(offset)))
            .filter_map(|date| self.boundary_on(date))
            .find(|candidate| *candidate > now)
            .unwrap_or_else(|| now + TimeDelta::days(1))
    }

    // == Expiration ==
    /// Expiration for an entry created at `created_at`.
    ///
    /// An override bypasses the boundary entirely. The result is always
    /// strictly later than `created_at`.
    pub fn expiration(&self, created_at: DateTime<Utc>, ttl: Option<Duration>) -> DateTime<Utc> {
        match ttl {
            None => self.next_boundary(created_at),
            Some(ttl) => {
                let delta = TimeDelta::from_std(ttl)
                    .unwrap_or(TimeDelta::MAX)
                    .max(TimeDelta::milliseconds(1));
                created_at
                    .checked_add_signed(delta)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC)
            }
        }
    }

    fn boundary_on(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        let local = date.and_time(self.time);

        (0..=MAX_GAP_MINUTES)
            .filter_map(|minutes| local.checked_add_signed(TimeDelta::minutes(minutes)))
            .find_map(|candidate| self.zone.from_local_datetime(&candidate).earliest())
            .map(|instant| instant.with_timezone(&Utc))
    }
}
