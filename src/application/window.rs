use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

/// Generation range for one synchronizer run.
///
/// `floor` is exclusive and `end` inclusive: an instant belongs to the range
/// when `floor < instant <= end`. The periodic sweep floors the range one day
/// before the window's far edge, deliberately overlapping the previous run;
/// the overlap is harmless because occurrence inserts are duplicate-safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationWindow {
    pub floor: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl GenerationWindow {
    /// Window for the periodic sweep. `now` is normalized to UTC midnight so
    /// repeated runs within one day compute the same boundaries.
    pub fn sweep(now: DateTime<Utc>) -> Self {
        let today = midnight_utc(now);
        let end = shift_months(today, 6);
        Self {
            floor: end - Duration::days(1),
            end,
        }
    }

    /// Window for a single definition's re-synchronization after an insert
    /// or update. Regeneration restarts at the modification instant; the far
    /// edge is six months out, normalized to midnight.
    pub fn resync(last_modified: DateTime<Utc>) -> Self {
        Self {
            floor: last_modified,
            end: midnight_utc(shift_months(last_modified, 6)),
        }
    }

    pub fn includes_anchor(&self, anchor: DateTime<Utc>) -> bool {
        anchor > self.floor && anchor <= self.end
    }

    pub fn effective_start(&self, anchor: DateTime<Utc>) -> DateTime<Utc> {
        self.floor.max(anchor)
    }
}

/// Everything due before this instant is stale and gets purged by the sweep.
pub fn purge_threshold(now: DateTime<Utc>) -> DateTime<Utc> {
    shift_months(midnight_utc(now), -6)
}

pub fn midnight_utc(instant: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&instant.date_naive().and_time(NaiveTime::MIN))
}

/// Shift an instant by whole calendar months, keeping the day-of-month and
/// rolling any overflow into the following month (Jan 31 + 1 month is Mar 3
/// in a non-leap year, Mar 2 in a leap year). This matches how the stored
/// windows were computed historically, so boundary instants line up with
/// rows already in the database.
pub fn shift_months(instant: DateTime<Utc>, months: i32) -> DateTime<Utc> {
    let date = instant.date_naive();
    let total = date.year() * 12 + date.month0() as i32 + months;
    let year = total.div_euclid(12);
    let month = total.rem_euclid(12) as u32 + 1;
    let day = date.day();

    let last_day = days_in_month(year, month);
    let shifted = if day <= last_day {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid shifted date")
    } else {
        NaiveDate::from_ymd_opt(year, month, last_day).expect("valid shifted date")
            + Duration::days(i64::from(day - last_day))
    };

    Utc.from_utc_datetime(&shifted.and_time(instant.time()))
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .map(|last_of_month| last_of_month.day())
        .expect("valid month boundary")
}
