use crate::infrastructure::error::InfraError;
use chrono::Duration;

/// Calendar-unit components of an availability-window interval before the
/// lead-time approximation is applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct IntervalParts {
    years: i64,
    months: i64,
    days: i64,
    hours: i64,
    minutes: i64,
    seconds: i64,
    milliseconds: i64,
}

impl IntervalParts {
    /// Collapse components into a single lead-time magnitude.
    /// Approximation, kept bit-for-bit with the stored data's producer:
    /// 1 year = 365 days, 1 month = 30 days, weeks are already days,
    /// everything else exact.
    fn lead_time(self) -> Duration {
        let total_days = self.years * 365 + self.months * 30 + self.days;
        let total_ms = ((total_days * 24 + self.hours) * 3_600 + self.minutes * 60 + self.seconds)
            * 1_000
            + self.milliseconds;
        Duration::milliseconds(total_ms)
    }
}

/// Parse an availability-window interval into a lead time.
///
/// Accepts ISO-8601 durations (`P2DT4H`) and PostgreSQL verbose interval
/// text (`2 days 4 hours`, `1 year 2 mons 03:04:05`). Absent or blank input
/// means "no availability window" and yields `Ok(None)`.
pub fn parse_interval(interval: Option<&str>) -> Result<Option<Duration>, InfraError> {
    let Some(raw) = interval.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };

    let parts = if raw.starts_with('P') || raw.starts_with('p') {
        parse_iso_parts(raw)?
    } else {
        parse_postgres_parts(raw)?
    };

    Ok(Some(parts.lead_time()))
}

fn malformed(raw: &str, detail: &str) -> InfraError {
    InfraError::MalformedInterval(format!("'{raw}': {detail}"))
}

fn parse_iso_parts(raw: &str) -> Result<IntervalParts, InfraError> {
    match iso8601::duration(raw).map_err(|error| malformed(raw, &error))? {
        iso8601::Duration::YMDHMS {
            year,
            month,
            day,
            hour,
            minute,
            second,
            millisecond,
        } => Ok(IntervalParts {
            years: i64::from(year),
            months: i64::from(month),
            days: i64::from(day),
            hours: i64::from(hour),
            minutes: i64::from(minute),
            seconds: i64::from(second),
            milliseconds: i64::from(millisecond),
        }),
        iso8601::Duration::Weeks(weeks) => Ok(IntervalParts {
            days: i64::from(weeks) * 7,
            ..IntervalParts::default()
        }),
    }
}

fn parse_postgres_parts(raw: &str) -> Result<IntervalParts, InfraError> {
    let mut parts = IntervalParts::default();
    let mut tokens = raw.split_whitespace();

    while let Some(token) = tokens.next() {
        if token.contains(':') {
            parse_clock(raw, token, &mut parts)?;
            continue;
        }

        let quantity = token
            .parse::<i64>()
            .map_err(|_| malformed(raw, &format!("unexpected token '{token}'")))?;
        if quantity < 0 {
            return Err(malformed(raw, "negative components are not supported"));
        }
        let Some(unit) = tokens.next() else {
            return Err(malformed(raw, &format!("missing unit after '{token}'")));
        };
        apply_unit(raw, quantity, unit, &mut parts)?;
    }

    Ok(parts)
}

fn apply_unit(
    raw: &str,
    quantity: i64,
    unit: &str,
    parts: &mut IntervalParts,
) -> Result<(), InfraError> {
    match unit.to_ascii_lowercase().as_str() {
        "year" | "years" | "yr" | "yrs" => parts.years += quantity,
        "mon" | "mons" | "month" | "months" => parts.months += quantity,
        "week" | "weeks" => parts.days += quantity * 7,
        "day" | "days" => parts.days += quantity,
        "hour" | "hours" | "hr" | "hrs" => parts.hours += quantity,
        "min" | "mins" | "minute" | "minutes" => parts.minutes += quantity,
        "sec" | "secs" | "second" | "seconds" => parts.seconds += quantity,
        "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => parts.milliseconds += quantity,
        other => return Err(malformed(raw, &format!("unknown unit '{other}'"))),
    }
    Ok(())
}

/// Parse the trailing `HH:MM:SS[.fff]` clock part of PostgreSQL's output
/// format (`MM:SS` is not a valid PostgreSQL spelling, so two fields are
/// read as `HH:MM`).
fn parse_clock(raw: &str, token: &str, parts: &mut IntervalParts) -> Result<(), InfraError> {
    if token.starts_with('-') {
        return Err(malformed(raw, "negative components are not supported"));
    }

    let fields: Vec<&str> = token.split(':').collect();
    if fields.len() != 2 && fields.len() != 3 {
        return Err(malformed(raw, &format!("invalid clock part '{token}'")));
    }

    parts.hours += parse_clock_field(raw, fields[0])?;
    parts.minutes += parse_clock_field(raw, fields[1])?;
    if let Some(seconds_field) = fields.get(2) {
        let (whole, fraction) = match seconds_field.split_once('.') {
            Some((whole, fraction)) => (whole, Some(fraction)),
            None => (*seconds_field, None),
        };
        parts.seconds += parse_clock_field(raw, whole)?;
        if let Some(fraction) = fraction {
            let padded = format!("{fraction:0<3}");
            let millis = padded
                .get(..3)
                .and_then(|digits| digits.parse::<i64>().ok())
                .ok_or_else(|| malformed(raw, &format!("invalid clock part '{token}'")))?;
            parts.milliseconds += millis;
        }
    }

    Ok(())
}

fn parse_clock_field(raw: &str, field: &str) -> Result<i64, InfraError> {
    if field.is_empty() || !field.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(malformed(raw, &format!("invalid clock field '{field}'")));
    }
    field
        .parse::<i64>()
        .map_err(|_| malformed(raw, &format!("invalid clock field '{field}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lead_time_ms(input: &str) -> i64 {
        parse_interval(Some(input))
            .expect("interval parses")
            .expect("interval present")
            .num_milliseconds()
    }

    #[test]
    fn absent_and_blank_input_mean_no_window() {
        assert_eq!(parse_interval(None).expect("parses"), None);
        assert_eq!(parse_interval(Some("")).expect("parses"), None);
        assert_eq!(parse_interval(Some("   ")).expect("parses"), None);
    }

    #[test]
    fn parses_iso_durations() {
        assert_eq!(lead_time_ms("P2D"), 2 * 24 * 3_600 * 1_000);
        assert_eq!(lead_time_ms("P2DT4H"), (2 * 24 + 4) * 3_600 * 1_000);
        assert_eq!(lead_time_ms("PT90S"), 90 * 1_000);
        assert_eq!(lead_time_ms("P2W"), 14 * 24 * 3_600 * 1_000);
    }

    #[test]
    fn parses_postgres_verbose_intervals() {
        assert_eq!(lead_time_ms("2 days 4 hours"), (2 * 24 + 4) * 3_600 * 1_000);
        assert_eq!(lead_time_ms("1 day"), 24 * 3_600 * 1_000);
        assert_eq!(lead_time_ms("45 mins"), 45 * 60 * 1_000);
        assert_eq!(lead_time_ms("2 days 04:30:00"), (2 * 24 + 4) * 3_600 * 1_000 + 30 * 60 * 1_000);
        assert_eq!(lead_time_ms("00:00:01.5"), 1_500);
    }

    #[test]
    fn applies_year_and_month_approximation() {
        assert_eq!(lead_time_ms("1 year"), 365 * 24 * 3_600 * 1_000);
        assert_eq!(lead_time_ms("1 mon"), 30 * 24 * 3_600 * 1_000);
        assert_eq!(
            lead_time_ms("P1Y2M"),
            (365 + 2 * 30) * 24 * 3_600 * 1_000
        );
    }

    #[test]
    fn rejects_garbage_and_negative_input() {
        assert!(parse_interval(Some("soon")).is_err());
        assert!(parse_interval(Some("2")).is_err());
        assert!(parse_interval(Some("2 fortnights")).is_err());
        assert!(parse_interval(Some("-2 days")).is_err());
        assert!(parse_interval(Some("1 day -04:00:00")).is_err());
    }

    proptest! {
        #[test]
        fn verbose_days_hours_compose_exactly(days in 0i64..2_000, hours in 0i64..48) {
            let input = format!("{days} days {hours} hours");
            prop_assert_eq!(
                lead_time_ms(&input),
                (days * 24 + hours) * 3_600 * 1_000
            );
        }

        #[test]
        fn iso_and_verbose_spellings_agree(days in 0u32..2_000, hours in 0u32..24) {
            let iso = format!("P{days}DT{hours}H");
            let verbose = format!("{days} days {hours} hours");
            prop_assert_eq!(lead_time_ms(&iso), lead_time_ms(&verbose));
        }
    }
}
