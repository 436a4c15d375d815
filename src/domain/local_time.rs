use crate::infrastructure::error::InfraError;
use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use chrono_tz::Tz;

/// Resolve an IANA timezone identifier.
pub fn resolve_timezone(timezone_id: &str) -> Result<Tz, InfraError> {
    let trimmed = timezone_id.trim();
    if trimmed.is_empty() {
        return Err(InfraError::UnknownTimezone(
            "timezone_id must not be empty".to_string(),
        ));
    }
    trimmed
        .parse::<Tz>()
        .map_err(|_| InfraError::UnknownTimezone(trimmed.to_string()))
}

/// Project an absolute instant into its wall-clock form in `tz`, truncated
/// to whole seconds.
///
/// Recurrence rules are anchored in local civil time ("every day at 9am"
/// stays 9am across a DST change), so expansion works against this naive
/// local value rather than the UTC instant. Projection in this direction is
/// total; resolving generated local times back to instants happens inside
/// the rrule library, which skips forward over spring-forward gaps and takes
/// the first offset of fall-back overlaps.
pub fn project_local(instant: DateTime<Utc>, tz: Tz) -> NaiveDateTime {
    let local = instant.with_timezone(&tz).naive_local();
    local.with_nanosecond(0).unwrap_or(local)
}
