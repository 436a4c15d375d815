use crate::domain::local_time::project_local;
use crate::infrastructure::error::InfraError;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use rrule::RRuleSet;

/// Hard cap on occurrences produced for a single definition within one
/// generation range. A six-month window of any sane rule sits far below
/// this; hitting the cap means the rule is unusable for windowed expansion.
const EXPANSION_LIMIT: u16 = 10_000;

/// Expand a recurrence rule into absolute instants within
/// `(range_start, range_end]`.
///
/// The rule is evaluated in `tz` with DTSTART set to the anchor's wall-clock
/// time there, so "every day at 9am" stays 9am local across DST transitions
/// while the returned UTC instants shift by the offset change. Local times
/// that fall into a spring-forward gap resolve to the next valid instant and
/// fall-back duplicates resolve to the first offset (the rrule library's
/// disambiguation, pinned by tests here).
///
/// The result is ascending and free of duplicates. A stored rule may carry
/// its `RRULE:` property prefix; both spellings are accepted.
pub fn expand_rule(
    rule: &str,
    anchor: DateTime<Utc>,
    tz: Tz,
    range_start: DateTime<Utc>,
    range_end: DateTime<Utc>,
) -> Result<Vec<DateTime<Utc>>, InfraError> {
    if range_end <= range_start {
        return Ok(Vec::new());
    }

    let body = rule.trim();
    let body = body.strip_prefix("RRULE:").unwrap_or(body);
    let local_anchor = project_local(anchor, tz);
    let source = format!(
        "DTSTART;TZID={}:{}\nRRULE:{}",
        tz.name(),
        local_anchor.format("%Y%m%dT%H%M%S"),
        body
    );

    let rule_set: RRuleSet = source
        .parse()
        .map_err(|error| InfraError::InvalidRecurrenceRule(format!("'{body}': {error}")))?;

    // One second of slack on each end; the real bounds are the explicit
    // comparisons below, strictly after the start and inclusive of the end,
    // independent of the expansion primitive's own endpoint convention.
    let after = (range_start - Duration::seconds(1)).with_timezone(&rrule::Tz::UTC);
    let before = (range_end + Duration::seconds(1)).with_timezone(&rrule::Tz::UTC);
    let result = rule_set.after(after).before(before).all(EXPANSION_LIMIT);
    if result.limited {
        return Err(InfraError::InvalidRecurrenceRule(format!(
            "'{body}': more than {EXPANSION_LIMIT} occurrences in the generation range"
        )));
    }

    let mut instants: Vec<DateTime<Utc>> = result
        .dates
        .into_iter()
        .map(|date| date.with_timezone(&Utc))
        .filter(|instant| *instant > range_start && *instant <= range_end)
        .collect();
    instants.sort_unstable();
    instants.dedup();
    Ok(instants)
}
