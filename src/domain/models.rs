use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An appointment definition as the scheduler sees it: one reference due
/// moment plus an optional recurrence rule and availability offset. The
/// definition itself is owned by the surrounding CRUD layer; the scheduler
/// only reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppointmentDefinition {
    pub id: String,
    /// First/reference due moment, absolute.
    pub anchor_due_at: DateTime<Utc>,
    /// Lead time before the due moment when the occurrence opens, as stored
    /// (interval text). Absent means the occurrence is open immediately.
    pub availability_window: Option<String>,
    /// RFC 5545 RRULE body, or absent for a one-time appointment.
    pub recurrence_rule: Option<String>,
    /// IANA zone the recurrence rule is evaluated in.
    pub timezone_id: String,
    pub last_modified_at: DateTime<Utc>,
}

impl AppointmentDefinition {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "appointment.id")?;
        validate_non_empty(&self.timezone_id, "appointment.timezone_id")?;
        if let Some(rule) = &self.recurrence_rule {
            validate_non_empty(rule, "appointment.recurrence_rule")?;
        }
        Ok(())
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence_rule.is_some()
    }
}

/// One materialized occurrence of an appointment definition. Uniqueness is
/// `(appointment_id, due_at)`; regeneration must never duplicate a pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Occurrence {
    pub appointment_id: String,
    pub due_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_at: Option<DateTime<Utc>>,
}

impl Occurrence {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.appointment_id, "occurrence.appointment_id")?;
        if let Some(open_at) = self.open_at {
            if open_at > self.due_at {
                return Err("occurrence.open_at must be <= occurrence.due_at".to_string());
            }
        }
        Ok(())
    }
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn sample_definition() -> AppointmentDefinition {
        AppointmentDefinition {
            id: "appt-1".to_string(),
            anchor_due_at: fixed_time("2024-06-10T09:00:00Z"),
            availability_window: Some("P2D".to_string()),
            recurrence_rule: Some("FREQ=DAILY".to_string()),
            timezone_id: "America/New_York".to_string(),
            last_modified_at: fixed_time("2024-06-01T00:00:00Z"),
        }
    }

    fn sample_occurrence() -> Occurrence {
        Occurrence {
            appointment_id: "appt-1".to_string(),
            due_at: fixed_time("2024-06-10T09:00:00Z"),
            open_at: Some(fixed_time("2024-06-08T09:00:00Z")),
        }
    }

    #[test]
    fn definition_validate_accepts_valid_definition() {
        assert!(sample_definition().validate().is_ok());
    }

    #[test]
    fn definition_validate_rejects_blank_id() {
        let mut definition = sample_definition();
        definition.id = "   ".to_string();
        assert!(definition.validate().is_err());
    }

    #[test]
    fn definition_validate_rejects_blank_rule() {
        let mut definition = sample_definition();
        definition.recurrence_rule = Some(String::new());
        assert!(definition.validate().is_err());
    }

    #[test]
    fn occurrence_validate_rejects_open_after_due() {
        let mut occurrence = sample_occurrence();
        occurrence.open_at = Some(occurrence.due_at + Duration::seconds(1));
        assert!(occurrence.validate().is_err());
    }

    #[test]
    fn occurrence_without_open_is_valid() {
        let mut occurrence = sample_occurrence();
        occurrence.open_at = None;
        assert!(occurrence.validate().is_ok());
    }

    #[test]
    fn occurrence_supports_serde_roundtrip() {
        let occurrence = sample_occurrence();
        let roundtrip: Occurrence = serde_json::from_str(
            &serde_json::to_string(&occurrence).expect("serialize occurrence"),
        )
        .expect("deserialize occurrence");
        assert_eq!(roundtrip, occurrence);
    }
}
