use crate::domain::models::AppointmentDefinition;
use crate::infrastructure::error::InfraError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Entity name change events must carry to be processed.
pub const APPOINTMENTS_TABLE: &str = "appointments";

/// An appointment row as it sits in the store or arrives in a change event:
/// timestamps still text, nothing validated yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppointmentRow {
    pub id: String,
    pub anchor_due_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_window: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rrule: Option<String>,
    pub timezone_id: String,
    pub last_modified_at: String,
}

/// Change notification payload, mirroring the CRUD layer's webhook shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEventPayload {
    /// Operation name, e.g. "INSERT" or "UPDATE" (case-insensitive).
    #[serde(rename = "type")]
    pub event_type: String,
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<AppointmentRow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
}

impl ChangeEventPayload {
    /// The change kind to process, or `None` when the event targets another
    /// entity or another operation and must be skipped without error.
    pub fn change_kind(&self) -> Option<ChangeKind> {
        if self.table.trim() != APPOINTMENTS_TABLE {
            return None;
        }
        match self.event_type.trim().to_ascii_uppercase().as_str() {
            "INSERT" => Some(ChangeKind::Insert),
            "UPDATE" => Some(ChangeKind::Update),
            _ => None,
        }
    }
}

/// Decode a raw row into a validated definition. Field-level failures keep
/// enough context to tell which appointment and which field went wrong.
pub fn decode_appointment(row: &AppointmentRow) -> Result<AppointmentDefinition, InfraError> {
    let definition = AppointmentDefinition {
        id: row.id.trim().to_string(),
        anchor_due_at: parse_instant(&row.anchor_due_at, "anchor_due_at")?,
        availability_window: normalized_optional(row.availability_window.as_deref()),
        recurrence_rule: normalized_optional(row.rrule.as_deref()),
        timezone_id: row.timezone_id.trim().to_string(),
        last_modified_at: parse_instant(&row.last_modified_at, "last_modified_at")?,
    };
    definition.validate().map_err(InfraError::InvalidConfig)?;
    Ok(definition)
}

pub fn encode_appointment(definition: &AppointmentDefinition) -> AppointmentRow {
    AppointmentRow {
        id: definition.id.clone(),
        anchor_due_at: store_instant(definition.anchor_due_at),
        availability_window: definition.availability_window.clone(),
        rrule: definition.recurrence_rule.clone(),
        timezone_id: definition.timezone_id.clone(),
        last_modified_at: store_instant(definition.last_modified_at),
    }
}

/// Fixed-width RFC 3339 in UTC. Uniform width keeps lexicographic order in
/// the store equal to chronological order.
pub fn store_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub fn parse_instant(value: &str, field_name: &str) -> Result<DateTime<Utc>, InfraError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|error| {
            InfraError::InvalidDueInstant(format!("{field_name} '{value}': {error}"))
        })
}

fn normalized_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
        .map(ToOwned::to_owned)
}
