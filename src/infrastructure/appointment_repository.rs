use crate::infrastructure::definition_mapper::AppointmentRow;
use crate::infrastructure::error::InfraError;
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Read side of the appointment definitions owned by the surrounding CRUD
/// layer. `upsert` exists for that layer (and for tests); the scheduler core
/// itself only lists.
pub trait AppointmentRepository: Send + Sync {
    fn list_all(&self) -> Result<Vec<AppointmentRow>, InfraError>;
    fn upsert(&self, row: &AppointmentRow) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteAppointmentRepository {
    db_path: PathBuf,
}

impl SqliteAppointmentRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        let connection = Connection::open(&self.db_path)?;
        connection.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(connection)
    }
}

impl AppointmentRepository for SqliteAppointmentRepository {
    fn list_all(&self) -> Result<Vec<AppointmentRow>, InfraError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(
            "SELECT id, anchor_due_at, availability_window, rrule, timezone_id, last_modified_at
             FROM appointments
             ORDER BY id",
        )?;
        let rows = statement
            .query_map([], |row| {
                Ok(AppointmentRow {
                    id: row.get(0)?,
                    anchor_due_at: row.get(1)?,
                    availability_window: row.get(2)?,
                    rrule: row.get(3)?,
                    timezone_id: row.get(4)?,
                    last_modified_at: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn upsert(&self, row: &AppointmentRow) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO appointments
               (id, anchor_due_at, availability_window, rrule, timezone_id, last_modified_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
               anchor_due_at = excluded.anchor_due_at,
               availability_window = excluded.availability_window,
               rrule = excluded.rrule,
               timezone_id = excluded.timezone_id,
               last_modified_at = excluded.last_modified_at",
            params![
                row.id,
                row.anchor_due_at,
                row.availability_window,
                row.rrule,
                row.timezone_id,
                row.last_modified_at,
            ],
        )?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryAppointmentRepository {
    rows: Mutex<HashMap<String, AppointmentRow>>,
}

impl AppointmentRepository for InMemoryAppointmentRepository {
    fn list_all(&self) -> Result<Vec<AppointmentRow>, InfraError> {
        let rows = self.rows.lock().map_err(|error| {
            InfraError::InvalidConfig(format!("appointment store lock poisoned: {error}"))
        })?;
        let mut listed: Vec<AppointmentRow> = rows.values().cloned().collect();
        listed.sort_by(|left, right| left.id.cmp(&right.id));
        Ok(listed)
    }

    fn upsert(&self, row: &AppointmentRow) -> Result<(), InfraError> {
        let id = row.id.trim();
        if id.is_empty() {
            return Err(InfraError::InvalidConfig(
                "appointment id is required for upsert".to_string(),
            ));
        }
        let mut rows = self.rows.lock().map_err(|error| {
            InfraError::InvalidConfig(format!("appointment store lock poisoned: {error}"))
        })?;
        rows.insert(id.to_string(), row.clone());
        Ok(())
    }
}
