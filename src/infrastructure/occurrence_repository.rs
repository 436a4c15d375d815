use crate::domain::models::Occurrence;
use crate::infrastructure::definition_mapper::{parse_instant, store_instant};
use crate::infrastructure::error::InfraError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Outcome of one batch insert. Conflicts on `(appointment_id, due_at)` are
/// silently ignored and simply absent from `inserted`; other row-level
/// failures are collected so the caller can log them without losing the
/// sibling rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchInsertReport {
    pub inserted: usize,
    pub failed_rows: Vec<String>,
}

pub trait OccurrenceRepository: Send + Sync {
    fn insert_batch(&self, occurrences: &[Occurrence]) -> Result<BatchInsertReport, InfraError>;
    fn delete_due_before(&self, cutoff: DateTime<Utc>) -> Result<usize, InfraError>;
    fn delete_for_appointment_after(
        &self,
        appointment_id: &str,
        after: DateTime<Utc>,
    ) -> Result<usize, InfraError>;
    fn list_for_appointment(&self, appointment_id: &str) -> Result<Vec<Occurrence>, InfraError>;
    fn list_all(&self) -> Result<Vec<Occurrence>, InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteOccurrenceRepository {
    db_path: PathBuf,
}

impl SqliteOccurrenceRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        let connection = Connection::open(&self.db_path)?;
        // Overlapping invocations are legal; wait out the other writer
        // instead of surfacing SQLITE_BUSY.
        connection.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(connection)
    }
}

fn occurrence_from_row(
    appointment_id: String,
    due_at_raw: String,
    open_at_raw: Option<String>,
) -> Result<Occurrence, InfraError> {
    let due_at = parse_instant(&due_at_raw, "due_at")?;
    let open_at = open_at_raw
        .as_deref()
        .map(|raw| parse_instant(raw, "open_at"))
        .transpose()?;
    Ok(Occurrence {
        appointment_id,
        due_at,
        open_at,
    })
}

impl OccurrenceRepository for SqliteOccurrenceRepository {
    fn insert_batch(&self, occurrences: &[Occurrence]) -> Result<BatchInsertReport, InfraError> {
        let mut connection = self.connect()?;
        let transaction = connection.transaction()?;
        let mut report = BatchInsertReport::default();
        {
            let mut statement = transaction.prepare(
                "INSERT OR IGNORE INTO appointment_occurrences (appointment_id, due_at, open_at)
                 VALUES (?1, ?2, ?3)",
            )?;
            for occurrence in occurrences {
                let result = statement.execute(params![
                    occurrence.appointment_id,
                    store_instant(occurrence.due_at),
                    occurrence.open_at.map(store_instant),
                ]);
                match result {
                    Ok(changed) => report.inserted += changed,
                    Err(error) => report.failed_rows.push(format!(
                        "appointment_id={} due_at={}: {error}",
                        occurrence.appointment_id,
                        store_instant(occurrence.due_at)
                    )),
                }
            }
        }
        transaction.commit()?;
        Ok(report)
    }

    fn delete_due_before(&self, cutoff: DateTime<Utc>) -> Result<usize, InfraError> {
        let connection = self.connect()?;
        let deleted = connection.execute(
            "DELETE FROM appointment_occurrences WHERE due_at < ?1",
            params![store_instant(cutoff)],
        )?;
        Ok(deleted)
    }

    fn delete_for_appointment_after(
        &self,
        appointment_id: &str,
        after: DateTime<Utc>,
    ) -> Result<usize, InfraError> {
        let connection = self.connect()?;
        let deleted = connection.execute(
            "DELETE FROM appointment_occurrences WHERE appointment_id = ?1 AND due_at > ?2",
            params![appointment_id, store_instant(after)],
        )?;
        Ok(deleted)
    }

    fn list_for_appointment(&self, appointment_id: &str) -> Result<Vec<Occurrence>, InfraError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(
            "SELECT appointment_id, due_at, open_at FROM appointment_occurrences
             WHERE appointment_id = ?1
             ORDER BY due_at",
        )?;
        let raw_rows = statement
            .query_map(params![appointment_id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<Result<Vec<(String, String, Option<String>)>, _>>()?;
        raw_rows
            .into_iter()
            .map(|(id, due_at, open_at)| occurrence_from_row(id, due_at, open_at))
            .collect()
    }

    fn list_all(&self) -> Result<Vec<Occurrence>, InfraError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(
            "SELECT appointment_id, due_at, open_at FROM appointment_occurrences
             ORDER BY appointment_id, due_at",
        )?;
        let raw_rows = statement
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<Result<Vec<(String, String, Option<String>)>, _>>()?;
        raw_rows
            .into_iter()
            .map(|(id, due_at, open_at)| occurrence_from_row(id, due_at, open_at))
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryOccurrenceRepository {
    occurrences: Mutex<Vec<Occurrence>>,
}

impl InMemoryOccurrenceRepository {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Occurrence>>, InfraError> {
        self.occurrences.lock().map_err(|error| {
            InfraError::InvalidConfig(format!("occurrence store lock poisoned: {error}"))
        })
    }
}

impl OccurrenceRepository for InMemoryOccurrenceRepository {
    fn insert_batch(&self, occurrences: &[Occurrence]) -> Result<BatchInsertReport, InfraError> {
        let mut stored = self.lock()?;
        let mut report = BatchInsertReport::default();
        for occurrence in occurrences {
            let duplicate = stored.iter().any(|existing| {
                existing.appointment_id == occurrence.appointment_id
                    && existing.due_at == occurrence.due_at
            });
            if !duplicate {
                stored.push(occurrence.clone());
                report.inserted += 1;
            }
        }
        Ok(report)
    }

    fn delete_due_before(&self, cutoff: DateTime<Utc>) -> Result<usize, InfraError> {
        let mut stored = self.lock()?;
        let before = stored.len();
        stored.retain(|occurrence| occurrence.due_at >= cutoff);
        Ok(before - stored.len())
    }

    fn delete_for_appointment_after(
        &self,
        appointment_id: &str,
        after: DateTime<Utc>,
    ) -> Result<usize, InfraError> {
        let mut stored = self.lock()?;
        let before = stored.len();
        stored.retain(|occurrence| {
            occurrence.appointment_id != appointment_id || occurrence.due_at <= after
        });
        Ok(before - stored.len())
    }

    fn list_for_appointment(&self, appointment_id: &str) -> Result<Vec<Occurrence>, InfraError> {
        let stored = self.lock()?;
        let mut listed: Vec<Occurrence> = stored
            .iter()
            .filter(|occurrence| occurrence.appointment_id == appointment_id)
            .cloned()
            .collect();
        listed.sort_by_key(|occurrence| occurrence.due_at);
        Ok(listed)
    }

    fn list_all(&self) -> Result<Vec<Occurrence>, InfraError> {
        let stored = self.lock()?;
        let mut listed = stored.clone();
        listed.sort_by(|left, right| {
            (&left.appointment_id, left.due_at).cmp(&(&right.appointment_id, right.due_at))
        });
        Ok(listed)
    }
}
