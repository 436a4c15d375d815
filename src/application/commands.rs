use crate::application::bootstrap::bootstrap_workspace;
use crate::application::occurrence_sync::{NowProvider, OccurrenceSyncService};
use crate::infrastructure::appointment_repository::{
    AppointmentRepository, SqliteAppointmentRepository,
};
use crate::infrastructure::definition_mapper::ChangeEventPayload;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::occurrence_repository::SqliteOccurrenceRepository;
use chrono::Utc;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub struct AppState {
    config_dir: PathBuf,
    database_path: PathBuf,
    logs_dir: PathBuf,
    appointments: Arc<SqliteAppointmentRepository>,
    occurrences: Arc<SqliteOccurrenceRepository>,
    now_provider: NowProvider,
    log_guard: Mutex<()>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let config_dir = workspace_root.join("config");
        let logs_dir = workspace_root.join("logs");

        Ok(Self {
            config_dir,
            appointments: Arc::new(SqliteAppointmentRepository::new(&bootstrap.database_path)),
            occurrences: Arc::new(SqliteOccurrenceRepository::new(&bootstrap.database_path)),
            database_path: bootstrap.database_path,
            logs_dir,
            now_provider: Arc::new(Utc::now),
            log_guard: Mutex::new(()),
        })
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }

    fn sync_service(
        &self,
    ) -> OccurrenceSyncService<SqliteAppointmentRepository, SqliteOccurrenceRepository> {
        OccurrenceSyncService::new(Arc::clone(&self.appointments), Arc::clone(&self.occurrences))
            .with_now_provider(Arc::clone(&self.now_provider))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepResponse {
    pub inserted: usize,
    pub purged: usize,
    pub failed_definitions: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangeResponse {
    pub inserted: usize,
    pub removed: usize,
    pub skipped: bool,
}

pub fn run_sweep_impl(state: &AppState) -> Result<SweepResponse, InfraError> {
    let report = state.sync_service().run_sweep()?;

    for failure in &report.failures {
        state.log_error(
            "run_sweep",
            &format!(
                "skipped appointment_id={}: {}",
                failure.appointment_id, failure.message
            ),
        );
    }
    for failed_row in &report.failed_rows {
        state.log_error("run_sweep", &format!("row not inserted: {failed_row}"));
    }
    state.log_info(
        "run_sweep",
        &format!(
            "inserted={} purged={} failed_definitions={}",
            report.inserted,
            report.purged,
            report.failures.len()
        ),
    );

    Ok(SweepResponse {
        inserted: report.inserted,
        purged: report.purged,
        failed_definitions: report.failures.len(),
    })
}

/// Handle a definition change notification. The notified row is mirrored
/// into the local store first so later periodic sweeps keep maintaining it,
/// then the occurrence set is re-synced from the modification instant.
pub fn appointment_changed_impl(
    state: &AppState,
    payload: ChangeEventPayload,
) -> Result<ChangeResponse, InfraError> {
    if payload.change_kind().is_some() {
        if let Some(row) = payload.record.as_ref() {
            state.appointments.upsert(row)?;
        }
    }

    let report = state.sync_service().apply_change(&payload)?;

    if report.skipped {
        state.log_info(
            "appointment_changed",
            &format!(
                "ignored event type={} table={}",
                payload.event_type, payload.table
            ),
        );
    } else {
        for failed_row in &report.failed_rows {
            state.log_error("appointment_changed", &format!("row not inserted: {failed_row}"));
        }
        state.log_info(
            "appointment_changed",
            &format!("inserted={} removed={}", report.inserted, report.removed),
        );
    }

    Ok(ChangeResponse {
        inserted: report.inserted,
        removed: report.removed,
        skipped: report.skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::definition_mapper::AppointmentRow;
    use chrono::{DateTime, Utc};
    use std::fs;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn temp_workspace(label: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!(
            "appt-window-cmd-{label}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).expect("create workspace root");
        root
    }

    fn sample_row(id: &str) -> AppointmentRow {
        AppointmentRow {
            id: id.to_string(),
            anchor_due_at: "2024-06-20T09:00:00Z".to_string(),
            availability_window: Some("P2D".to_string()),
            rrule: None,
            timezone_id: "UTC".to_string(),
            last_modified_at: "2024-06-12T00:00:00Z".to_string(),
        }
    }

    fn change_payload(event_type: &str, row: AppointmentRow) -> ChangeEventPayload {
        ChangeEventPayload {
            event_type: event_type.to_string(),
            table: "appointments".to_string(),
            record: Some(row),
        }
    }

    #[test]
    fn change_mirrors_definition_and_materializes_occurrences() {
        let state = AppState::new(temp_workspace("change"))
            .expect("app state")
            .with_now_provider(Arc::new(|| fixed_time("2024-06-15T10:30:00Z")));

        let response =
            appointment_changed_impl(&state, change_payload("INSERT", sample_row("appt-1")))
                .expect("change applies");
        assert!(!response.skipped);
        assert_eq!(response.inserted, 1);

        let mirrored = state.appointments.list_all().expect("list definitions");
        assert_eq!(mirrored.len(), 1);
        assert_eq!(mirrored[0].id, "appt-1");

        // The mirrored definition is now covered by the periodic sweep; the
        // already-materialized occurrence must not be duplicated.
        let sweep = run_sweep_impl(&state).expect("sweep");
        assert_eq!(sweep.inserted, 0);
    }

    #[test]
    fn skipped_events_do_not_touch_the_store() {
        let state = AppState::new(temp_workspace("skip"))
            .expect("app state")
            .with_now_provider(Arc::new(|| fixed_time("2024-06-15T10:30:00Z")));

        let mut payload = change_payload("INSERT", sample_row("appt-1"));
        payload.table = "profiles".to_string();
        let response = appointment_changed_impl(&state, payload).expect("skip");
        assert!(response.skipped);
        assert!(state.appointments.list_all().expect("list").is_empty());
    }
}
