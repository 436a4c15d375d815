use crate::application::window::{purge_threshold, GenerationWindow};
use crate::domain::interval::parse_interval;
use crate::domain::local_time::resolve_timezone;
use crate::domain::models::{AppointmentDefinition, Occurrence};
use crate::domain::recurrence::expand_rule;
use crate::infrastructure::appointment_repository::AppointmentRepository;
use crate::infrastructure::definition_mapper::{decode_appointment, ChangeEventPayload, ChangeKind};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::occurrence_repository::{BatchInsertReport, OccurrenceRepository};
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// One definition that could not be processed during a sweep. Sibling
/// definitions are unaffected; the failure is reported instead of aborting
/// the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionFailure {
    pub appointment_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub inserted: usize,
    pub purged: usize,
    pub failures: Vec<DefinitionFailure>,
    pub failed_rows: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeReport {
    pub inserted: usize,
    pub removed: usize,
    pub skipped: bool,
    pub failed_rows: Vec<String>,
}

/// Keeps the materialized occurrence set in step with a sliding six-month
/// window. Two entry points share the generation logic: the periodic sweep
/// over every definition, and the targeted re-sync after one definition
/// changes. Both are idempotent; overlapping generation ranges resolve at
/// insert time through the `(appointment_id, due_at)` uniqueness rule.
pub struct OccurrenceSyncService<A, O>
where
    A: AppointmentRepository,
    O: OccurrenceRepository,
{
    appointments: Arc<A>,
    occurrences: Arc<O>,
    now_provider: NowProvider,
}

impl<A, O> OccurrenceSyncService<A, O>
where
    A: AppointmentRepository,
    O: OccurrenceRepository,
{
    pub fn new(appointments: Arc<A>, occurrences: Arc<O>) -> Self {
        Self {
            appointments,
            occurrences,
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    /// Periodic sweep: purge occurrences that fell out of the window, then
    /// top up the far edge of the window for every definition.
    ///
    /// Read and purge failures abort the run (regeneration against a
    /// half-purged set would be wrong). Failures inside one definition are
    /// collected and do not stop the loop.
    pub fn run_sweep(&self) -> Result<SweepReport, InfraError> {
        let now = (self.now_provider)();
        let purged = self.occurrences.delete_due_before(purge_threshold(now))?;

        let window = GenerationWindow::sweep(now);
        let rows = self.appointments.list_all()?;

        let mut generated = Vec::new();
        let mut failures = Vec::new();
        for row in rows {
            let outcome = decode_appointment(&row).and_then(|definition| {
                self.generate_for_definition(&definition, &window)
            });
            match outcome {
                Ok(mut occurrences) => generated.append(&mut occurrences),
                Err(error) => failures.push(DefinitionFailure {
                    appointment_id: row.id.clone(),
                    message: error.to_string(),
                }),
            }
        }

        let insert_report = self.insert(&generated)?;
        Ok(SweepReport {
            inserted: insert_report.inserted,
            purged,
            failures,
            failed_rows: insert_report.failed_rows,
        })
    }

    /// Re-sync one definition after an insert or update notification.
    ///
    /// Updates first discard the definition's future occurrences (anything
    /// due after the modification instant may be wrong under the new rule),
    /// then regenerate from that instant. Events for other entities or other
    /// operations are skipped without error.
    pub fn apply_change(&self, payload: &ChangeEventPayload) -> Result<ChangeReport, InfraError> {
        let Some(kind) = payload.change_kind() else {
            return Ok(ChangeReport {
                skipped: true,
                ..ChangeReport::default()
            });
        };
        let Some(row) = payload.record.as_ref() else {
            return Err(InfraError::InvalidConfig(
                "change payload is missing the appointment record".to_string(),
            ));
        };

        let definition = decode_appointment(row)?;
        let removed = match kind {
            ChangeKind::Update => self
                .occurrences
                .delete_for_appointment_after(&definition.id, definition.last_modified_at)?,
            ChangeKind::Insert => 0,
        };

        let window = GenerationWindow::resync(definition.last_modified_at);
        let generated = self.generate_for_definition(&definition, &window)?;
        let insert_report = self.insert(&generated)?;
        Ok(ChangeReport {
            inserted: insert_report.inserted,
            removed,
            skipped: false,
            failed_rows: insert_report.failed_rows,
        })
    }

    fn insert(&self, occurrences: &[Occurrence]) -> Result<BatchInsertReport, InfraError> {
        if occurrences.is_empty() {
            return Ok(BatchInsertReport::default());
        }
        self.occurrences.insert_batch(occurrences)
    }

    /// Due instants for one definition within the window, paired with the
    /// open instant derived from the availability window.
    ///
    /// The anchor itself is considered for every definition, recurring or
    /// not; the recurrence branch then adds instants strictly after
    /// `max(anchor, floor)`, so the two branches never produce the same
    /// instant twice.
    fn generate_for_definition(
        &self,
        definition: &AppointmentDefinition,
        window: &GenerationWindow,
    ) -> Result<Vec<Occurrence>, InfraError> {
        let timezone = resolve_timezone(&definition.timezone_id)?;
        let lead_time = parse_interval(definition.availability_window.as_deref())?;

        let mut due_instants = Vec::new();
        if window.includes_anchor(definition.anchor_due_at) {
            due_instants.push(definition.anchor_due_at);
        }
        if let Some(rule) = definition.recurrence_rule.as_deref() {
            let range_start = window.effective_start(definition.anchor_due_at);
            due_instants.extend(expand_rule(
                rule,
                definition.anchor_due_at,
                timezone,
                range_start,
                window.end,
            )?);
        }
        due_instants.sort_unstable();
        due_instants.dedup();

        Ok(due_instants
            .into_iter()
            .map(|due_at| Occurrence {
                appointment_id: definition.id.clone(),
                due_at,
                open_at: lead_time.map(|lead| due_at - lead),
            })
            .collect())
    }
}
