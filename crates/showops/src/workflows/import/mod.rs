mod mapping;
mod normalizer;
mod parser;

use crate::workflows::production::domain::{WorkflowError, WorkflowStatus};
use crate::workflows::production::{ProductionBlueprint, WorkflowState};
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use parser::ScheduleRecord;

#[derive(Debug)]
pub enum ScheduleImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    Workflow(WorkflowError),
}

impl std::fmt::Display for ScheduleImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduleImportError::Io(err) => write!(f, "failed to read schedule export: {}", err),
            ScheduleImportError::Csv(err) => write!(f, "invalid schedule CSV data: {}", err),
            ScheduleImportError::Workflow(err) => write!(
                f,
                "could not apply schedule data to production workflow: {}",
                err
            ),
        }
    }
}

impl std::error::Error for ScheduleImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScheduleImportError::Io(err) => Some(err),
            ScheduleImportError::Csv(err) => Some(err),
            ScheduleImportError::Workflow(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for ScheduleImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for ScheduleImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<WorkflowError> for ScheduleImportError {
    fn from(err: WorkflowError) -> Self {
        Self::Workflow(err)
    }
}

/// Result of hydrating a workflow state from an external tracker export.
/// `applied` is the contiguous completed prefix in blueprint order;
/// completed rows unreachable past the first gap land in `out_of_order`.
#[derive(Debug)]
pub struct ImportOutcome {
    pub state: WorkflowState,
    pub applied: Vec<&'static str>,
    pub out_of_order: Vec<&'static str>,
    pub in_progress: Option<&'static str>,
    pub unmatched_rows: usize,
}

/// Imports task exports from the production tracker. Step names are
/// normalized and matched against a static alias table; per-step field
/// validation is skipped because the tracker owns that data.
pub struct ScheduleImporter;

impl ScheduleImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<ImportOutcome, ScheduleImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<ImportOutcome, ScheduleImportError> {
        let blueprint = ProductionBlueprint::standard();
        let mut completed: HashSet<&'static str> = HashSet::new();
        let mut touched: HashSet<&'static str> = HashSet::new();
        let mut unmatched_rows = 0usize;

        for record in parser::parse_records(reader)? {
            let ScheduleRecord {
                normalized_name,
                completed_on,
                touched: row_touched,
            } = record;
            match mapping::step_key_for_normalized(&normalized_name) {
                Some(step_key) => {
                    if completed_on.is_some() {
                        completed.insert(step_key);
                    } else if row_touched {
                        touched.insert(step_key);
                    }
                }
                None => unmatched_rows += 1,
            }
        }

        let mut state = WorkflowState::new(&blueprint, Vec::new());
        state.set_status(WorkflowStatus::Active)?;

        let mut applied = Vec::new();
        loop {
            let current = blueprint
                .step(&state.current_step)
                .expect("pointer always names a blueprint step");
            if !completed.contains(current.key) {
                break;
            }
            applied.push(current.key);
            match blueprint.next_step_after(current.key) {
                Some(next) => state.record_transition("import", next.phase, next.key),
                None => {
                    state.set_status(WorkflowStatus::Completed)?;
                    break;
                }
            }
        }

        let out_of_order: Vec<&'static str> = blueprint
            .step_templates()
            .iter()
            .filter(|step| completed.contains(step.key) && !applied.contains(&step.key))
            .map(|step| step.key)
            .collect();

        let in_progress = if state.status == WorkflowStatus::Completed {
            None
        } else {
            blueprint
                .step(&state.current_step)
                .filter(|step| touched.contains(step.key))
                .map(|step| step.key)
        };

        Ok(ImportOutcome {
            state,
            applied,
            out_of_order,
            in_progress,
            unmatched_rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Cursor;

    #[test]
    fn parse_datetime_supports_rfc3339_and_date_strings() {
        let rfc = parser::parse_datetime_for_tests("2026-05-02T10:00:00Z").expect("parse rfc");
        assert_eq!(
            rfc,
            NaiveDate::from_ymd_opt(2026, 5, 2)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap()
        );

        let date = parser::parse_datetime_for_tests("2026-05-10").expect("parse date");
        assert_eq!(
            date,
            NaiveDate::from_ymd_opt(2026, 5, 10)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );

        assert!(parser::parse_datetime_for_tests("  ").is_none());
        assert!(parser::parse_datetime_for_tests("not-a-date").is_none());
    }

    #[test]
    fn normalize_name_unifies_dashes_whitespace_and_case() {
        let source = "\u{feff}Confirm  Offer  Terms  \u{2013}  Promoter";
        let normalized = normalizer::normalize_for_tests(source);
        assert_eq!(normalized, "confirm offer terms - promoter");
    }

    #[test]
    fn schedule_row_detects_completion_and_touch() {
        let record = parser::parse_records(Cursor::new(
            "Task Name,Completed At,Created At,Last Modified\nTask,2026-05-02T12:15:00Z,2026-05-01T10:00:00Z,2026-05-01T12:00:00Z\n",
        ))
        .expect("parse")
        .pop()
        .expect("record");
        assert_eq!(
            record.completed_on.expect("completed"),
            NaiveDate::from_ymd_opt(2026, 5, 2).unwrap()
        );
        assert!(record.touched);

        let record = parser::parse_records(Cursor::new(
            "Task Name,Completed At,Created At,Last Modified\nTask,,,\n",
        ))
        .expect("parse")
        .pop()
        .expect("record");
        assert!(!record.touched);
    }

    #[test]
    fn importer_applies_the_contiguous_completed_prefix() {
        let csv = "Task Name,Created At,Completed At,Last Modified\n\
Confirm Offer Terms - Promoter,2026-04-01T10:00:00Z,2026-04-02T12:00:00Z,2026-04-02T12:00:00Z\n\
Execute Artist Contract,2026-04-02T10:00:00Z,2026-04-05T09:30:00Z,2026-04-05T09:30:00Z\n\
Collect Technical Rider,2026-04-05T10:00:00Z,,2026-04-06T08:00:00Z\n";
        let outcome = ScheduleImporter::from_reader(Cursor::new(csv)).expect("import succeeds");

        assert_eq!(
            outcome.applied,
            vec!["booking_confirm_offer", "booking_execute_contract"]
        );
        assert_eq!(outcome.state.current_step, "advancing_collect_rider");
        assert_eq!(outcome.state.status, WorkflowStatus::Active);
        assert_eq!(outcome.in_progress, Some("advancing_collect_rider"));
        assert_eq!(outcome.state.transitions.len(), 2);
        assert!(outcome
            .state
            .transitions
            .iter()
            .all(|record| record.actor == "import"));
    }

    #[test]
    fn importer_handles_duplicate_rows_without_double_applying() {
        let csv = "Task Name,Created At,Completed At,Last Modified\n\
Confirm Offer Terms,2026-04-01T10:00:00Z,2026-04-02T12:00:00Z,2026-04-02T12:00:00Z\n\
Confirm Offer Terms,2026-04-01T11:00:00Z,,2026-04-01T12:30:00Z\n";
        let outcome = ScheduleImporter::from_reader(Cursor::new(csv)).expect("import succeeds");

        assert_eq!(outcome.applied, vec!["booking_confirm_offer"]);
        assert_eq!(outcome.state.current_step, "booking_execute_contract");
    }

    #[test]
    fn completed_steps_past_a_gap_are_reported_not_applied() {
        let csv = "Task Name,Created At,Completed At,Last Modified\n\
Confirm Offer Terms,2026-04-01T10:00:00Z,2026-04-02T12:00:00Z,2026-04-02T12:00:00Z\n\
Reconcile Box Office,2026-05-03T10:00:00Z,2026-05-04T12:00:00Z,2026-05-04T12:00:00Z\n";
        let outcome = ScheduleImporter::from_reader(Cursor::new(csv)).expect("import succeeds");

        assert_eq!(outcome.applied, vec!["booking_confirm_offer"]);
        assert_eq!(outcome.out_of_order, vec!["settlement_reconcile_box_office"]);
        assert_eq!(outcome.state.current_step, "booking_execute_contract");
    }

    #[test]
    fn importer_counts_unknown_task_names() {
        let csv = "Task Name,Created At,Completed At,Last Modified\n\
Order Pyrotechnics,2026-04-01T10:00:00Z,,2026-04-01T12:00:00Z\n";
        let outcome = ScheduleImporter::from_reader(Cursor::new(csv)).expect("import succeeds");

        assert_eq!(outcome.unmatched_rows, 1);
        assert!(outcome.applied.is_empty());
        assert_eq!(outcome.state.current_step, "booking_confirm_offer");
    }

    #[test]
    fn fully_completed_export_closes_the_workflow() {
        let names = [
            "Confirm Offer Terms",
            "Execute Artist Contract",
            "Collect Technical Rider",
            "Book Production Vendors",
            "Approve Staffing Plan",
            "Build Production Schedule",
            "Issue Call Sheets",
            "Complete Safety Walkthrough",
            "Clear Doors Checklist",
            "File Show Report",
            "Reconcile Box Office",
            "Release Vendor Payments",
            "Publish Final Settlement Report",
        ];
        let mut csv = String::from("Task Name,Created At,Completed At,Last Modified\n");
        for name in names {
            csv.push_str(&format!(
                "{name},2026-04-01T10:00:00Z,2026-05-04T12:00:00Z,2026-05-04T12:00:00Z\n"
            ));
        }

        let outcome = ScheduleImporter::from_reader(Cursor::new(csv)).expect("import succeeds");
        assert_eq!(outcome.state.status, WorkflowStatus::Completed);
        assert_eq!(outcome.applied.len(), 13);
        assert!(outcome.out_of_order.is_empty());
    }

    #[test]
    fn importer_from_path_propagates_io_errors() {
        let error = ScheduleImporter::from_path("./does-not-exist.csv")
            .expect_err("expected io error");

        match error {
            ScheduleImportError::Io(_) => {}
            other => panic!("expected io error, got {other:?}"),
        }
    }

    #[test]
    fn mapping_recognizes_known_step_aliases() {
        assert_eq!(
            mapping::lookup_for_tests("Confirm Offer Terms - Promoter"),
            Some("booking_confirm_offer")
        );
        assert_eq!(
            mapping::lookup_for_tests("Book Audio & Lighting Vendors"),
            Some("advancing_book_vendors")
        );
        assert_eq!(
            mapping::lookup_for_tests("Reconcile Box Office \u{2013} Settlement Accountant"),
            Some("settlement_reconcile_box_office")
        );
        assert_eq!(
            mapping::lookup_for_tests("Submit Show Report"),
            Some("showday_file_show_report")
        );
        assert_eq!(mapping::lookup_for_tests("Order Pyrotechnics"), None);
    }
}
